use error_stack::Report;
use k8s_openapi::api::core::v1::PersistentVolumeClaim;
use kube::api::DeleteParams;
use kube::api::ListParams;
use kube::Api;
use tracing::error;
use tracing::info;

use super::app_selector;
use crate::error::HarnessError;
use crate::error::HarnessResult;
use crate::error::KubeResultExt;
use crate::ClusterSession;

pub const CLAIM_BOUND: &str = "Bound";

fn claim_phase(pvc: &PersistentVolumeClaim) -> Option<&str> {
    pvc.status.as_ref().and_then(|s| s.phase.as_deref())
}

impl ClusterSession {
    fn pvcs(&self, namespace: &str) -> Api<PersistentVolumeClaim> {
        Api::namespaced(self.client().clone(), namespace)
    }

    async fn list_pvcs(
        &self,
        namespace: &str,
        selector: &str,
    ) -> HarnessResult<Vec<PersistentVolumeClaim>> {
        let pvcs = self
            .pvcs(namespace)
            .list(&ListParams::default().labels(selector))
            .await
            .classify("persistentvolumeclaims", selector)?;
        Ok(pvcs.items)
    }

    /// Current phase of the claim, e.g. `Pending` or `Bound`.
    pub async fn pvc_phase(&self, namespace: &str, name: &str) -> HarnessResult<String> {
        let pvc = self
            .pvcs(namespace)
            .get(name)
            .await
            .classify("persistentvolumeclaim", name)?;
        Ok(claim_phase(&pvc).unwrap_or_default().to_string())
    }

    pub async fn pvc_access_modes(&self, namespace: &str, name: &str) -> HarnessResult<Vec<String>> {
        let pvc = self
            .pvcs(namespace)
            .get(name)
            .await
            .classify("persistentvolumeclaim", name)?;
        Ok(pvc.status.and_then(|s| s.access_modes).unwrap_or_default())
    }

    /// Name of the volume bound to the claim.
    pub async fn volume_name_for_pvc(&self, namespace: &str, name: &str) -> HarnessResult<String> {
        let pvc = self
            .pvcs(namespace)
            .get(name)
            .await
            .classify("persistentvolumeclaim", name)?;
        pvc.spec
            .and_then(|s| s.volume_name)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| {
                Report::new(HarnessError::not_found(
                    "volume for persistentvolumeclaim",
                    format!("{namespace}/{name}"),
                ))
            })
    }

    /// Waits until the claim is bound. A claim that does not exist yet is pending.
    pub async fn wait_until_pvc_bound(&self, namespace: &str, name: &str) -> HarnessResult<()> {
        self.wait_policy()
            .wait_until(&format!("pvc {name} to be bound"), move || async move {
                match self.pvc_phase(namespace, name).await {
                    Ok(phase) => {
                        info!(name, %phase, "pvc phase");
                        Ok(phase == CLAIM_BOUND)
                    }
                    Err(report) if report.current_context().is_not_found() => Ok(false),
                    Err(report) => Err(report),
                }
            })
            .await
    }

    pub async fn wait_until_pvc_deleted(&self, namespace: &str, name: &str) -> HarnessResult<()> {
        let api = self.pvcs(namespace);
        let api = &api;
        self.wait_policy()
            .wait_until(&format!("pvc {name} to be deleted"), move || async move {
                Ok(api
                    .get_opt(name)
                    .await
                    .classify("persistentvolumeclaim", name)?
                    .is_none())
            })
            .await
    }

    /// Deletes every claim labelled `app=<app>` and waits until none is left.
    pub async fn delete_pvcs_with_label(&self, namespace: &str, app: &str) -> HarnessResult<()> {
        let selector = app_selector(app);
        let selector = selector.as_str();

        match self
            .pvcs(namespace)
            .delete_collection(&DeleteParams::default(), &ListParams::default().labels(selector))
            .await
            .classify("persistentvolumeclaims", selector)
        {
            Ok(_) => {}
            Err(report) if report.current_context().is_not_found() => return Ok(()),
            Err(report) => {
                error!(selector, "cannot delete PVCs");
                return Err(report);
            }
        }

        self.wait_policy()
            .wait_until(
                &format!("pvcs with label {selector} to be deleted"),
                move || async move { Ok(self.list_pvcs(namespace, selector).await?.is_empty()) },
            )
            .await
    }

    /// Waits for exactly `expected` claims of `app`, then for all of them to be in `phase`.
    pub async fn check_pvc_count_and_phase(
        &self,
        app: &str,
        namespace: &str,
        expected: usize,
        phase: &str,
    ) -> HarnessResult<()> {
        let selector = app_selector(app);
        let selector = selector.as_str();
        info!(expected, selector, "wait until pvcs are present");

        self.wait_policy()
            .wait_until(
                &format!("{expected} pvcs with label {selector}"),
                move || async move { Ok(self.list_pvcs(namespace, selector).await?.len() == expected) },
            )
            .await?;

        self.wait_policy()
            .wait_until(
                &format!("pvcs with label {selector} to be {phase}"),
                move || async move {
                    let pvcs = self.list_pvcs(namespace, selector).await?;
                    let mut all = true;
                    for pvc in &pvcs {
                        if claim_phase(pvc) != Some(phase) {
                            all = false;
                            info!(
                                pvc = ?pvc.metadata.name,
                                current = ?claim_phase(pvc),
                                phase,
                                "waiting for pvc phase"
                            );
                        }
                    }
                    Ok(all)
                },
            )
            .await
    }
}
