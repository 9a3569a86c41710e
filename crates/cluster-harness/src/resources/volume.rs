use kube::api::ApiResource;
use kube::api::DynamicObject;
use kube::api::ListParams;
use kube::core::GroupVersionKind;
use kube::Api;
use tracing::info;

use crate::error::HarnessError;
use crate::error::HarnessResult;
use crate::error::KubeResultExt;
use crate::ClusterSession;

const VOLUME_GROUP: &str = "rook.io";
const VOLUME_VERSION: &str = "v1alpha2";
const VOLUME_KIND: &str = "Volume";

/// API resource of the orchestrator's `Volume` kind.
pub fn volume_resource() -> ApiResource {
    ApiResource::from_gvk(&GroupVersionKind::gvk(
        VOLUME_GROUP,
        VOLUME_VERSION,
        VOLUME_KIND,
    ))
}

impl ClusterSession {
    fn volumes(&self, namespace: &str) -> Api<DynamicObject> {
        Api::namespaced_with(self.client().clone(), namespace, &volume_resource())
    }

    pub async fn volume_exists(&self, namespace: &str, name: &str) -> HarnessResult<bool> {
        Ok(self
            .volumes(namespace)
            .get_opt(name)
            .await
            .classify("volume", name)?
            .is_some())
    }

    /// Waits until the `Volume` object `name` exists.
    pub async fn wait_for_volume_present(&self, namespace: &str, name: &str) -> HarnessResult<()> {
        self.wait_for_volume(namespace, name, true).await
    }

    /// Waits until the `Volume` object `name` is gone.
    pub async fn wait_for_volume_absent(&self, namespace: &str, name: &str) -> HarnessResult<()> {
        self.wait_for_volume(namespace, name, false).await
    }

    async fn wait_for_volume(&self, namespace: &str, name: &str, exist: bool) -> HarnessResult<()> {
        let action = if exist { "exist" } else { "not exist" };
        let result = self
            .wait_policy()
            .wait_until(
                &format!("volume {name} in namespace {namespace} to {action}"),
                move || async move { Ok(self.volume_exists(namespace, name).await? == exist) },
            )
            .await;

        if let Err(report) = &result {
            if matches!(report.current_context(), HarnessError::Timeout { .. }) {
                self.log_volumes(namespace, name).await;
                self.log_persistent_volumes(false).await;
                self.log_pvcs(namespace, false).await;
            }
        }
        result
    }

    async fn log_volumes(&self, namespace: &str, desired: &str) {
        match self.volumes(namespace).list(&ListParams::default()).await {
            Ok(volumes) => {
                let names: Vec<_> = volumes
                    .items
                    .iter()
                    .filter_map(|v| v.metadata.name.as_deref())
                    .collect();
                info!("looking for volume {desired} in namespace {namespace}. Found volumes: {names:?}");
            }
            Err(e) => info!("failed to list volumes in ns {namespace}. {e}"),
        }
    }
}
