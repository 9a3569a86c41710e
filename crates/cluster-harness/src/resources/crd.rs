use tracing::info;

use crate::error::HarnessResult;
use crate::ClusterSession;

impl ClusterSession {
    /// Waits until `kubectl get crd <name>` succeeds.
    pub async fn wait_for_crd(&self, name: &str) -> HarnessResult<()> {
        self.wait_policy()
            .wait_until(&format!("crd {name}"), move || async move {
                match self.get_resource(&["crd", name]).await {
                    Ok(_) => {
                        info!("Found the CRD resource: {name}");
                        Ok(true)
                    }
                    Err(report) if report.current_context().is_not_found() => Ok(false),
                    Err(report) => Err(report),
                }
            })
            .await
    }
}
