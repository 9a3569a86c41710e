//! Captures container logs of test pods into files.

use std::path::PathBuf;

use chrono::Utc;
use error_stack::ResultExt;
use k8s_openapi::api::core::v1::Pod;
use kube::api::ListParams;
use kube::api::LogParams;
use kube::Api;
use tracing::error;
use tracing::info;

use crate::error::HarnessError;
use crate::error::HarnessResult;
use crate::error::KubeResultExt;
use crate::resources::app_selector;
use crate::ClusterSession;

/// `{test}_{host_type}_{pod}_{namespace}_{unix_time}.log`
pub fn log_file_name(
    test_name: &str,
    host_type: &str,
    pod: &str,
    namespace: &str,
    unix_time: i64,
) -> String {
    format!("{test_name}_{host_type}_{pod}_{namespace}_{unix_time}.log")
}

impl ClusterSession {
    /// Writes the logs of every pod of `app` to the session's log directory.
    ///
    /// A pod whose logs cannot be fetched or written is logged and skipped.
    /// Returns the files that were written.
    ///
    /// # Errors
    ///
    /// - [`HarnessError::Api`] if the pods of `app` cannot be listed
    /// - [`HarnessError::Io`] if the log directory cannot be created
    pub async fn collect_pod_logs(
        &self,
        app: &str,
        host_type: &str,
        namespace: &str,
        test_name: &str,
    ) -> HarnessResult<Vec<PathBuf>> {
        let api: Api<Pod> = Api::namespaced(self.client().clone(), namespace);
        let selector = app_selector(app);
        let pods = api
            .list(&ListParams::default().labels(&selector))
            .await
            .classify("pods", &selector)
            .attach_printable_lazy(|| {
                format!("Cannot get logs for app : {app} in namespace {namespace}")
            })?;

        tokio::fs::create_dir_all(self.log_dir())
            .await
            .change_context_lazy(|| HarnessError::Io {
                message: format!("cannot create log dir {}", self.log_dir().display()),
            })?;

        let mut written = Vec::new();
        for pod in &pods.items {
            let Some(pod_name) = pod.metadata.name.as_deref() else {
                continue;
            };
            info!("getting logs for pod : {pod_name}");
            let logs = match api.logs(pod_name, &LogParams::default()).await {
                Ok(logs) => logs,
                Err(e) => {
                    error!("Cannot get logs for pod : {pod_name} in namespace {namespace}, err: {e}");
                    continue;
                }
            };

            let path = self.log_dir().join(log_file_name(
                test_name,
                host_type,
                pod_name,
                namespace,
                Utc::now().timestamp(),
            ));
            if let Err(e) = tokio::fs::write(&path, logs).await {
                error!("Errors while writing logs for : {pod_name} to file, err : {e}");
                continue;
            }
            written.push(path);
        }
        Ok(written)
    }
}
