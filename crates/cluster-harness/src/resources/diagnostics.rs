//! Best-effort dumps of cluster state for failing tests. Failures are logged, not returned.

use k8s_openapi::api::core::v1::Event;
use k8s_openapi::api::core::v1::Pod;
use kube::api::ListParams;
use kube::Api;
use tracing::error;
use tracing::info;
use tracing::warn;

use crate::ClusterSession;

impl ClusterSession {
    pub async fn log_pod_status(&self, namespace: &str) {
        let api: Api<Pod> = Api::namespaced(self.client().clone(), namespace);
        match api.list(&ListParams::default()).await {
            Ok(pods) => {
                for pod in &pods.items {
                    info!(
                        "{} ({namespace}) pod status: {:?}",
                        pod.metadata.name.as_deref().unwrap_or_default(),
                        pod.status
                    );
                }
            }
            Err(e) => error!("failed to get pod status in namespace {namespace}. {e}"),
        }
    }

    /// Logs the full object of `name` followed by the namespace's events.
    pub async fn log_pod_describe(&self, name: &str, namespace: &str) {
        let api: Api<Pod> = Api::namespaced(self.client().clone(), namespace);
        match api.get(name).await {
            Ok(pod) => info!("pod {name} in namespace {namespace}: {pod:?}"),
            Err(e) => {
                warn!("failed to get pod {name} in namespace {namespace}. {e}");
                return;
            }
        }
        self.log_events_for_namespace(namespace).await;
    }

    /// Logs every pod object in `namespace` followed by the namespace's events.
    pub async fn log_pods_in_namespace(&self, namespace: &str) {
        info!("printing pod describe for all pods in namespace {namespace}");
        let api: Api<Pod> = Api::namespaced(self.client().clone(), namespace);
        match api.list(&ListParams::default()).await {
            Ok(pods) => {
                for pod in &pods.items {
                    info!(
                        "pod {} in namespace {namespace}: {pod:?}",
                        pod.metadata.name.as_deref().unwrap_or_default()
                    );
                }
            }
            Err(e) => {
                error!("failed to list pods in namespace {namespace}. {e}");
                return;
            }
        }
        self.log_events_for_namespace(namespace).await;
    }

    pub async fn log_events_for_namespace(&self, namespace: &str) {
        let api: Api<Event> = Api::namespaced(self.client().clone(), namespace);
        match api.list(&ListParams::default()).await {
            Ok(events) => {
                info!("DUMPING events in namespace {namespace}");
                for event in &events.items {
                    info!("{event:?}");
                }
                info!("DONE DUMPING events in namespace {namespace}");
            }
            Err(e) => warn!("failed to get events in namespace {namespace}. {e}"),
        }
    }
}
