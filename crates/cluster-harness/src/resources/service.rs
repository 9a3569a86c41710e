use error_stack::Report;
use k8s_openapi::api::core::v1::Service;
use kube::api::PostParams;
use kube::Api;
use tracing::info;

use crate::error::HarnessError;
use crate::error::HarnessResult;
use crate::error::KubeResultExt;
use crate::manifest;
use crate::ClusterSession;

/// Service that only exists once the orchestrator's manager is deployed.
pub const MANAGER_SERVICE: &str = "rook-ceph-mgr";

impl ClusterSession {
    fn services(&self, namespace: &str) -> Api<Service> {
        Api::namespaced(self.client().clone(), namespace)
    }

    pub async fn get_service(&self, name: &str, namespace: &str) -> HarnessResult<Service> {
        self.services(namespace)
            .get(name)
            .await
            .classify("service", name)
    }

    /// Waits until the service `name` exists.
    pub async fn wait_for_service_up(&self, name: &str, namespace: &str) -> HarnessResult<()> {
        let api = self.services(namespace);
        let api = &api;
        self.wait_policy()
            .wait_until(
                &format!("service {name} in namespace {namespace}"),
                move || async move {
                    let found = api.get_opt(name).await.classify("service", name)?.is_some();
                    if found {
                        info!(name, namespace, "service is up");
                    }
                    Ok(found)
                },
            )
            .await
    }

    /// NodePort of the first port of the service `name`.
    pub async fn service_node_port(&self, name: &str, namespace: &str) -> HarnessResult<i32> {
        let svc = self.get_service(name, namespace).await?;
        first_port(&svc)
            .and_then(|p| p.node_port)
            .ok_or_else(|| {
                Report::new(HarnessError::not_found(
                    "service node port",
                    format!("{namespace}/{name}"),
                ))
            })
    }

    /// Creates the NodePort service for the object gateway of `store`.
    pub async fn create_external_gateway_service(
        &self,
        namespace: &str,
        store: &str,
    ) -> HarnessResult<()> {
        let svc = manifest::external_gateway_service(namespace, store);
        let name = manifest::external_gateway_service_name(store);
        match self
            .services(namespace)
            .create(&PostParams::default(), &svc)
            .await
            .classify("service", &name)
        {
            Ok(_) => Ok(()),
            Err(report) if report.current_context().is_already_exists() => Ok(()),
            Err(report) => Err(report),
        }
    }

    /// `host:port` at which the object gateway of `store` is reachable.
    ///
    /// Inside the cluster this is the service's cluster IP; from outside it is
    /// a gateway pod's host IP and the external service's node port.
    pub async fn gateway_endpoint(&self, store: &str, namespace: &str) -> HarnessResult<String> {
        let endpoint = if self.running_in_cluster() {
            let svc = self
                .get_service(&manifest::gateway_service_name(store), namespace)
                .await?;
            internal_endpoint(&svc).ok_or_else(|| {
                Report::new(HarnessError::not_found(
                    "gateway service endpoint",
                    format!("{namespace}/{store}"),
                ))
            })?
        } else {
            let host_ip = self.pod_host_ip(manifest::GATEWAY_APP, namespace).await?;
            let node_port = self
                .service_node_port(&manifest::external_gateway_service_name(store), namespace)
                .await?;
            format!("{host_ip}:{node_port}")
        };
        info!(store, %endpoint, "gateway endpoint");
        Ok(endpoint)
    }

    /// Returns true if the orchestrator's manager service exists in `namespace`.
    pub async fn is_orchestrator_installed(&self, namespace: &str) -> HarnessResult<bool> {
        Ok(self
            .services(namespace)
            .get_opt(MANAGER_SERVICE)
            .await
            .classify("service", MANAGER_SERVICE)?
            .is_some())
    }
}

fn first_port(svc: &Service) -> Option<&k8s_openapi::api::core::v1::ServicePort> {
    svc.spec.as_ref()?.ports.as_ref()?.first()
}

fn internal_endpoint(svc: &Service) -> Option<String> {
    let cluster_ip = svc.spec.as_ref()?.cluster_ip.as_deref()?;
    let port = first_port(svc)?.port;
    Some(format!("{cluster_ip}:{port}"))
}
