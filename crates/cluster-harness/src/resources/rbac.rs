use k8s_openapi::api::rbac::v1::ClusterRoleBinding;
use kube::Api;
use tracing::info;
use tracing::warn;

use crate::error::HarnessResult;
use crate::error::KubeResultExt;
use crate::manifest;
use crate::manifest::ANON_BINDING_NAME;
use crate::ClusterSession;

impl ClusterSession {
    /// Grants `cluster-admin` to anonymous users and waits until the binding is served.
    pub async fn create_anonymous_cluster_binding(&self) -> HarnessResult<()> {
        match self
            .resource_operation("create", &manifest::anonymous_cluster_binding())
            .await
        {
            Ok(_) => {}
            Err(report) if report.current_context().is_already_exists() => {}
            Err(report) => {
                warn!("{ANON_BINDING_NAME} not created");
                return Err(report);
            }
        }

        info!("{ANON_BINDING_NAME} creation completed, waiting for it to exist in API");
        let api: Api<ClusterRoleBinding> = Api::all(self.client().clone());
        let api = &api;
        self.wait_policy()
            .wait_until(
                &format!("clusterrolebinding {ANON_BINDING_NAME}"),
                move || async move {
                    Ok(api
                        .get_opt(ANON_BINDING_NAME)
                        .await
                        .classify("clusterrolebinding", ANON_BINDING_NAME)?
                        .is_some())
                },
            )
            .await
    }

    /// Deletes the role `name`, then the role binding of the same name.
    ///
    /// A failure deleting the role leaves the binding in place.
    pub async fn delete_role_and_bindings(&self, name: &str, namespace: &str) -> HarnessResult<()> {
        self.delete_resource(&["role", name, "-n", namespace]).await?;
        self.delete_role_binding(name, namespace).await
    }

    pub async fn delete_role_binding(&self, name: &str, namespace: &str) -> HarnessResult<()> {
        self.delete_resource(&["rolebinding", name, "-n", namespace])
            .await?;
        Ok(())
    }
}
