use k8s_openapi::api::core::v1::Namespace;
use kube::api::DeleteParams;
use kube::api::PostParams;
use kube::Api;
use tracing::info;

use crate::error::HarnessResult;
use crate::error::KubeResultExt;
use crate::manifest;
use crate::ClusterSession;

impl ClusterSession {
    /// Creates `namespace`; an existing namespace is fine.
    pub async fn create_namespace(&self, namespace: &str) -> HarnessResult<()> {
        let api: Api<Namespace> = Api::all(self.client().clone());
        match api
            .create(&PostParams::default(), &manifest::namespace(namespace))
            .await
            .classify("namespace", namespace)
        {
            Ok(_) => {
                info!(namespace, "created namespace");
                Ok(())
            }
            Err(report) if report.current_context().is_already_exists() => Ok(()),
            Err(report) => Err(report),
        }
    }

    /// Starts deleting `namespace`; a missing namespace counts as deleted.
    pub async fn delete_namespace(&self, namespace: &str) -> HarnessResult<()> {
        let api: Api<Namespace> = Api::all(self.client().clone());
        match api
            .delete(namespace, &DeleteParams::default())
            .await
            .classify("namespace", namespace)
        {
            Ok(_) => Ok(()),
            Err(report) if report.current_context().is_not_found() => Ok(()),
            Err(report) => Err(report),
        }
    }

    /// Waits until `namespace` no longer exists.
    pub async fn wait_until_namespace_deleted(&self, namespace: &str) -> HarnessResult<()> {
        let api: Api<Namespace> = Api::all(self.client().clone());
        let api = &api;
        self.wait_policy()
            .wait_until(&format!("namespace {namespace} to be deleted"), move || async move {
                match api.get_opt(namespace).await.classify("namespace", namespace)? {
                    None => Ok(true),
                    Some(ns) => {
                        let phase = ns.status.and_then(|s| s.phase).unwrap_or_default();
                        info!(namespace, %phase, "namespace still present");
                        Ok(false)
                    }
                }
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use test_log::test;

    use crate::resources::testing::json_response;
    use crate::resources::testing::mock_session;
    use crate::resources::testing::not_found;
    use crate::resources::testing::serve;

    #[test(tokio::test)]
    async fn create_namespace_tolerates_existing() {
        let (session, handle) = mock_session(3);
        let server = serve(
            handle,
            vec![(
                "POST",
                "/api/v1/namespaces",
                json_response(
                    409,
                    &json!({
                        "kind": "Status",
                        "apiVersion": "v1",
                        "status": "Failure",
                        "message": "namespaces \"rook\" already exists",
                        "reason": "AlreadyExists",
                        "code": 409
                    }),
                ),
            )],
        );

        session.create_namespace("rook").await.expect("existing is fine");
        server.await.expect("server task");
    }

    #[test(tokio::test)]
    async fn delete_missing_namespace_succeeds() {
        let (session, handle) = mock_session(3);
        let server = serve(
            handle,
            vec![("DELETE", "/api/v1/namespaces/rook", not_found("namespaces", "rook"))],
        );

        session.delete_namespace("rook").await.expect("idempotent delete");
        server.await.expect("server task");
    }

    #[test(tokio::test(start_paused = true))]
    async fn waits_for_namespace_to_disappear() {
        let (session, handle) = mock_session(5);
        let terminating = json!({
            "apiVersion": "v1",
            "kind": "Namespace",
            "metadata": {"name": "rook"},
            "status": {"phase": "Terminating"}
        });
        let server = serve(
            handle,
            vec![
                ("GET", "/api/v1/namespaces/rook", json_response(200, &terminating)),
                ("GET", "/api/v1/namespaces/rook", not_found("namespaces", "rook")),
            ],
        );

        session
            .wait_until_namespace_deleted("rook")
            .await
            .expect("namespace goes away");
        server.await.expect("server task");
    }
}
