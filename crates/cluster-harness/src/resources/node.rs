use k8s_openapi::api::core::v1::Node;
use kube::api::ListParams;
use kube::api::Patch;
use kube::api::PatchParams;
use kube::Api;
use serde_json::json;
use tracing::info;

use crate::error::HarnessResult;
use crate::error::KubeResultExt;
use crate::ClusterSession;

pub const HOSTNAME_LABEL: &str = "kubernetes.io/hostname";
pub const HOSTNAME_TEST_PREFIX: &str = "testprefix-";

/// Hostname label value with the test prefix, or `None` if it already has one.
pub fn prefixed_hostname(hostname: &str) -> Option<String> {
    if hostname.starts_with(HOSTNAME_TEST_PREFIX) {
        return None;
    }
    Some(format!("{HOSTNAME_TEST_PREFIX}{hostname}"))
}

/// Hostname label value without the test prefix, or `None` if it has none.
pub fn restored_hostname(hostname: &str) -> Option<String> {
    hostname
        .strip_prefix(HOSTNAME_TEST_PREFIX)
        .map(str::to_string)
}

impl ClusterSession {
    /// Prefixes the hostname label of every node, so node name and hostname differ.
    ///
    /// Returns the names of the nodes that were relabelled. A node whose label
    /// already carries the prefix is skipped here, and
    /// [`restore_hostnames`](Self::restore_hostnames) still strips it, so such a
    /// node does not get its original label back.
    pub async fn change_hostnames(&self) -> HarnessResult<Vec<String>> {
        self.relabel_hostnames("changed", prefixed_hostname).await
    }

    /// Removes the test prefix from every node that has it.
    pub async fn restore_hostnames(&self) -> HarnessResult<Vec<String>> {
        self.relabel_hostnames("restoring", restored_hostname).await
    }

    async fn relabel_hostnames(
        &self,
        verb: &str,
        rewrite: fn(&str) -> Option<String>,
    ) -> HarnessResult<Vec<String>> {
        let api: Api<Node> = Api::all(self.client().clone());
        let nodes = api
            .list(&ListParams::default())
            .await
            .classify("nodes", "")?;

        let mut relabelled = Vec::new();
        for node in nodes.items {
            let Some(name) = node.metadata.name.as_deref() else {
                continue;
            };
            let hostname = node
                .metadata
                .labels
                .as_ref()
                .and_then(|labels| labels.get(HOSTNAME_LABEL))
                .map(String::as_str)
                .unwrap_or_default();
            let Some(updated) = rewrite(hostname) else {
                continue;
            };

            info!("{verb} hostname of node {name} to {updated}");
            let patch = json!({"metadata": {"labels": {HOSTNAME_LABEL: updated}}});
            api.patch(name, &PatchParams::default(), &Patch::Merge(&patch))
                .await
                .classify("node", name)?;
            relabelled.push(name.to_string());
        }
        Ok(relabelled)
    }
}
