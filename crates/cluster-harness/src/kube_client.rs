use std::path::PathBuf;

use error_stack::Report;
use error_stack::ResultExt;
use kube::config::KubeConfigOptions;
use kube::config::Kubeconfig;
use kube::Client;
use kube::Config;
use serde::Deserialize;
use tracing::info;
use tracing::warn;

use crate::error::HarnessError;
use crate::error::HarnessResult;
use crate::kubectl::Kubectl;

/// Where the client configuration comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KubeconfigSource {
    /// In-cluster service account or `~/.kube/config`
    Default,
    /// An explicit kubeconfig file
    File(PathBuf),
    /// Whatever `kubectl config view -o json --raw` reports
    Kubectl,
}

/// A connected client plus what we learned while building it.
pub struct ConnectedClient {
    pub client: Client,
    pub cluster_url: String,
    pub running_in_cluster: bool,
}

/// Builds a `kube` client from `source`, optionally pinning `context`.
///
/// # Errors
///
/// - [`HarnessError::Config`] if the configuration cannot be read or is invalid
pub async fn init_kube_client(
    source: &KubeconfigSource,
    context: Option<String>,
    kubectl: &Kubectl,
) -> HarnessResult<ConnectedClient> {
    let options = KubeConfigOptions {
        context,
        ..KubeConfigOptions::default()
    };

    let config = match source {
        KubeconfigSource::File(kubeconfig_path) => {
            let kubeconfig = Kubeconfig::read_from(kubeconfig_path).change_context(
                HarnessError::Config {
                    message: format!(
                        "Failed to read kubeconfig file: {}",
                        kubeconfig_path.display()
                    ),
                },
            )?;

            Config::from_custom_kubeconfig(kubeconfig, &options)
                .await
                .change_context(HarnessError::Config {
                    message: format!(
                        "Failed to create config from kubeconfig: {}",
                        kubeconfig_path.display()
                    ),
                })?
        }
        KubeconfigSource::Kubectl => {
            let raw = kubectl
                .run(&["config", "view", "-o", "json", "--raw"])
                .await
                .change_context(HarnessError::Config {
                    message: "Failed to read kubectl config".to_string(),
                })?;

            let view = KubectlConfigView::parse(&raw)?;
            let current = view.resolve(options.context.as_deref())?;
            if current.user.is_none() {
                // TLS verification stays as configured
                warn!(
                    context = %current.context,
                    "kubectl context has no user, requests will be anonymous"
                );
            }

            let kubeconfig = Kubeconfig::from_yaml(&raw).change_context(HarnessError::Config {
                message: "Failed to parse kubectl config".to_string(),
            })?;
            Config::from_custom_kubeconfig(kubeconfig, &options)
                .await
                .change_context(HarnessError::Config {
                    message: format!("Failed to create config for context {}", current.context),
                })?
        }
        KubeconfigSource::Default => {
            // Use default configuration (in-cluster or ~/.kube/config)
            Config::infer().await.change_context(HarnessError::Config {
                message: "Failed to infer Kubernetes configuration".to_string(),
            })?
        }
    };

    let cluster_url = config.cluster_url.to_string();
    let running_in_cluster = is_in_cluster_host(&cluster_url);
    let client = Client::try_from(config).change_context(HarnessError::Config {
        message: "Failed to create Kubernetes client".to_string(),
    })?;

    info!(%cluster_url, running_in_cluster, "Connected Kubernetes client");
    Ok(ConnectedClient {
        client,
        cluster_url,
        running_in_cluster,
    })
}

/// Test clusters reachable on the 10.0.0.0/8 network are treated as in-cluster.
pub fn is_in_cluster_host(cluster_url: &str) -> bool {
    cluster_url.contains("//10.")
}

/// Subset of `kubectl config view -o json` used to resolve the current context.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct KubectlConfigView {
    #[serde(default)]
    pub contexts: Vec<NamedContext>,
    #[serde(default)]
    pub users: Vec<NamedUser>,
    #[serde(default)]
    pub clusters: Vec<NamedCluster>,
    #[serde(rename = "current-context", default)]
    pub current: String,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct NamedContext {
    pub name: String,
    pub context: ContextRef,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct ContextRef {
    #[serde(default)]
    pub cluster: String,
    #[serde(default)]
    pub user: String,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct NamedCluster {
    pub name: String,
    pub cluster: ClusterInfo,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct ClusterInfo {
    #[serde(default)]
    pub server: String,
    #[serde(rename = "insecure-skip-tls-verify", default)]
    pub insecure: bool,
    #[serde(rename = "certificate-authority", default)]
    pub certificate_authority: String,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct NamedUser {
    pub name: String,
}

/// The context, cluster and user selected by a kubectl config.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedContext {
    pub context: String,
    pub cluster: String,
    pub server: String,
    pub user: Option<String>,
}

impl KubectlConfigView {
    pub fn parse(raw: &str) -> HarnessResult<Self> {
        serde_json::from_str(raw).change_context(HarnessError::Config {
            message: "failed to unmarshal kubectl config".to_string(),
        })
    }

    /// Resolves `context` (or the current context) to its cluster and user.
    ///
    /// # Errors
    ///
    /// - [`HarnessError::Config`] if the context, its cluster or its user is
    ///   referenced but not defined
    pub fn resolve(&self, context: Option<&str>) -> HarnessResult<ResolvedContext> {
        let wanted = context.unwrap_or(&self.current);

        let current = self
            .contexts
            .iter()
            .find(|c| c.name == wanted)
            .ok_or_else(|| {
                Report::new(HarnessError::Config {
                    message: format!("failed to find current context {wanted}"),
                })
            })?;

        let cluster = self
            .clusters
            .iter()
            .find(|c| c.name == current.context.cluster)
            .ok_or_else(|| {
                Report::new(HarnessError::Config {
                    message: format!(
                        "failed to find cluster {} for context {wanted}",
                        current.context.cluster
                    ),
                })
            })?;

        let user = if current.context.user.is_empty() {
            None
        } else {
            let user = self
                .users
                .iter()
                .find(|u| u.name == current.context.user)
                .ok_or_else(|| {
                    Report::new(HarnessError::Config {
                        message: format!(
                            "failed to find kube user {} for context {wanted}",
                            current.context.user
                        ),
                    })
                })?;
            Some(user.name.clone())
        };

        Ok(ResolvedContext {
            context: current.name.clone(),
            cluster: cluster.name.clone(),
            server: cluster.cluster.server.clone(),
            user,
        })
    }
}
