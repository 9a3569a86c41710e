use std::path::PathBuf;

use error_stack::ResultExt;
use kube::Client;
use semver::Version;
use tracing::info;

use crate::config::HarnessConfig;
use crate::error::HarnessError;
use crate::error::HarnessResult;
use crate::error::KubeResultExt;
use crate::kube_client;
use crate::kubectl::Kubectl;
use crate::wait::WaitPolicy;

/// Everything a test needs to talk to the cluster under test.
///
/// Passed explicitly to every helper; there is no process-wide client.
#[derive(Clone)]
pub struct ClusterSession {
    client: Client,
    kubectl: Kubectl,
    wait: WaitPolicy,
    running_in_cluster: bool,
    log_dir: PathBuf,
}

impl ClusterSession {
    /// Connects to the cluster described by `config`.
    ///
    /// # Errors
    ///
    /// - [`HarnessError::Config`] if no client can be built
    /// - [`HarnessError::Validation`] if the wait policy is invalid
    pub async fn connect(config: &HarnessConfig) -> HarnessResult<Self> {
        let kubectl = Kubectl::new(&config.kubectl);
        let wait = WaitPolicy::new(config.retry_attempts, config.retry_interval)?;
        let connected =
            kube_client::init_kube_client(&config.source, config.context.clone(), &kubectl)
                .await?;

        Ok(Self {
            client: connected.client,
            kubectl,
            wait,
            running_in_cluster: connected.running_in_cluster,
            log_dir: config.log_dir.clone(),
        })
    }

    /// Assembles a session from already-built parts.
    pub fn from_parts(client: Client, kubectl: Kubectl, wait: WaitPolicy) -> Self {
        Self {
            client,
            kubectl,
            wait,
            running_in_cluster: false,
            log_dir: PathBuf::from(crate::config::DEFAULT_LOG_DIR),
        }
    }

    pub fn with_running_in_cluster(mut self, running_in_cluster: bool) -> Self {
        self.running_in_cluster = running_in_cluster;
        self
    }

    pub fn with_log_dir(mut self, log_dir: impl Into<PathBuf>) -> Self {
        self.log_dir = log_dir.into();
        self
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    pub fn kubectl_runner(&self) -> &Kubectl {
        &self.kubectl
    }

    pub fn wait_policy(&self) -> &WaitPolicy {
        &self.wait
    }

    pub fn running_in_cluster(&self) -> bool {
        self.running_in_cluster
    }

    pub fn log_dir(&self) -> &PathBuf {
        &self.log_dir
    }

    /// Git version of the API server, e.g. `v1.28.3`.
    pub async fn server_version(&self) -> HarnessResult<String> {
        let info = self
            .client
            .apiserver_version()
            .await
            .classify("apiserver", "version")?;
        Ok(info.git_version)
    }

    /// Returns true if the API server is at least `min_version`.
    ///
    /// # Errors
    ///
    /// - [`HarnessError::Validation`] if either version cannot be parsed
    pub async fn version_at_least(&self, min_version: &str) -> HarnessResult<bool> {
        let server = self.server_version().await?;
        let at_least = semantic_version(&server)? >= semantic_version(min_version)?;
        info!(%server, min_version, at_least, "compared server version");
        Ok(at_least)
    }
}

/// Parses `v1.28.3+k3s1` style versions; the leading `v` is optional.
///
/// # Errors
///
/// - [`HarnessError::Validation`] if `version` is not semver
pub fn semantic_version(version: &str) -> HarnessResult<Version> {
    let trimmed = version.trim();
    Version::parse(trimmed.strip_prefix('v').unwrap_or(trimmed)).change_context_lazy(|| {
        HarnessError::Validation {
            message: format!("invalid semantic version {version:?}"),
        }
    })
}
