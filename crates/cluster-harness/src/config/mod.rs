pub mod cli;
pub mod harness;

use std::path::PathBuf;
use std::time::Duration;

use crate::kube_client::KubeconfigSource;
use crate::wait::RETRY_INTERVAL;
use crate::wait::RETRY_LOOP;

/// Directory captured pod logs are written to, relative to the working directory.
pub const DEFAULT_LOG_DIR: &str = "_output/tests";

/// Resolved settings for a [`ClusterSession`](crate::ClusterSession).
#[derive(Debug, Clone)]
pub struct HarnessConfig {
    pub source: KubeconfigSource,
    pub context: Option<String>,
    pub kubectl: String,
    pub retry_attempts: u32,
    pub retry_interval: Duration,
    pub log_dir: PathBuf,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            source: KubeconfigSource::Default,
            context: None,
            kubectl: "kubectl".to_string(),
            retry_attempts: RETRY_LOOP,
            retry_interval: RETRY_INTERVAL,
            log_dir: PathBuf::from(DEFAULT_LOG_DIR),
        }
    }
}

impl From<&harness::HarnessArgs> for HarnessConfig {
    fn from(args: &harness::HarnessArgs) -> Self {
        let source = match (&args.kubeconfig, args.from_kubectl) {
            (_, true) => KubeconfigSource::Kubectl,
            (Some(path), false) => KubeconfigSource::File(path.clone()),
            (None, false) => KubeconfigSource::Default,
        };

        Self {
            source,
            context: args.context.clone(),
            kubectl: args.kubectl.clone(),
            retry_attempts: args.retry_attempts,
            retry_interval: Duration::from_secs(args.retry_interval_secs),
            log_dir: args.log_dir.clone(),
        }
    }
}

pub use cli::*;
pub use harness::*;
