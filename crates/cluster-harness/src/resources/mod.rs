//! Create/get/list/delete helpers on [`ClusterSession`].
//!
//! Mutations run once. Reads that wait for convergence go through
//! [`WaitPolicy::wait_until`](crate::wait::WaitPolicy::wait_until). A delete
//! of something that is already gone succeeds.

mod crd;
mod diagnostics;
mod namespace;
mod node;
mod pod;
mod pvc;
mod rbac;
mod service;
mod storage;
mod volume;

use error_stack::Report;
use serde::Serialize;
use tracing::error;

pub use node::prefixed_hostname;
pub use node::restored_hostname;
pub use node::HOSTNAME_LABEL;
pub use node::HOSTNAME_TEST_PREFIX;
pub use pvc::CLAIM_BOUND;
pub use storage::is_default_class;
pub use volume::volume_resource;

use crate::error::HarnessError;
use crate::error::HarnessResult;
use crate::manifest;
use crate::ClusterSession;

/// Label selector matching every pod of `app`.
pub fn app_selector(app: &str) -> String {
    format!("app={app}")
}

impl ClusterSession {
    /// `kubectl <args>` with the 10 second timeout.
    pub async fn kubectl(&self, args: &[&str]) -> HarnessResult<String> {
        self.kubectl_runner().run(args).await
    }

    /// `kubectl <args>` fed from `stdin`, without timeout.
    pub async fn kubectl_with_stdin(&self, stdin: &str, args: &[&str]) -> HarnessResult<String> {
        self.kubectl_runner().run_with_stdin(stdin, args).await
    }

    /// `kubectl get <args>`.
    pub async fn get_resource(&self, args: &[&str]) -> HarnessResult<String> {
        let mut full = vec!["get"];
        full.extend_from_slice(args);
        self.kubectl(&full).await
    }

    /// `kubectl delete <args>`; an object that is already gone counts as deleted.
    pub async fn delete_resource(&self, args: &[&str]) -> HarnessResult<String> {
        let mut full = vec!["delete"];
        full.extend_from_slice(args);
        match self.kubectl(&full).await {
            Ok(out) => Ok(out),
            Err(report) if report.current_context().is_not_found() => Ok(String::new()),
            Err(report) => Err(report),
        }
    }

    /// Serializes `manifest` and runs `kubectl <action> -f -` on it.
    pub async fn resource_operation<T: Serialize>(
        &self,
        action: &str,
        manifest: &T,
    ) -> HarnessResult<String> {
        let definition = manifest::to_yaml(manifest)?;
        let args = [action, "-f", "-"];
        self.kubectl_with_stdin(&definition, &args)
            .await
            .map_err(|report| {
                error!("Failed to execute kubectl {} -- {report:?}", args.join(" "));
                report.attach_printable(format!("manifest:\n{definition}"))
            })
    }

    /// Runs `command` inside `pod` via `kubectl exec`.
    pub async fn exec(
        &self,
        namespace: &str,
        pod: &str,
        command: &str,
        command_args: &[&str],
    ) -> HarnessResult<String> {
        let mut args = vec!["exec", "-n", namespace, pod, "--", command];
        args.extend_from_slice(command_args);
        self.kubectl(&args).await.map_err(|report| {
            report.attach_printable(format!(
                "kubectl exec command {command} failed on pod {pod} in namespace {namespace}"
            ))
        })
    }

    pub async fn scale_stateful_set(
        &self,
        name: &str,
        namespace: &str,
        replicas: u32,
    ) -> HarnessResult<()> {
        let replicas = format!("--replicas={replicas}");
        self.kubectl(&["-n", namespace, "scale", "statefulsets", name, &replicas])
            .await?;
        Ok(())
    }
}

fn invalid(message: impl Into<String>) -> Report<HarnessError> {
    Report::new(HarnessError::Validation {
        message: message.into(),
    })
}
