//! Helpers for driving a Kubernetes cluster from storage-orchestrator integration tests.

pub mod config;
pub mod error;
pub mod kube_client;
pub mod kubectl;
pub mod logs;
pub mod manifest;
pub mod resources;
pub mod session;
pub mod wait;

pub use error::HarnessError;
pub use error::HarnessResult;
pub use session::ClusterSession;
pub use wait::WaitPolicy;
