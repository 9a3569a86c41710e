use std::path::PathBuf;

use clap::Args;

use crate::config::DEFAULT_LOG_DIR;

/// Connection and polling settings shared by every subcommand.
#[derive(Args, Debug, Clone)]
pub struct HarnessArgs {
    #[arg(
        long,
        global = true,
        env = "KUBECONFIG",
        value_hint = clap::ValueHint::FilePath,
        help = "Path to kubeconfig file (defaults to cluster config or ~/.kube/config)"
    )]
    pub kubeconfig: Option<PathBuf>,

    #[arg(
        long,
        global = true,
        env = "HARNESS_KUBE_CONTEXT",
        help = "Kubeconfig context to use instead of the current one"
    )]
    pub context: Option<String>,

    #[arg(
        long,
        global = true,
        env = "HARNESS_KUBECONFIG_FROM_KUBECTL",
        help = "Load the client configuration from `kubectl config view`"
    )]
    pub from_kubectl: bool,

    #[arg(
        long,
        global = true,
        env = "KUBECTL",
        default_value = "kubectl",
        help = "kubectl binary to shell out to"
    )]
    pub kubectl: String,

    #[arg(
        long,
        global = true,
        env = "HARNESS_RETRY_ATTEMPTS",
        default_value = "30",
        help = "Number of attempts for every wait"
    )]
    pub retry_attempts: u32,

    #[arg(
        long,
        global = true,
        env = "HARNESS_RETRY_INTERVAL_SECS",
        default_value = "5",
        help = "Seconds to sleep between wait attempts"
    )]
    pub retry_interval_secs: u64,

    #[arg(
        long,
        global = true,
        env = "HARNESS_LOG_DIR",
        default_value = DEFAULT_LOG_DIR,
        value_hint = clap::ValueHint::DirPath,
        help = "Directory captured pod logs are written to"
    )]
    pub log_dir: PathBuf,
}

#[derive(Args, Debug, Clone)]
pub struct WaitPodsArgs {
    /// Label selector, e.g. app=rook-ceph-osd
    #[arg(short, long)]
    pub label: String,

    #[arg(short, long)]
    pub namespace: String,

    /// Expected number of pods
    #[arg(short, long)]
    pub count: usize,
}

#[derive(Args, Debug, Clone)]
pub struct PodRunningArgs {
    #[arg(long)]
    pub name: String,

    #[arg(short, long)]
    pub namespace: String,
}

#[derive(Args, Debug, Clone)]
pub struct CollectLogsArgs {
    /// Value of the `app` label
    #[arg(long)]
    pub app: String,

    #[arg(short, long)]
    pub namespace: String,

    /// Host type recorded in the file name, e.g. kubeadm
    #[arg(long, default_value = "local")]
    pub host_type: String,

    /// Test name recorded in the file name
    #[arg(long)]
    pub test_name: String,
}

#[derive(Args, Debug, Clone)]
pub struct NamespaceArgs {
    #[arg(short, long)]
    pub namespace: String,
}
