use clap::{Parser, Subcommand};
use utils::version;

use crate::config::harness::{
    CollectLogsArgs, HarnessArgs, NamespaceArgs, PodRunningArgs, WaitPodsArgs,
};

#[derive(Parser)]
#[command(about, long_about, version = &**version::VERSION)]
pub struct Cli {
    #[command(flatten)]
    pub harness: HarnessArgs,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Print the API server version
    #[command(name = "server-version")]
    ServerVersion,
    /// Wait until the given number of pods match a label selector
    #[command(name = "wait-pods")]
    WaitPods(WaitPodsArgs),
    /// Wait until a named pod reaches the Running phase
    #[command(name = "wait-pod-running")]
    WaitPodRunning(PodRunningArgs),
    /// Capture logs of every pod of an app into the log directory
    #[command(name = "collect-logs")]
    CollectLogs(CollectLogsArgs),
    /// Prefix every node hostname label for tests
    #[command(name = "change-hostnames")]
    ChangeHostnames,
    /// Undo `change-hostnames`
    #[command(name = "restore-hostnames")]
    RestoreHostnames,
    /// Delete a namespace and wait until it is gone
    #[command(name = "delete-namespace")]
    DeleteNamespace(NamespaceArgs),
}
