use anyhow::Result;
use clap::Parser;
use cluster_harness::config::Cli;
use cluster_harness::config::Commands;
use cluster_harness::config::HarnessConfig;
use cluster_harness::ClusterSession;
use utils::version;

/// Sets up global panic hooks.
fn setup_global_hooks() {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        default_hook(panic_info);
        tracing::error!("Thread panicked: {}", panic_info);
    }));
}

#[tokio::main]
async fn main() -> Result<()> {
    setup_global_hooks();
    utils::logging::init();

    let cli = Cli::parse();
    tracing::debug!("Starting cluster-harness {}", &**version::VERSION);

    let config = HarnessConfig::from(&cli.harness);
    let session = ClusterSession::connect(&config)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to connect to cluster: {e:?}"))?;

    match cli.command {
        Commands::ServerVersion => {
            let version = session
                .server_version()
                .await
                .map_err(|e| anyhow::anyhow!("Failed to get server version: {e:?}"))?;
            println!("{version}");
        }
        Commands::WaitPods(args) => {
            session
                .wait_for_pod_count(&args.label, &args.namespace, args.count)
                .await
                .map_err(|e| anyhow::anyhow!("Pods did not converge: {e:?}"))?;
        }
        Commands::WaitPodRunning(args) => {
            session
                .wait_for_pod_running(&args.name, &args.namespace)
                .await
                .map_err(|e| anyhow::anyhow!("Pod is not running: {e:?}"))?;
        }
        Commands::CollectLogs(args) => {
            let files = session
                .collect_pod_logs(&args.app, &args.host_type, &args.namespace, &args.test_name)
                .await
                .map_err(|e| anyhow::anyhow!("Failed to collect logs: {e:?}"))?;
            for file in files {
                println!("{}", file.display());
            }
        }
        Commands::ChangeHostnames => {
            let nodes = session
                .change_hostnames()
                .await
                .map_err(|e| anyhow::anyhow!("Failed to change hostnames: {e:?}"))?;
            tracing::info!("relabelled {} nodes", nodes.len());
        }
        Commands::RestoreHostnames => {
            let nodes = session
                .restore_hostnames()
                .await
                .map_err(|e| anyhow::anyhow!("Failed to restore hostnames: {e:?}"))?;
            tracing::info!("restored {} nodes", nodes.len());
        }
        Commands::DeleteNamespace(args) => {
            session
                .delete_namespace(&args.namespace)
                .await
                .map_err(|e| anyhow::anyhow!("Failed to delete namespace: {e:?}"))?;
            session
                .wait_until_namespace_deleted(&args.namespace)
                .await
                .map_err(|e| anyhow::anyhow!("Namespace was not deleted: {e:?}"))?;
        }
    }

    Ok(())
}
