use anyhow::Result;
use blockctl::config::Cli;
use blockctl::config::Commands;
use blockctl::rbd;
use blockctl::CommandExecutor;
use clap::Parser;

fn main() -> Result<()> {
    utils::logging::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Unmount(args) => {
            let out = blockctl::unmount_block(
                &args.device,
                &args.path,
                &cli.sys_bus_path,
                &CommandExecutor,
            )
            .map_err(|e| anyhow::anyhow!("Failed to unmount block device: {e:?}"))?;
            println!("{out}");
        }
        Commands::List => {
            let images = rbd::list_mapped_images(&cli.sys_bus_path)
                .map_err(|e| anyhow::anyhow!("Failed to list rbd images: {e:?}"))?;
            for image in images {
                println!("{}\t{}\t{}", image.device_path(), image.pool, image.name);
            }
        }
    }

    Ok(())
}
