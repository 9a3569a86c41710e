use std::path::PathBuf;

use clap::Args;
use clap::Parser;
use clap::Subcommand;
use utils::version;

use crate::rbd::DEFAULT_SYS_BUS_PATH;

#[derive(Parser)]
#[command(about, long_about, version = &**version::VERSION)]
pub struct Cli {
    #[arg(
        long,
        global = true,
        env = "BLOCKCTL_SYS_BUS_PATH",
        default_value = DEFAULT_SYS_BUS_PATH,
        value_hint = clap::ValueHint::DirPath,
        help = "Root of the rbd sysfs bus"
    )]
    pub sys_bus_path: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Unmount a block device and remove its rbd mapping
    Unmount(UnmountArgs),
    /// List mapped rbd images
    List,
}

#[derive(Args, Debug, Clone)]
pub struct UnmountArgs {
    /// Device to remove, e.g. /dev/rbd0; resolved from --path if omitted
    #[arg(long, default_value = "")]
    pub device: String,

    /// Mount point to unmount first
    #[arg(long, default_value = "")]
    pub path: String,
}

#[cfg(test)]
mod tests {
    use similar_asserts::assert_eq;

    use super::*;

    #[test]
    fn parses_unmount_with_path_only() {
        let cli = Cli::try_parse_from(["blockctl", "unmount", "--path", "/mnt/data"])
            .expect("parses");
        assert_eq!(cli.sys_bus_path, PathBuf::from(DEFAULT_SYS_BUS_PATH));
        let Commands::Unmount(args) = cli.command else {
            panic!("expected unmount");
        };
        assert_eq!(args.device, "");
        assert_eq!(args.path, "/mnt/data");
    }

    #[test]
    fn sys_bus_path_is_global() {
        let cli = Cli::try_parse_from(["blockctl", "list", "--sys-bus-path", "/tmp/rbd"])
            .expect("parses");
        assert_eq!(cli.sys_bus_path, PathBuf::from("/tmp/rbd"));
        assert!(matches!(cli.command, Commands::List));
    }
}
