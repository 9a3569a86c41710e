//! Detaches RBD block devices through the kernel's rbd sysfs bus.

pub mod config;
pub mod error;
pub mod exec;
pub mod rbd;
pub mod unmount;

pub use error::BlockError;
pub use exec::CommandExecutor;
pub use exec::Executor;
pub use unmount::unmount_block;
