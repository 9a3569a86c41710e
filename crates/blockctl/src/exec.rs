//! Shell command execution behind a trait so device logic can be tested without a kernel.

use std::process::Command;

use error_stack::Report;
use error_stack::ResultExt;
use tracing::debug;

use crate::error::BlockError;

/// Runs shell pipelines on behalf of block device operations.
pub trait Executor {
    /// Runs `command` through `sh -c` and returns its trimmed stdout.
    ///
    /// `action_name` describes the step for logs and errors.
    fn execute_command_pipeline(
        &self,
        action_name: &str,
        command: &str,
    ) -> Result<String, Report<BlockError>>;
}

/// [`Executor`] that spawns `sh`.
#[derive(Debug, Clone, Copy, Default)]
pub struct CommandExecutor;

impl Executor for CommandExecutor {
    fn execute_command_pipeline(
        &self,
        action_name: &str,
        command: &str,
    ) -> Result<String, Report<BlockError>> {
        debug!(action = action_name, command, "running pipeline");
        let output = Command::new("sh")
            .arg("-c")
            .arg(command)
            .output()
            .change_context_lazy(|| BlockError::Exec {
                action: action_name.to_string(),
                message: "failed to start sh".to_string(),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Report::new(BlockError::Exec {
                action: action_name.to_string(),
                message: format!("`{command}` exited with {}", output.status),
            })
            .attach_printable(stderr.trim().to_string()));
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

/// Quotes `arg` for safe interpolation into an `sh` command line.
pub fn shell_quote(arg: &str) -> String {
    format!("'{}'", arg.replace('\'', r"'\''"))
}
