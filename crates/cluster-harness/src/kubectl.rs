//! Thin wrapper around the `kubectl` binary.

use std::process::Stdio;
use std::time::Duration;

use error_stack::Report;
use error_stack::ResultExt;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;
use tracing::error;

use crate::error::HarnessError;
use crate::error::HarnessResult;

/// Timeout applied to plain kubectl invocations.
pub const KUBECTL_TIMEOUT: Duration = Duration::from_secs(10);

/// Captured result of a finished kubectl process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: Option<i32>,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Runs kubectl with fixed argument vectors.
#[derive(Debug, Clone)]
pub struct Kubectl {
    program: String,
    timeout: Duration,
}

impl Default for Kubectl {
    fn default() -> Self {
        Self::new("kubectl")
    }
}

impl Kubectl {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            timeout: KUBECTL_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Runs `kubectl <args>` with the configured timeout and returns stdout.
    ///
    /// # Errors
    ///
    /// - [`HarnessError::NotFound`] if kubectl reports `(NotFound)`
    /// - [`HarnessError::AlreadyExists`] if kubectl reports `(AlreadyExists)`
    /// - [`HarnessError::Command`] on any other failure, including the timeout
    pub async fn run(&self, args: &[&str]) -> HarnessResult<String> {
        let output = tokio::time::timeout(self.timeout, self.spawn(None, args))
            .await
            .map_err(|_| {
                Report::new(HarnessError::Command {
                    message: format!(
                        "kubectl {} timed out after {:?}",
                        args.join(" "),
                        self.timeout
                    ),
                })
            })??;

        if !output.success() {
            error!(
                "Failed to execute: kubectl {} : {}",
                args.join(" "),
                output.stderr.trim()
            );
            return Err(classify_failure(args, &output));
        }
        Ok(output.stdout)
    }

    /// Runs `kubectl <args>` with `stdin` piped in. No timeout is applied.
    ///
    /// Returns stdout, or stderr when kubectl printed nothing on stdout.
    ///
    /// # Errors
    ///
    /// Same classification as [`Kubectl::run`].
    pub async fn run_with_stdin(&self, stdin: &str, args: &[&str]) -> HarnessResult<String> {
        let output = self.spawn(Some(stdin), args).await?;

        if !output.success() {
            error!(
                "Failed to execute stdin: kubectl {} : {}",
                args.join(" "),
                output.stderr.trim()
            );
            return Err(classify_failure(args, &output));
        }
        if output.stdout.is_empty() {
            return Ok(output.stderr);
        }
        Ok(output.stdout)
    }

    async fn spawn(&self, stdin: Option<&str>, args: &[&str]) -> HarnessResult<CommandOutput> {
        debug!("{} {}", self.program, args.join(" "));

        let mut child = Command::new(&self.program)
            .args(args)
            .stdin(if stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .change_context(HarnessError::Command {
                message: format!("failed to start {}", self.program),
            })?;

        if let (Some(input), Some(mut pipe)) = (stdin, child.stdin.take()) {
            pipe.write_all(input.as_bytes())
                .await
                .change_context(HarnessError::Command {
                    message: "failed to write kubectl stdin".to_string(),
                })?;
            // closing the pipe lets `kubectl ... -f -` see EOF
            drop(pipe);
        }

        let output = child
            .wait_with_output()
            .await
            .change_context(HarnessError::Command {
                message: format!("failed to wait for {}", self.program),
            })?;

        Ok(CommandOutput {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            exit_code: output.status.code(),
        })
    }
}

/// Returns true if kubectl output says the server could not find the object.
pub fn is_not_found_output(output: &str) -> bool {
    output.contains("(NotFound)")
}

fn classify_failure(args: &[&str], output: &CommandOutput) -> Report<HarnessError> {
    let target = args.iter().skip(1).copied().collect::<Vec<_>>().join(" ");
    let context = if is_not_found_output(&output.stderr) {
        HarnessError::not_found("resource", target)
    } else if output.stderr.contains("(AlreadyExists)") {
        HarnessError::AlreadyExists {
            kind: "resource".to_string(),
            name: target,
        }
    } else {
        HarnessError::Command {
            message: format!("kubectl {} exited with {:?}", args.join(" "), output.exit_code),
        }
    };
    Report::new(context).attach_printable(output.stderr.trim().to_string())
}
