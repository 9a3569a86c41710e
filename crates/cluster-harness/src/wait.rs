//! Bounded polling for eventually-consistent cluster state.
//!
//! Every `wait_*` helper on [`ClusterSession`](crate::ClusterSession) is a
//! probe handed to [`WaitPolicy::wait_until`]. The probe decides how a
//! NotFound answer should be read (deleted, not created yet, or a hard
//! failure); the policy decides whether any other error is worth retrying.

use std::future::Future;
use std::time::Duration;

use error_stack::Report;
use tracing::debug;
use tracing::info;
use tracing::warn;

use crate::error::Disposition;
use crate::error::HarnessError;
use crate::error::HarnessResult;

/// Default number of probe attempts.
pub const RETRY_LOOP: u32 = 30;

/// Default wait between probe attempts.
pub const RETRY_INTERVAL: Duration = Duration::from_secs(5);

/// Attempt budget and fixed interval for a polling loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitPolicy {
    attempts: u32,
    interval: Duration,
}

impl Default for WaitPolicy {
    fn default() -> Self {
        Self {
            attempts: RETRY_LOOP,
            interval: RETRY_INTERVAL,
        }
    }
}

impl WaitPolicy {
    /// # Errors
    ///
    /// - [`HarnessError::Validation`] if `attempts` or `interval` is zero
    pub fn new(attempts: u32, interval: Duration) -> HarnessResult<Self> {
        if attempts == 0 {
            return Err(Report::new(HarnessError::Validation {
                message: "wait attempts must be positive".to_string(),
            }));
        }
        if interval.is_zero() {
            return Err(Report::new(HarnessError::Validation {
                message: "wait interval must be positive".to_string(),
            }));
        }
        Ok(Self { attempts, interval })
    }

    pub const fn attempts(&self) -> u32 {
        self.attempts
    }

    pub const fn interval(&self) -> Duration {
        self.interval
    }

    /// Upper bound of the time spent sleeping in one wait.
    pub fn budget(&self) -> Duration {
        self.interval * self.attempts.saturating_sub(1)
    }

    /// Polls `probe` until it reports `true`.
    ///
    /// The probe runs at most `attempts` times with `interval` between runs.
    /// Probe errors are dispatched on [`HarnessError::disposition`]: retryable
    /// errors count as "not yet", everything else is returned unchanged.
    ///
    /// # Errors
    ///
    /// - [`HarnessError::Timeout`] if the probe never reported `true`
    /// - any non-retryable error returned by the probe
    pub async fn wait_until<F, Fut>(&self, what: &str, mut probe: F) -> HarnessResult<()>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = HarnessResult<bool>>,
    {
        for attempt in 1..=self.attempts {
            match probe().await {
                Ok(true) => {
                    debug!(what, attempt, "wait condition met");
                    return Ok(());
                }
                Ok(false) => {
                    info!(what, attempt, attempts = self.attempts, "waiting");
                }
                Err(report) => match report.current_context().disposition() {
                    Disposition::Retry => {
                        warn!(what, attempt, "probe failed, will retry: {report:?}");
                    }
                    Disposition::Abort => return Err(report),
                },
            }

            if attempt < self.attempts {
                tokio::time::sleep(self.interval).await;
            }
        }

        info!(what, "giving up waiting");
        Err(Report::new(HarnessError::Timeout {
            what: what.to_string(),
            attempts: self.attempts,
        }))
    }
}
