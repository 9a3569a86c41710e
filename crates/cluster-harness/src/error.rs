//! Error types shared by every harness operation.

use core::error::Error;

use derive_more::Display;
use error_stack::Report;

/// Result type for harness operations.
pub type HarnessResult<T> = Result<T, Report<HarnessError>>;

/// Errors that can occur while driving the cluster under test.
#[derive(Debug, Display, Clone, PartialEq, Eq)]
pub enum HarnessError {
    /// The API server or kubectl reported that the object does not exist
    #[display("{kind} {name} not found")]
    NotFound { kind: String, name: String },

    /// Create was rejected because the object already exists
    #[display("{kind} {name} already exists")]
    AlreadyExists { kind: String, name: String },

    /// A wait condition did not become true within its attempt budget
    #[display("Timed out after {attempts} attempts waiting for {what}")]
    Timeout { what: String, attempts: u32 },

    /// Caller supplied invalid input
    #[display("Invalid input: {message}")]
    Validation { message: String },

    /// Any other API server or transport failure
    #[display("Kubernetes API error: {message}")]
    Api { message: String },

    /// kubectl exited non-zero, timed out or could not be spawned
    #[display("kubectl failed: {message}")]
    Command { message: String },

    /// Client configuration could not be loaded
    #[display("Failed to load cluster configuration: {message}")]
    Config { message: String },

    /// Local filesystem failure, e.g. while writing captured logs
    #[display("I/O error: {message}")]
    Io { message: String },
}

impl Error for HarnessError {}

/// What a polling loop does when a probe fails with a given error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Log the failure and treat the condition as "not yet"
    Retry,
    /// Stop polling and hand the error to the caller unchanged
    Abort,
}

impl HarnessError {
    pub fn not_found(kind: impl Into<String>, name: impl Into<String>) -> Self {
        Self::NotFound {
            kind: kind.into(),
            name: name.into(),
        }
    }

    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    pub const fn is_already_exists(&self) -> bool {
        matches!(self, Self::AlreadyExists { .. })
    }

    /// Transient failures are retried, definitive answers are not.
    pub const fn disposition(&self) -> Disposition {
        match self {
            Self::Api { .. } | Self::Command { .. } | Self::Io { .. } => Disposition::Retry,
            Self::NotFound { .. }
            | Self::AlreadyExists { .. }
            | Self::Timeout { .. }
            | Self::Validation { .. }
            | Self::Config { .. } => Disposition::Abort,
        }
    }

    /// Classify a `kube` client error for the object `kind`/`name`.
    pub fn from_kube(err: &kube::Error, kind: &str, name: &str) -> Self {
        match err {
            kube::Error::Api(response) if response.code == 404 => Self::not_found(kind, name),
            kube::Error::Api(response)
                if response.code == 409 && response.reason == "AlreadyExists" =>
            {
                Self::AlreadyExists {
                    kind: kind.to_string(),
                    name: name.to_string(),
                }
            }
            other => Self::Api {
                message: format!("{kind} {name}: {other}"),
            },
        }
    }
}

/// Maps `kube` results into classified harness reports.
pub trait KubeResultExt<T> {
    fn classify(self, kind: &str, name: &str) -> HarnessResult<T>;
}

impl<T> KubeResultExt<T> for Result<T, kube::Error> {
    fn classify(self, kind: &str, name: &str) -> HarnessResult<T> {
        self.map_err(|e| Report::new(HarnessError::from_kube(&e, kind, name)).attach_printable(e))
    }
}

/// Returns true if the report's top-level context is `NotFound`.
pub fn is_not_found(report: &Report<HarnessError>) -> bool {
    report.current_context().is_not_found()
}

#[cfg(test)]
mod tests {
    use kube::core::ErrorResponse;
    use similar_asserts::assert_eq;

    use super::*;

    fn api_error(code: u16, reason: &str) -> kube::Error {
        kube::Error::Api(ErrorResponse {
            status: "Failure".to_string(),
            message: format!("pods \"web-0\" {reason}"),
            reason: reason.to_string(),
            code,
        })
    }

    #[test]
    fn classifies_404_as_not_found() {
        let err = HarnessError::from_kube(&api_error(404, "NotFound"), "pod", "web-0");
        assert_eq!(err, HarnessError::not_found("pod", "web-0"));
        assert_eq!(err.disposition(), Disposition::Abort);
    }

    #[test]
    fn classifies_conflict_as_already_exists() {
        let err = HarnessError::from_kube(&api_error(409, "AlreadyExists"), "namespace", "ceph");
        assert!(err.is_already_exists());
    }

    #[test]
    fn other_api_errors_are_retried() {
        let err = HarnessError::from_kube(&api_error(500, "InternalError"), "pod", "web-0");
        assert!(matches!(err, HarnessError::Api { .. }));
        assert_eq!(err.disposition(), Disposition::Retry);
    }

    #[test]
    fn classify_keeps_kind_and_name() {
        let result: Result<(), kube::Error> = Err(api_error(404, "NotFound"));
        let report = result.classify("persistentvolumeclaim", "data").unwrap_err();
        assert!(is_not_found(&report));
        assert_eq!(
            report.current_context().to_string(),
            "persistentvolumeclaim data not found"
        );
    }
}
