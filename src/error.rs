//! Error taxonomy shared by every lifecycle component.

use thiserror::Error;

/// Errors produced while preparing or running a lifecycle operation
#[derive(Debug, Error)]
pub enum InstallerError {
    /// Malformed template or reference to an undefined variable
    #[error("template error: {0}")]
    Parse(String),

    /// The orchestration driver or the runtime client failed
    #[error("{0}")]
    Driver(String),

    /// Start, stop or uninstall against a topology with no service records
    #[error("{project} is not installed, run install first")]
    NotInstalled { project: String },

    /// An in-container command exited with a non-zero code
    #[error("command {command:?} in service {service} exited with code {code}")]
    ExecFailed {
        service: String,
        command: String,
        code: i64,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The caller aborted an in-flight call
    #[error("operation cancelled")]
    Cancelled,

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl InstallerError {
    /// Wrap any displayable driver/runtime failure
    pub fn driver(err: impl std::fmt::Display) -> Self {
        Self::Driver(err.to_string())
    }

    /// True when the error comes from a caller-initiated cancellation
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

impl From<minijinja::Error> for InstallerError {
    fn from(err: minijinja::Error) -> Self {
        Self::Parse(err.to_string())
    }
}

pub type Result<T, E = InstallerError> = std::result::Result<T, E>;
