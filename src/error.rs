// Error types for tunnelkeeper

use crate::systemd::JobKind;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias used by the library
pub type Result<T, E = TunnelError> = std::result::Result<T, E>;

/// Errors surfaced by the service lifecycle controller and the log access engine
#[derive(Error, Debug)]
pub enum TunnelError {
    #[error("Failed to connect to systemd D-Bus: {0}")]
    ManagerUnavailable(String),

    #[error("Failed to {kind} '{unit}': {message}")]
    SubmissionFailed {
        unit: String,
        kind: JobKind,
        message: String,
    },

    #[error("{kind} job for '{unit}' failed with status: {status}")]
    JobFailed {
        unit: String,
        kind: JobKind,
        status: String,
    },

    #[error("Failed to get unit properties for '{unit}': {message}")]
    PropertyQueryFailed { unit: String, message: String },

    #[error("Failed to {action}: {source}")]
    LogAccessFailed {
        action: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write log: {0}")]
    LogWriteFailed(#[source] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid tunnel configuration {}: {message}", path.display())]
    TunnelConfig { path: PathBuf, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Discriminant of [`TunnelError`], for callers mapping errors onto status codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    ManagerUnavailable,
    SubmissionFailed,
    JobFailed,
    PropertyQueryFailed,
    LogAccessFailed,
    LogWriteFailed,
    Config,
    Io,
}

impl TunnelError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            TunnelError::ManagerUnavailable(_) => ErrorKind::ManagerUnavailable,
            TunnelError::SubmissionFailed { .. } => ErrorKind::SubmissionFailed,
            TunnelError::JobFailed { .. } => ErrorKind::JobFailed,
            TunnelError::PropertyQueryFailed { .. } => ErrorKind::PropertyQueryFailed,
            TunnelError::LogAccessFailed { .. } => ErrorKind::LogAccessFailed,
            TunnelError::LogWriteFailed(_) => ErrorKind::LogWriteFailed,
            TunnelError::Config(_) | TunnelError::TunnelConfig { .. } => ErrorKind::Config,
            TunnelError::Io(_) => ErrorKind::Io,
        }
    }

    pub(crate) fn log_access(action: &'static str, source: std::io::Error) -> Self {
        TunnelError::LogAccessFailed { action, source }
    }
}
