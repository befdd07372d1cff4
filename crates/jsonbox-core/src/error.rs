//! Shared error type across jsonbox crates.

use thiserror::Error;

/// Stable error categories (used for logging and outcome labels).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Module configuration could not be compiled.
    Config,
    /// Outbound client or request could not be constructed.
    RequestBuild,
    /// Transport failure or non-2xx answer from the target.
    Fetch,
    /// Target body is not valid JSON.
    Parse,
    /// Inbound probe request is malformed.
    BadRequest,
    /// Collected metrics are inconsistent with their descriptions.
    Exposition,
}

impl ErrorKind {
    /// String representation used in logs and metric labels.
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Config => "config",
            ErrorKind::RequestBuild => "request_build",
            ErrorKind::Fetch => "fetch",
            ErrorKind::Parse => "parse",
            ErrorKind::BadRequest => "bad_request",
            ErrorKind::Exposition => "exposition",
        }
    }
}

/// Shared result type.
pub type Result<T> = std::result::Result<T, ProbeError>;

/// Errors that abort a probe.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("{0}")]
    Config(String),
    #[error("request build: {0}")]
    RequestBuild(String),
    #[error("{0}")]
    Fetch(String),
    #[error("{0}")]
    Parse(String),
    #[error("{0}")]
    BadRequest(String),
    #[error("exposition: {0}")]
    Exposition(String),
}

impl ProbeError {
    /// Map the error to its stable category.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ProbeError::Config(_) => ErrorKind::Config,
            ProbeError::RequestBuild(_) => ErrorKind::RequestBuild,
            ProbeError::Fetch(_) => ErrorKind::Fetch,
            ProbeError::Parse(_) => ErrorKind::Parse,
            ProbeError::BadRequest(_) => ErrorKind::BadRequest,
            ProbeError::Exposition(_) => ErrorKind::Exposition,
        }
    }
}

/// A JSON value that has no numeric reading.
///
/// Never aborts a probe: the offending node is skipped and the failure is
/// reported alongside the samples.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("cannot coerce {raw} to a float")]
pub struct CoercionError {
    /// JSON text of the rejected value.
    pub raw: String,
}
