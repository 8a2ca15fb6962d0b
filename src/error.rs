//! Error taxonomy for the harvester.
//!
//! Per-item problems ([`FetchError`], [`ExtractionFailure`]) are recorded and
//! the run continues. [`HarvestError`] is reserved for conditions that must
//! stop the process: a missing universe or a checkpoint that cannot be written.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// HTTP status class of a non-success response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusClass {
    Informational,
    Redirection,
    ClientError,
    ServerError,
}

impl StatusClass {
    pub fn from_status(status: u16) -> Self {
        match status {
            100..=199 => StatusClass::Informational,
            300..=399 => StatusClass::Redirection,
            400..=499 => StatusClass::ClientError,
            _ => StatusClass::ServerError,
        }
    }
}

impl fmt::Display for StatusClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatusClass::Informational => write!(f, "informational"),
            StatusClass::Redirection => write!(f, "redirection"),
            StatusClass::ClientError => write!(f, "client error"),
            StatusClass::ServerError => write!(f, "server error"),
        }
    }
}

/// A single failed attempt at retrieving a work item's detail view.
#[derive(Debug, Clone, Error)]
pub enum FetchError {
    #[error("timed out: {0}")]
    Timeout(String),

    #[error("element not found: {0}")]
    ElementNotFound(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("HTTP {status} ({class}): {message}")]
    Http {
        status: u16,
        class: StatusClass,
        message: String,
    },

    #[error("malformed response: {0}")]
    Malformed(String),

    #[error("extraction returned neither a title nor any certifier")]
    Empty,
}

impl FetchError {
    pub fn http(status: u16, message: impl Into<String>) -> Self {
        FetchError::Http {
            status,
            class: StatusClass::from_status(status),
            message: message.into(),
        }
    }

    /// Whether another attempt on the same work item could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            FetchError::Timeout(_) | FetchError::ElementNotFound(_) | FetchError::Network(_) => {
                true
            }
            FetchError::Http { status, class, .. } => {
                *class == StatusClass::ServerError || *status == 408 || *status == 429
            }
            FetchError::Malformed(_) | FetchError::Empty => false,
        }
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FetchError::Timeout(err.to_string())
        } else if let Some(status) = err.status() {
            FetchError::http(status.as_u16(), err.to_string())
        } else if err.is_decode() {
            FetchError::Malformed(err.to_string())
        } else {
            FetchError::Network(err.to_string())
        }
    }
}

/// Terminal, non-fatal outcome for one work item after all attempts.
#[derive(Debug, Clone, Error)]
#[error("{work_item} failed after {attempts} attempt(s): {last_error}")]
pub struct ExtractionFailure {
    pub work_item: String,
    pub attempts: usize,
    pub last_error: FetchError,
}

#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("failed to load work-item universe from {path}: {reason}")]
    UniverseLoad { path: PathBuf, reason: String },

    #[error("failed to persist {path}: {source}")]
    Persistence {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{path} is not a valid artifact: {reason}")]
    CorruptArtifact { path: PathBuf, reason: String },

    #[error("invalid configuration: {0}")]
    Config(String),
}
