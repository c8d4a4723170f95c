//! Bootstrap Error Types
//!
//! Every failure on the startup path is one of these kinds. All of them are
//! fatal: the process logs the error and exits.

use std::path::PathBuf;
use thiserror::Error;

use crate::lndc::LndcError;

/// Startup errors
#[derive(Error, Debug)]
pub enum BootstrapError {
    #[error("Malformed connection string '{input}': {reason}")]
    Parse { input: String, reason: String },

    #[error("lit address passed in -con parameter is not valid: '{0}'")]
    InvalidAddress(String),

    #[error("Failed to load key file {}: {reason}", path.display())]
    KeyLoad { path: PathBuf, reason: String },

    #[error("Connection failed: {0}")]
    Connect(String),
}

impl BootstrapError {
    pub(crate) fn key_load(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        BootstrapError::KeyLoad {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

impl From<LndcError> for BootstrapError {
    fn from(err: LndcError) -> Self {
        BootstrapError::Connect(err.to_string())
    }
}

/// Result type alias for bootstrap operations
pub type BootstrapResult<T> = Result<T, BootstrapError>;
