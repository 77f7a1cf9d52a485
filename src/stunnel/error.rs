//! Error types for building and supervising stunnel.
//!
//! Termination failures are not represented here: shutting stunnel down is
//! best-effort and only ever logged.

use std::path::PathBuf;
use thiserror::Error;

/// Unified error type for stunnel configuration and process operations.
#[derive(Debug, Error)]
pub enum StunnelError {
    /// A config file, secrets file or workspace directory could not be written.
    #[error("Failed to write {path}: {source}")]
    ConfigWrite {
        /// The file or directory that could not be written.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The stunnel binary could not be spawned.
    #[error("Failed to launch stunnel binary {binary}: {source}")]
    Launch {
        /// Path of the binary that failed to start.
        binary: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Reading stunnel's diagnostic output failed before readiness.
    #[error("Failed to read stunnel output before readiness: {0}")]
    ReadinessStream(#[source] std::io::Error),

    /// Waiting for the stunnel process failed.
    #[error("Failed to wait for stunnel process: {0}")]
    Wait(#[source] std::io::Error),

    /// A value cannot be represented in the stunnel config format.
    #[error("Invalid value for {field}: {message}")]
    InvalidValue {
        /// The field holding the invalid value.
        field: String,
        /// Why the value was rejected.
        message: String,
    },

    /// `start()` was called on a process that was already started.
    #[error("stunnel process was already started")]
    AlreadyStarted,
}

impl StunnelError {
    pub(crate) fn write(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        StunnelError::ConfigWrite {
            path: path.into(),
            source,
        }
    }
}
