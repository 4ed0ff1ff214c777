//! Error types for scan control and persistence.

use thiserror::Error;

use crate::types::ScanState;

/// Configuration and control errors, raised before any state transition.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("nothing to scan: no work items for this configuration")]
    EmptyWorklist,

    #[error("no project selected")]
    NoProjectSelected,

    #[error("target host is required")]
    MissingHost,

    #[error("a {surface} scan is already active")]
    AlreadyRunning { surface: &'static str },

    #[error("cannot {action} while {state}")]
    InvalidTransition {
        action: &'static str,
        state: ScanState,
    },

    #[error("HTTP client setup failed: {0}")]
    Client(#[from] reqwest::Error),
}

impl ScanError {
    /// True for errors caused by the request rather than by the surface's current state.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            ScanError::EmptyWorklist | ScanError::NoProjectSelected | ScanError::MissingHost
        )
    }
}

/// Key/value store failures.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("store JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T, E = ScanError> = std::result::Result<T, E>;
