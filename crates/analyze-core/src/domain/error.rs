//! Error taxonomy for the analyze engine.

use std::path::PathBuf;

/// Errors surfaced at engine, bootstrap, or job level.
///
/// Per-analyzer failures never show up here; they are carried as a
/// [`TerminalError`](super::outcome::TerminalError) on the outcome.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("no analyzers loaded from {}", path.display())]
    NoAnalyzersLoaded { path: PathBuf },

    #[error("unable to register job processor with host: {0}")]
    HostRegistration(String),

    #[error("no analyzers processed successfully")]
    NoAnalyzersSucceeded,

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for analyze engine operations.
pub type EngineResult<T> = std::result::Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_analyzers_succeeded_display() {
        let err = EngineError::NoAnalyzersSucceeded;
        assert_eq!(err.to_string(), "no analyzers processed successfully");
    }

    #[test]
    fn test_no_analyzers_loaded_names_path() {
        let err = EngineError::NoAnalyzersLoaded {
            path: PathBuf::from("/opt/sensoroni/analyzers"),
        };
        assert!(err.to_string().contains("/opt/sensoroni/analyzers"));
    }

    #[test]
    fn test_io_error_converts() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: EngineError = io.into();
        assert!(err.to_string().contains("gone"));
    }
}
