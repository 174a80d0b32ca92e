//! Raw execution outcomes handed from the executor to the synthesizer.

/// Why an analyzer run ended abnormally.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TerminalError {
    #[error("failed to launch analyzer: {0}")]
    Launch(String),

    #[error("analyzer exited with status {}", .code.map_or_else(|| "signal".to_string(), |c| c.to_string()))]
    ExitStatus { code: Option<i32> },

    #[error("analyzer timed out after {limit_ms}ms")]
    Timeout { limit_ms: u64 },

    #[error("analyzer task aborted: {0}")]
    Aborted(String),
}

/// What one analyzer run produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionOutcome {
    pub analyzer_id: String,

    /// Everything captured from stdout, including partial output on failure.
    pub output: Vec<u8>,

    pub terminal_error: Option<TerminalError>,

    pub duration_ms: u64,
}

impl ExecutionOutcome {
    /// An outcome for a run that exited cleanly.
    pub fn success(analyzer_id: impl Into<String>, output: Vec<u8>) -> Self {
        Self {
            analyzer_id: analyzer_id.into(),
            output,
            terminal_error: None,
            duration_ms: 0,
        }
    }

    /// An outcome for a run that ended abnormally.
    pub fn failure(analyzer_id: impl Into<String>, output: Vec<u8>, error: TerminalError) -> Self {
        Self {
            analyzer_id: analyzer_id.into(),
            output,
            terminal_error: Some(error),
            duration_ms: 0,
        }
    }

    pub fn with_duration(mut self, duration_ms: u64) -> Self {
        self.duration_ms = duration_ms;
        self
    }

    pub fn succeeded(&self) -> bool {
        self.terminal_error.is_none()
    }
}
