//! Analyzer definitions and the commands used to install and run them.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// A fully resolved subprocess invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandSpec {
    /// Executable name or path.
    pub program: String,

    /// Arguments, already expanded.
    pub args: Vec<String>,

    /// Working directory for the child, if any.
    pub current_dir: Option<PathBuf>,

    /// Extra environment variables layered over the inherited environment.
    pub env: Vec<(String, String)>,
}

impl CommandSpec {
    /// Create a command with no working directory or extra environment.
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            current_dir: None,
            env: Vec::new(),
        }
    }

    /// Set the working directory.
    pub fn in_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.current_dir = Some(dir.into());
        self
    }

    /// Add an environment variable.
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Render as a single shell-like line for logs and listings.
    pub fn display_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// An analyzer plug-in loaded at startup.
///
/// Immutable once built; the catalog shares definitions across concurrent
/// job tasks without locking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalyzerDefinition {
    /// Stable identifier, also the key of the analyzer's job result.
    pub id: String,

    /// Human-readable name from the descriptor.
    pub name: Option<String>,

    /// Free-form description from the descriptor.
    pub description: Option<String>,

    /// Disabled analyzers are loaded but never executed.
    pub enabled: bool,

    /// Invoked once per job; the filter parameters are appended as the final argument.
    pub run_command: CommandSpec,

    /// Invoked once at startup to materialize dependencies, when the analyzer has any.
    pub install_command: Option<CommandSpec>,
}

impl AnalyzerDefinition {
    /// Create an enabled analyzer with no install step.
    pub fn new(id: impl Into<String>, run_command: CommandSpec) -> Self {
        Self {
            id: id.into(),
            name: None,
            description: None,
            enabled: true,
            run_command,
            install_command: None,
        }
    }

    /// Mark this analyzer disabled.
    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// Attach an install command.
    pub fn with_install(mut self, install: CommandSpec) -> Self {
        self.install_command = Some(install);
        self
    }

    /// Whether this analyzer declares dependencies to install.
    pub fn has_dependencies(&self) -> bool {
        self.install_command.is_some()
    }
}
