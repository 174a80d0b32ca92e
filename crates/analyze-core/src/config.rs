//! Engine configuration.
//!
//! Every field has a default and can be overridden independently; a config
//! file only needs to name the values it changes.

use crate::domain::{EngineError, EngineResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_ANALYZERS_PATH: &str = "/opt/sensoroni/analyzers";
pub const DEFAULT_DEPENDENCY_PATH: &str = "/opt/sensoroni/site-packages";
pub const DEFAULT_DEPENDENCY_SOURCE_PATH: &str = "/opt/sensoroni/sources";
pub const DEFAULT_RUN_EXECUTABLE: &str = "python3";
pub const DEFAULT_INSTALL_EXECUTABLE: &str = "pip3";
pub const DEFAULT_TIMEOUT_MS: u64 = 15_000;
pub const DEFAULT_PARALLEL_LIMIT: usize = 5;
pub const DEFAULT_SUMMARY_LENGTH: usize = 50;
pub const DEFAULT_DEPENDENCY_ENV_VAR: &str = "PYTHONPATH";

/// Resolved engine configuration, immutable after startup.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, rename_all = "camelCase")]
pub struct EngineConfig {
    /// Directory scanned for analyzer descriptors.
    pub analyzers_path: PathBuf,

    /// Root under which each analyzer gets an isolated dependency directory.
    #[serde(alias = "sitePackagesPath")]
    pub dependency_path: PathBuf,

    /// Local package source handed to the installer.
    #[serde(alias = "sourcePackagesPath")]
    pub dependency_source_path: PathBuf,

    /// Executable used to run analyzers.
    #[serde(alias = "analyzerExecutable")]
    pub run_executable: String,

    /// Executable used to install analyzer dependencies.
    #[serde(alias = "analyzerInstaller")]
    pub install_executable: String,

    /// Hard deadline for a single analyzer run.
    pub timeout_ms: u64,

    /// Maximum number of analyzer processes running at once.
    pub parallel_limit: usize,

    /// Summaries longer than this many characters are truncated.
    pub summary_length: usize,

    /// Variable pointing an analyzer at its dependency directory. Empty disables it.
    pub dependency_env_var: String,

    /// Run installers during bootstrap.
    pub install_dependencies: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            analyzers_path: PathBuf::from(DEFAULT_ANALYZERS_PATH),
            dependency_path: PathBuf::from(DEFAULT_DEPENDENCY_PATH),
            dependency_source_path: PathBuf::from(DEFAULT_DEPENDENCY_SOURCE_PATH),
            run_executable: DEFAULT_RUN_EXECUTABLE.to_string(),
            install_executable: DEFAULT_INSTALL_EXECUTABLE.to_string(),
            timeout_ms: DEFAULT_TIMEOUT_MS,
            parallel_limit: DEFAULT_PARALLEL_LIMIT,
            summary_length: DEFAULT_SUMMARY_LENGTH,
            dependency_env_var: DEFAULT_DEPENDENCY_ENV_VAR.to_string(),
            install_dependencies: true,
        }
    }
}

impl EngineConfig {
    /// Load a JSON config file. Missing keys keep their defaults.
    pub fn from_file(path: &Path) -> EngineResult<Self> {
        let raw = std::fs::read_to_string(path)?;
        let config: EngineConfig = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the engine cannot operate with.
    pub fn validate(&self) -> EngineResult<()> {
        if self.parallel_limit == 0 {
            return Err(EngineError::InvalidConfig(
                "parallelLimit must be at least 1".to_string(),
            ));
        }
        if self.timeout_ms == 0 {
            return Err(EngineError::InvalidConfig(
                "timeoutMs must be greater than 0".to_string(),
            ));
        }
        if self.run_executable.trim().is_empty() {
            return Err(EngineError::InvalidConfig(
                "analyzer run executable must not be empty".to_string(),
            ));
        }
        if self.install_executable.trim().is_empty() {
            return Err(EngineError::InvalidConfig(
                "analyzer install executable must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Anchor relative directory paths at the process working directory.
    ///
    /// Analyzers and installers run with other working directories, so every
    /// path handed to them must be absolute.
    pub fn with_absolute_paths(&self) -> std::io::Result<Self> {
        let cwd = std::env::current_dir()?;
        let anchor = |path: &Path| {
            if path.is_absolute() {
                path.to_path_buf()
            } else {
                cwd.join(path)
            }
        };
        Ok(Self {
            analyzers_path: anchor(&self.analyzers_path),
            dependency_path: anchor(&self.dependency_path),
            dependency_source_path: anchor(&self.dependency_source_path),
            ..self.clone()
        })
    }

    /// Isolated dependency directory for one analyzer.
    pub fn dependency_dir(&self, analyzer_id: &str) -> PathBuf {
        self.dependency_path.join(analyzer_id)
    }
}
