//! Analyze Engine
//!
//! Runs a registry of external analyzer programs against jobs:
//! - discovers analyzers and installs their dependencies at startup
//! - fans each eligible job out to the enabled analyzers, bounded by a
//!   parallelism limit and a per-analyzer timeout
//! - folds every analyzer's output into a capped summary on the job

pub mod descriptor;
pub mod engine;
pub mod executor;
pub mod host;
pub mod registry;
pub mod runner;

// Re-export key types
pub use descriptor::{AnalyzerDescriptor, DescriptorError};
pub use engine::{AnalyzeEngine, Startup, PROCESSOR_NAME};
pub use executor::BoundedExecutor;
pub use host::{HostError, JobHost, JobProcessor, LocalJobManager};
pub use registry::{AnalyzerCatalog, BootstrapReport, InstallFailure, SkippedDescriptor};
pub use runner::{AnalyzerRunner, InstallError};
