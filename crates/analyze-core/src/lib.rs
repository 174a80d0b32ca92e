//! Analyze Core
//!
//! Domain model and the pure pieces of the analyze engine:
//! - job eligibility gating
//! - shaping raw analyzer output into capped summaries
//! - folding per-analyzer outcomes into a job and deciding the stage result
//!
//! Process execution and the analyzer registry live in `analyze-engine`.

pub mod aggregate;
pub mod config;
pub mod domain;
pub mod gate;
pub mod obs;
pub mod synthesize;
pub mod telemetry;

pub use aggregate::{aggregate, fold_outcomes, AggregateSummary};
pub use config::EngineConfig;
pub use domain::{
    AnalyzerDefinition, CommandSpec, EngineError, EngineResult, ExecutionOutcome, Job, JobFilter,
    JobResult, JobStatus, TerminalError,
};
pub use gate::{is_eligible, Ineligible, ANALYZE_JOB_KIND};
pub use obs::job_span;
pub use synthesize::{synthesize, truncate_summary, ParsedOutput, INTERNAL_FAILURE};
pub use telemetry::init_tracing;

/// Analyze version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
