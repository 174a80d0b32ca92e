//! Domain models for the analyze engine.
//!
//! - `AnalyzerDefinition`: an analyzer plug-in loaded at startup
//! - `Job`: the unit of work routed to the engine, with its `JobResult`s
//! - `ExecutionOutcome`: what one analyzer run produced

pub mod analyzer;
pub mod error;
pub mod job;
pub mod outcome;

pub use analyzer::{AnalyzerDefinition, CommandSpec};
pub use error::{EngineError, EngineResult};
pub use job::{Job, JobFilter, JobResult, JobStatus};
pub use outcome::{ExecutionOutcome, TerminalError};
