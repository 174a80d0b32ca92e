//! Folds analyzer outcomes into the job and decides the stage result.

use crate::domain::{EngineError, EngineResult, ExecutionOutcome, Job};
use crate::synthesize::synthesize;

/// Counts from one aggregation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AggregateSummary {
    pub attempted: usize,
    pub succeeded: usize,
}

impl AggregateSummary {
    pub fn failed(&self) -> usize {
        self.attempted - self.succeeded
    }

    /// The stage fails when no analyzer produced a usable result.
    pub fn into_result(self) -> EngineResult<Self> {
        if self.succeeded == 0 {
            return Err(EngineError::NoAnalyzersSucceeded);
        }
        Ok(self)
    }
}

/// Append one result per outcome, in the order given, and count successes.
pub fn fold_outcomes(
    job: &mut Job,
    outcomes: Vec<ExecutionOutcome>,
    summary_length: usize,
) -> AggregateSummary {
    let mut summary = AggregateSummary::default();
    for outcome in outcomes {
        summary.attempted += 1;
        if outcome.succeeded() {
            summary.succeeded += 1;
        }
        job.append_result(synthesize(&outcome, summary_length));
    }
    summary
}

/// Append results to `job` and fail the stage when nothing usable came back.
///
/// Results stay on the job even when this returns an error.
pub fn aggregate(
    job: &mut Job,
    outcomes: Vec<ExecutionOutcome>,
    summary_length: usize,
) -> EngineResult<AggregateSummary> {
    fold_outcomes(job, outcomes, summary_length).into_result()
}
