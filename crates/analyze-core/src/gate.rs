//! Job eligibility gate.

use crate::domain::Job;

/// Kind tag of jobs this engine acts on.
pub const ANALYZE_JOB_KIND: &str = "analyze";

/// Why a job was passed over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ineligible {
    /// The job belongs to another processor.
    OtherKind,
    /// Right kind, but the filter has not been populated upstream yet.
    AwaitingFilter,
}

impl Ineligible {
    pub fn as_str(&self) -> &'static str {
        match self {
            Ineligible::OtherKind => "other_kind",
            Ineligible::AwaitingFilter => "awaiting_filter",
        }
    }
}

/// Classify a job against the engine's kind tag.
pub fn check(job: &Job) -> Result<(), Ineligible> {
    if job.kind != ANALYZE_JOB_KIND {
        return Err(Ineligible::OtherKind);
    }
    if job.filter.parameters.is_empty() {
        return Err(Ineligible::AwaitingFilter);
    }
    Ok(())
}

/// Whether the engine should process `job` now.
pub fn is_eligible(job: &Job) -> bool {
    check(job).is_ok()
}
