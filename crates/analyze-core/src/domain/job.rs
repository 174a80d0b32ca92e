//! Jobs routed to the engine and the results appended to them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use uuid::Uuid;

/// Lifecycle state of a job, owned by the host pipeline.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Not yet processed, or waiting on upstream filter population.
    #[default]
    Pending,
    /// A processor ran and appended results.
    Completed,
    /// A processor ran and reported a stage failure.
    Incomplete,
}

/// Selection criteria attached to a job.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct JobFilter {
    /// Parameter name to value. Key order carries no meaning.
    pub parameters: BTreeMap<String, Value>,
}

impl JobFilter {
    /// Encode the parameters as the JSON object handed to analyzers.
    pub fn to_input(&self) -> serde_json::Result<String> {
        serde_json::to_string(&self.parameters)
    }
}

/// Normalized outcome of one analyzer attempted for a job.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JobResult {
    /// Id of the analyzer that produced this result.
    pub id: String,

    /// Length-capped human-readable summary.
    pub summary: String,

    /// Structured output when it parsed, raw text otherwise, null on failure.
    #[serde(default)]
    pub data: Value,
}

/// A unit of work routed to job processors by the host.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct Job {
    pub id: Uuid,

    /// Tag selecting which processor acts on the job.
    pub kind: String,

    pub status: JobStatus,

    pub filter: JobFilter,

    /// Append-only; entries are never replaced or removed.
    pub results: Vec<JobResult>,

    /// Number of times the host dispatched this job.
    pub attempts: u32,

    /// Number of dispatches that ended in a processor error.
    pub fail_count: u32,

    /// Last processor error, if any.
    pub error: Option<String>,

    pub create_time: DateTime<Utc>,

    pub update_time: DateTime<Utc>,
}

impl Default for Job {
    fn default() -> Self {
        Self::new()
    }
}

impl Job {
    /// Create an empty pending job with no kind.
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            kind: String::new(),
            status: JobStatus::Pending,
            filter: JobFilter::default(),
            results: Vec::new(),
            attempts: 0,
            fail_count: 0,
            error: None,
            create_time: now,
            update_time: now,
        }
    }

    /// Create a pending job of the given kind.
    pub fn with_kind(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            ..Self::new()
        }
    }

    /// Set a filter parameter.
    pub fn set_parameter(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.filter.parameters.insert(name.into(), value.into());
    }

    /// Append a result and bump the update time.
    pub fn append_result(&mut self, result: JobResult) {
        self.results.push(result);
        self.update_time = Utc::now();
    }
}
