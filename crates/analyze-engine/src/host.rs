//! Job pipeline host contract and an in-process host.
//!
//! The host owns the job lifecycle: it routes every job to each registered
//! processor and keeps the job's status. Processors decide for themselves
//! whether a job concerns them.

use analyze_core::{EngineError, EngineResult, Job, JobStatus};
use async_trait::async_trait;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, warn};

/// Something that can process jobs routed to it by a host.
#[async_trait]
pub trait JobProcessor: Send + Sync {
    /// Stable name used for registration.
    fn name(&self) -> &str;

    /// Process one job to completion. Ineligible jobs must be left untouched.
    async fn process_job(&self, job: &mut Job) -> EngineResult<()>;
}

/// Errors raised by a host while wiring in processors.
#[derive(Debug, thiserror::Error)]
pub enum HostError {
    #[error("job processor already registered: {0}")]
    DuplicateProcessor(String),

    #[error("job host unavailable: {0}")]
    Unavailable(String),
}

impl From<HostError> for EngineError {
    fn from(err: HostError) -> Self {
        EngineError::HostRegistration(err.to_string())
    }
}

/// A job pipeline that processors register with.
pub trait JobHost: Send + Sync {
    fn add_job_processor(&self, processor: Arc<dyn JobProcessor>) -> Result<(), HostError>;
}

/// In-process host that dispatches jobs to its processors in registration order.
#[derive(Default)]
pub struct LocalJobManager {
    processors: RwLock<Vec<Arc<dyn JobProcessor>>>,
}

impl LocalJobManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn processor_names(&self) -> Vec<String> {
        self.processors
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|p| p.name().to_string())
            .collect()
    }

    /// Route `job` through every processor.
    ///
    /// Status bookkeeping: a processor error marks the job incomplete and
    /// stops dispatch; new results mark it completed; otherwise it stays
    /// pending so it can be dispatched again later.
    pub async fn dispatch(&self, job: &mut Job) -> EngineResult<()> {
        let processors: Vec<_> = self
            .processors
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        job.attempts += 1;
        let before = job.results.len();

        for processor in processors {
            if let Err(e) = processor.process_job(job).await {
                warn!(job_id = %job.id, processor = %processor.name(), error = %e, "job processing failed");
                job.status = JobStatus::Incomplete;
                job.fail_count += 1;
                job.error = Some(e.to_string());
                return Err(e);
            }
        }

        if job.results.len() > before {
            job.status = JobStatus::Completed;
            job.error = None;
        } else {
            debug!(job_id = %job.id, "no processor acted on job, leaving it pending");
        }
        Ok(())
    }
}

impl JobHost for LocalJobManager {
    fn add_job_processor(&self, processor: Arc<dyn JobProcessor>) -> Result<(), HostError> {
        let mut processors = self
            .processors
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if processors.iter().any(|p| p.name() == processor.name()) {
            return Err(HostError::DuplicateProcessor(processor.name().to_string()));
        }
        debug!(processor = %processor.name(), "registered job processor");
        processors.push(processor);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use analyze_core::JobResult;
    use serde_json::Value;

    struct Appender;

    #[async_trait]
    impl JobProcessor for Appender {
        fn name(&self) -> &str {
            "appender"
        }

        async fn process_job(&self, job: &mut Job) -> EngineResult<()> {
            if job.kind == "append" {
                job.append_result(JobResult {
                    id: "appender".to_string(),
                    summary: "done".to_string(),
                    data: Value::Null,
                });
            }
            Ok(())
        }
    }

    struct Failing;

    #[async_trait]
    impl JobProcessor for Failing {
        fn name(&self) -> &str {
            "failing"
        }

        async fn process_job(&self, _job: &mut Job) -> EngineResult<()> {
            Err(EngineError::NoAnalyzersSucceeded)
        }
    }

    #[test]
    fn test_duplicate_registration_rejected() {
        let host = LocalJobManager::new();
        host.add_job_processor(Arc::new(Appender)).unwrap();
        let err = host.add_job_processor(Arc::new(Appender)).unwrap_err();
        assert!(matches!(err, HostError::DuplicateProcessor(_)));
        assert_eq!(host.processor_names(), vec!["appender"]);
    }

    #[test]
    fn test_host_error_converts_to_registration_error() {
        let err: EngineError = HostError::Unavailable("no agent".to_string()).into();
        assert!(matches!(err, EngineError::HostRegistration(_)));
    }

    #[tokio::test]
    async fn test_dispatch_completes_job_with_results() {
        let host = LocalJobManager::new();
        host.add_job_processor(Arc::new(Appender)).unwrap();

        let mut job = Job::with_kind("append");
        host.dispatch(&mut job).await.unwrap();

        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.attempts, 1);
        assert_eq!(job.results.len(), 1);
    }

    #[tokio::test]
    async fn test_dispatch_leaves_untouched_job_pending() {
        let host = LocalJobManager::new();
        host.add_job_processor(Arc::new(Appender)).unwrap();

        let mut job = Job::with_kind("other");
        host.dispatch(&mut job).await.unwrap();

        assert_eq!(job.status, JobStatus::Pending);
        assert!(job.results.is_empty());
    }

    #[tokio::test]
    async fn test_dispatch_records_failure() {
        let host = LocalJobManager::new();
        host.add_job_processor(Arc::new(Failing)).unwrap();

        let mut job = Job::with_kind("append");
        let err = host.dispatch(&mut job).await.unwrap_err();

        assert!(matches!(err, EngineError::NoAnalyzersSucceeded));
        assert_eq!(job.status, JobStatus::Incomplete);
        assert_eq!(job.fail_count, 1);
        assert_eq!(
            job.error.as_deref(),
            Some("no analyzers processed successfully")
        );
    }
}
