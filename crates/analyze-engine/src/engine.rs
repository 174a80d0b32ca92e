//! The analyze job processor.

use crate::executor::BoundedExecutor;
use crate::host::{JobHost, JobProcessor};
use crate::registry::{AnalyzerCatalog, BootstrapReport, InstallFailure, SkippedDescriptor};
use analyze_core::{
    fold_outcomes, gate, obs, EngineConfig, EngineError, EngineResult, Job,
};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Instant;
use tracing::{warn, Instrument};

/// Name the engine registers under with its host.
pub const PROCESSOR_NAME: &str = "analyze";

/// Fans `analyze` jobs out to the catalog's analyzers and folds the results in.
///
/// The catalog is built once and only read afterwards; the engine can be
/// shared across tasks behind an `Arc`.
#[derive(Debug)]
pub struct AnalyzeEngine {
    config: EngineConfig,
    catalog: AnalyzerCatalog,
    executor: BoundedExecutor,
}

/// Result of [`AnalyzeEngine::bootstrap`].
///
/// The engine is usable even when `error` is set: a host registration
/// failure or an empty catalog does not prevent processing jobs directly.
pub struct Startup {
    pub engine: Arc<AnalyzeEngine>,
    pub skipped: Vec<SkippedDescriptor>,
    pub install_failures: Vec<InstallFailure>,
    pub error: Option<EngineError>,
}

impl Startup {
    /// Strict form: any bootstrap error fails startup.
    pub fn into_result(self) -> EngineResult<Arc<AnalyzeEngine>> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(self.engine),
        }
    }
}

impl AnalyzeEngine {
    pub fn new(config: EngineConfig, catalog: AnalyzerCatalog) -> Self {
        let executor = BoundedExecutor::from_config(&config);
        Self {
            config,
            catalog,
            executor,
        }
    }

    /// Load the analyzer catalog and register the engine with `host`.
    ///
    /// Relative paths in `config` are anchored at the process working
    /// directory. Only an invalid configuration is fatal. An empty catalog
    /// or a failed (or missing) host registration is reported on
    /// [`Startup::error`].
    pub fn bootstrap(config: EngineConfig, host: Option<&dyn JobHost>) -> EngineResult<Startup> {
        config.validate()?;
        let config = config.with_absolute_paths()?;

        let report = AnalyzerCatalog::bootstrap(&config);
        let loaded = report.check();
        let BootstrapReport {
            catalog,
            skipped,
            install_failures,
            ..
        } = report;

        let engine = Arc::new(Self::new(config, catalog));
        let registered = match host {
            Some(host) => host
                .add_job_processor(Arc::clone(&engine) as Arc<dyn JobProcessor>)
                .map_err(EngineError::from),
            None => Err(EngineError::HostRegistration(
                "no job host available".to_string(),
            )),
        };

        let error = match (loaded, registered) {
            (Err(e), other) => {
                if let Err(reg) = other {
                    warn!(error = %reg, "job processor registration failed");
                }
                Some(e)
            }
            (Ok(()), Err(e)) => Some(e),
            (Ok(()), Ok(())) => None,
        };
        if let Some(e) = &error {
            warn!(error = %e, "analyze engine bootstrap incomplete");
        }

        Ok(Startup {
            engine,
            skipped,
            install_failures,
            error,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn catalog(&self) -> &AnalyzerCatalog {
        &self.catalog
    }

    /// Process one job to completion.
    ///
    /// Ineligible jobs return `Ok(())` without touching the job. Otherwise
    /// one result is appended per analyzer run, and the stage fails only
    /// when none of them produced a usable result.
    pub async fn process_job(&self, job: &mut Job) -> EngineResult<()> {
        let job_id = job.id.to_string();
        let span = obs::job_span(&job_id);

        async {
            if let Err(reason) = gate::check(job) {
                obs::emit_job_skipped(&job_id, reason.as_str());
                return Ok(());
            }

            let start = Instant::now();
            obs::emit_job_started(&job_id, self.catalog.enabled().count());

            let input = job.filter.to_input()?;
            let outcomes = self.executor.run(&self.catalog, &input).await;
            let summary = fold_outcomes(job, outcomes, self.config.summary_length);

            obs::emit_job_finished(
                &job_id,
                summary.attempted,
                summary.succeeded,
                start.elapsed().as_millis() as u64,
            );
            summary.into_result().map(|_| ())
        }
        .instrument(span)
        .await
    }
}

#[async_trait]
impl JobProcessor for AnalyzeEngine {
    fn name(&self) -> &str {
        PROCESSOR_NAME
    }

    async fn process_job(&self, job: &mut Job) -> EngineResult<()> {
        AnalyzeEngine::process_job(self, job).await
    }
}
