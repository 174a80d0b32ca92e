//! Structured lifecycle events for jobs, analyzers and the registry.
//!
//! Every event is an `info!`/`warn!` line carrying an `event` field, so log
//! pipelines can filter on it regardless of output format.

use tracing::{debug, info, info_span, warn, Span};

/// Span that tags every event emitted while a job is processed.
///
/// ```ignore
/// async { /* ... */ }.instrument(job_span(&job_id)).await
/// ```
pub fn job_span(job_id: &str) -> Span {
    info_span!("analyze.job", job_id = %job_id)
}

pub fn emit_job_started(job_id: &str, analyzers: usize) {
    info!(event = "job.started", job_id = %job_id, analyzers = analyzers);
}

/// A job was passed over without touching its results.
pub fn emit_job_skipped(job_id: &str, reason: &str) {
    debug!(event = "job.skipped", job_id = %job_id, reason = %reason);
}

pub fn emit_analyzer_finished(analyzer_id: &str, duration_ms: u64, error: Option<&str>) {
    match error {
        None => info!(
            event = "analyzer.finished",
            analyzer_id = %analyzer_id,
            duration_ms = duration_ms,
            success = true,
        ),
        Some(err) => warn!(
            event = "analyzer.finished",
            analyzer_id = %analyzer_id,
            duration_ms = duration_ms,
            success = false,
            error = %err,
        ),
    }
}

pub fn emit_job_finished(job_id: &str, attempted: usize, succeeded: usize, duration_ms: u64) {
    info!(
        event = "job.finished",
        job_id = %job_id,
        attempted = attempted,
        succeeded = succeeded,
        duration_ms = duration_ms,
    );
}

pub fn emit_registry_loaded(path: &str, loaded: usize, enabled: usize, skipped: usize) {
    info!(
        event = "registry.loaded",
        path = %path,
        loaded = loaded,
        enabled = enabled,
        skipped = skipped,
    );
}

pub fn emit_install_failed(analyzer_id: &str, reason: &str) {
    warn!(event = "registry.install_failed", analyzer_id = %analyzer_id, reason = %reason);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_emitters_do_not_panic_without_subscriber() {
        let _span = job_span("job-1").entered();
        emit_job_started("job-1", 2);
        emit_job_skipped("job-1", "awaiting_filter");
        emit_analyzer_finished("whois", 12, None);
        emit_analyzer_finished("dns", 15_000, Some("analyzer timed out after 15000ms"));
        emit_job_finished("job-1", 2, 1, 15_010);
        emit_registry_loaded("/opt/sensoroni/analyzers", 2, 1, 0);
        emit_install_failed("whois", "exit status 1");
    }
}
