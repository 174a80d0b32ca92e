//! Bounded parallel analyzer execution.
//!
//! Every enabled analyzer becomes its own task. One semaphore per executor
//! caps how many run at once across all jobs sharing it; the rest queue and
//! start as running ones finish. Each task owns its deadline, so a timeout
//! or crash never touches its siblings.
//!
//! Tasks never mutate the job. They send their outcome to a single
//! collecting point, which yields outcomes in completion order.

use crate::registry::AnalyzerCatalog;
use crate::runner::AnalyzerRunner;
use analyze_core::{obs, AnalyzerDefinition, EngineConfig, ExecutionOutcome, TerminalError};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Semaphore};
use tracing::{instrument, warn};

/// Runs a catalog's enabled analyzers against one job input.
///
/// Clones share the same permits.
#[derive(Debug, Clone)]
pub struct BoundedExecutor {
    parallel_limit: usize,
    timeout: Duration,
    permits: Arc<Semaphore>,
}

impl BoundedExecutor {
    pub fn new(parallel_limit: usize, timeout: Duration) -> Self {
        let parallel_limit = parallel_limit.max(1);
        Self {
            parallel_limit,
            timeout,
            permits: Arc::new(Semaphore::new(parallel_limit)),
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(
            config.parallel_limit,
            Duration::from_millis(config.timeout_ms),
        )
    }

    pub fn parallel_limit(&self) -> usize {
        self.parallel_limit
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Run every enabled analyzer as a subprocess, `input` as its final argument.
    pub async fn run(&self, catalog: &AnalyzerCatalog, input: &str) -> Vec<ExecutionOutcome> {
        self.run_with(catalog, input, |analyzer, input, timeout| async move {
            AnalyzerRunner::run(&analyzer, &input, timeout).await
        })
        .await
    }

    /// Run every enabled analyzer through `task_fn`.
    ///
    /// `task_fn` is an async closure `(analyzer, input, timeout) -> outcome`.
    /// Production wires it to [`AnalyzerRunner::run`]; tests inject stubs.
    ///
    /// Returns exactly one outcome per enabled analyzer, in completion order.
    /// A task that dies without reporting is recorded as
    /// [`TerminalError::Aborted`].
    #[instrument(skip_all, fields(parallel_limit = self.parallel_limit))]
    pub async fn run_with<F, Fut>(
        &self,
        catalog: &AnalyzerCatalog,
        input: &str,
        task_fn: F,
    ) -> Vec<ExecutionOutcome>
    where
        F: Fn(Arc<AnalyzerDefinition>, Arc<str>, Duration) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ExecutionOutcome> + Send + 'static,
    {
        let task_fn = Arc::new(task_fn);
        let input: Arc<str> = Arc::from(input);
        let (tx, mut rx) = mpsc::unbounded_channel();

        let mut tasks = Vec::new();
        for analyzer in catalog.enabled() {
            let analyzer = Arc::clone(analyzer);
            let task_fn = Arc::clone(&task_fn);
            let input = Arc::clone(&input);
            let sem = Arc::clone(&self.permits);
            let tx = tx.clone();
            let timeout = self.timeout;
            let id = analyzer.id.clone();

            let task = tokio::spawn(async move {
                let _permit = sem.acquire_owned().await.ok();
                let outcome = task_fn(analyzer, input, timeout).await;
                let _ = tx.send(outcome);
            });
            tasks.push((id, task));
        }
        drop(tx);

        let mut outcomes = Vec::with_capacity(tasks.len());
        while let Some(outcome) = rx.recv().await {
            let error = outcome.terminal_error.as_ref().map(ToString::to_string);
            obs::emit_analyzer_finished(&outcome.analyzer_id, outcome.duration_ms, error.as_deref());
            outcomes.push(outcome);
        }

        // Every sender is gone, so each task has either reported or died.
        for (id, task) in tasks {
            if let Err(e) = task.await {
                warn!(analyzer_id = %id, error = %e, "analyzer task died without reporting");
                let error = TerminalError::Aborted(e.to_string());
                obs::emit_analyzer_finished(&id, 0, Some(&error.to_string()));
                outcomes.push(ExecutionOutcome::failure(id, Vec::new(), error));
            }
        }

        outcomes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use analyze_core::CommandSpec;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn catalog(ids: &[&str]) -> AnalyzerCatalog {
        AnalyzerCatalog::new(
            ids.iter()
                .map(|id| AnalyzerDefinition::new(*id, CommandSpec::new("unused", vec![])))
                .collect(),
        )
    }

    #[tokio::test]
    async fn test_one_outcome_per_enabled_analyzer() {
        let catalog = AnalyzerCatalog::new(vec![
            AnalyzerDefinition::new("a", CommandSpec::new("unused", vec![])),
            AnalyzerDefinition::new("b", CommandSpec::new("unused", vec![])).disabled(),
            AnalyzerDefinition::new("c", CommandSpec::new("unused", vec![])),
        ]);
        let executor = BoundedExecutor::new(2, Duration::from_secs(1));

        let outcomes = executor
            .run_with(&catalog, "{}", |analyzer, _input, _timeout| async move {
                ExecutionOutcome::success(analyzer.id.clone(), b"ok".to_vec())
            })
            .await;

        let mut ids: Vec<_> = outcomes.iter().map(|o| o.analyzer_id.clone()).collect();
        ids.sort();
        assert_eq!(ids, vec!["a", "c"]);
    }

    #[tokio::test]
    async fn test_empty_catalog_yields_nothing() {
        let executor = BoundedExecutor::new(2, Duration::from_secs(1));
        let outcomes = executor.run(&AnalyzerCatalog::default(), "{}").await;
        assert!(outcomes.is_empty());
    }

    #[tokio::test]
    async fn test_never_exceeds_parallel_limit() {
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let executor = BoundedExecutor::new(2, Duration::from_secs(1));

        let (r, p) = (Arc::clone(&running), Arc::clone(&peak));
        let outcomes = executor
            .run_with(
                &catalog(&["a", "b", "c", "d", "e", "f"]),
                "{}",
                move |analyzer, _input, _timeout| {
                    let running = Arc::clone(&r);
                    let peak = Arc::clone(&p);
                    async move {
                        let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                        peak.fetch_max(now, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(20)).await;
                        running.fetch_sub(1, Ordering::SeqCst);
                        ExecutionOutcome::success(analyzer.id.clone(), vec![])
                    }
                },
            )
            .await;

        assert_eq!(outcomes.len(), 6);
        assert_eq!(peak.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_limit_is_shared_across_concurrent_jobs() {
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let executor = BoundedExecutor::new(1, Duration::from_secs(1));

        let task = |running: Arc<AtomicUsize>, peak: Arc<AtomicUsize>| {
            move |analyzer: Arc<AnalyzerDefinition>, _input: Arc<str>, _timeout: Duration| {
                let running = Arc::clone(&running);
                let peak = Arc::clone(&peak);
                async move {
                    let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(20)).await;
                    running.fetch_sub(1, Ordering::SeqCst);
                    ExecutionOutcome::success(analyzer.id.clone(), vec![])
                }
            }
        };

        let first = catalog(&["a", "b"]);
        let second = catalog(&["c", "d"]);
        let (a, b) = tokio::join!(
            executor.run_with(
                &first,
                "{}",
                task(Arc::clone(&running), Arc::clone(&peak))
            ),
            executor.run_with(
                &second,
                "{}",
                task(Arc::clone(&running), Arc::clone(&peak))
            ),
        );

        assert_eq!(a.len() + b.len(), 4);
        assert_eq!(peak.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_outcomes_arrive_in_completion_order() {
        let executor = BoundedExecutor::new(4, Duration::from_secs(1));
        let outcomes = executor
            .run_with(&catalog(&["slow", "fast"]), "{}", |analyzer, _input, _timeout| async move {
                let delay = if analyzer.id == "slow" { 200 } else { 10 };
                tokio::time::sleep(Duration::from_millis(delay)).await;
                ExecutionOutcome::success(analyzer.id.clone(), vec![])
            })
            .await;

        let ids: Vec<_> = outcomes.iter().map(|o| o.analyzer_id.as_str()).collect();
        assert_eq!(ids, vec!["fast", "slow"]);
    }

    #[tokio::test]
    async fn test_panicking_task_is_reported_as_aborted() {
        let executor = BoundedExecutor::new(2, Duration::from_secs(1));
        let outcomes = executor
            .run_with(&catalog(&["boom", "fine"]), "{}", |analyzer, _input, _timeout| async move {
                if analyzer.id == "boom" {
                    panic!("analyzer task panicked");
                }
                ExecutionOutcome::success(analyzer.id.clone(), vec![])
            })
            .await;

        assert_eq!(outcomes.len(), 2);
        let boom = outcomes.iter().find(|o| o.analyzer_id == "boom").unwrap();
        assert!(matches!(boom.terminal_error, Some(TerminalError::Aborted(_))));
        let fine = outcomes.iter().find(|o| o.analyzer_id == "fine").unwrap();
        assert!(fine.succeeded());
    }

    #[tokio::test]
    async fn test_task_receives_input_and_timeout() {
        let executor = BoundedExecutor::new(1, Duration::from_millis(1234));
        let outcomes = executor
            .run_with(&catalog(&["a"]), r#"{"foo":"bar"}"#, |analyzer, input, timeout| async move {
                assert_eq!(timeout, Duration::from_millis(1234));
                ExecutionOutcome::success(analyzer.id.clone(), input.as_bytes().to_vec())
            })
            .await;
        assert_eq!(outcomes[0].output, br#"{"foo":"bar"}"#);
    }

    #[test]
    fn test_zero_limit_is_clamped() {
        assert_eq!(BoundedExecutor::new(0, Duration::from_secs(1)).parallel_limit(), 1);
    }
}
