//! Analyzer and installer subprocess execution.

use analyze_core::{AnalyzerDefinition, CommandSpec, ExecutionOutcome, TerminalError};
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::task::JoinHandle;
use tracing::debug;

/// How long to wait for stderr to drain once the analyzer has ended.
const STDERR_DRAIN_GRACE: Duration = Duration::from_millis(250);

const READ_CHUNK: usize = 8 * 1024;

/// Why an installer did not complete.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InstallError {
    #[error("failed to launch installer: {0}")]
    Launch(String),

    #[error("installer exited with status {}", .code.map_or_else(|| "signal".to_string(), |c| c.to_string()))]
    ExitStatus { code: Option<i32> },
}

/// Runs analyzers and their installers as child processes.
pub struct AnalyzerRunner;

impl AnalyzerRunner {
    /// Run one analyzer with `input` as its final argument, under a hard deadline.
    ///
    /// Never fails: launch errors, non-zero exits and timeouts are reported on
    /// the outcome, together with whatever stdout was captured before the end.
    pub async fn run(
        analyzer: &AnalyzerDefinition,
        input: &str,
        timeout: Duration,
    ) -> ExecutionOutcome {
        let start = Instant::now();
        let id = analyzer.id.as_str();
        let spec = &analyzer.run_command;

        let mut command = Command::new(&spec.program);
        command
            .args(&spec.args)
            .arg(input)
            .envs(spec.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &spec.current_dir {
            command.current_dir(dir);
        }

        let mut child = match command.spawn() {
            Ok(child) => child,
            Err(e) => {
                return ExecutionOutcome::failure(id, Vec::new(), TerminalError::Launch(e.to_string()))
                    .with_duration(elapsed_ms(start));
            }
        };

        let stderr_task = child.stderr.take().map(spawn_drain);
        let Some(mut stdout) = child.stdout.take() else {
            return ExecutionOutcome::failure(
                id,
                Vec::new(),
                TerminalError::Launch("analyzer stdout was not captured".to_string()),
            )
            .with_duration(elapsed_ms(start));
        };

        let deadline = tokio::time::sleep(timeout);
        tokio::pin!(deadline);

        let mut output = Vec::new();
        let mut chunk = [0u8; READ_CHUNK];
        let mut timed_out = false;
        loop {
            tokio::select! {
                read = stdout.read(&mut chunk) => match read {
                    Ok(0) => break,
                    Ok(n) => output.extend_from_slice(&chunk[..n]),
                    Err(e) => {
                        debug!(analyzer_id = %id, error = %e, "stdout read failed");
                        break;
                    }
                },
                _ = &mut deadline => {
                    timed_out = true;
                    break;
                }
            }
        }

        // stdout can close before the process exits, so the deadline still applies.
        let status = if timed_out {
            None
        } else {
            tokio::select! {
                status = child.wait() => Some(status),
                _ = &mut deadline => None,
            }
        };

        let terminal_error = match status {
            None => {
                if let Err(e) = child.kill().await {
                    debug!(analyzer_id = %id, error = %e, "failed to kill timed out analyzer");
                }
                Some(TerminalError::Timeout {
                    limit_ms: timeout.as_millis() as u64,
                })
            }
            Some(Ok(status)) if status.success() => None,
            Some(Ok(status)) => Some(TerminalError::ExitStatus {
                code: status.code(),
            }),
            Some(Err(e)) => Some(TerminalError::Aborted(format!(
                "failed to wait for analyzer: {e}"
            ))),
        };

        let stderr = match stderr_task {
            Some(task) => finish_drain(task).await,
            None => Vec::new(),
        };
        if terminal_error.is_some() && !stderr.is_empty() {
            debug!(
                analyzer_id = %id,
                stderr = %String::from_utf8_lossy(&stderr).trim_end(),
                "analyzer stderr"
            );
        }

        ExecutionOutcome {
            analyzer_id: id.to_string(),
            output,
            terminal_error,
            duration_ms: elapsed_ms(start),
        }
    }

    /// Run an installer to completion. Only the exit status is observed.
    pub fn install(command: &CommandSpec) -> Result<(), InstallError> {
        let mut process = std::process::Command::new(&command.program);
        process
            .args(&command.args)
            .envs(command.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::null());
        if let Some(dir) = &command.current_dir {
            process.current_dir(dir);
        }

        let output = process
            .output()
            .map_err(|e| InstallError::Launch(e.to_string()))?;

        if output.status.success() {
            Ok(())
        } else {
            debug!(
                command = %command.display_line(),
                stderr = %String::from_utf8_lossy(&output.stderr).trim_end(),
                "installer failed"
            );
            Err(InstallError::ExitStatus {
                code: output.status.code(),
            })
        }
    }
}

fn spawn_drain<R>(mut reader: R) -> JoinHandle<Vec<u8>>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut buf = Vec::new();
        let _ = reader.read_to_end(&mut buf).await;
        buf
    })
}

/// A grandchild can hold the pipe open after the analyzer dies; don't wait on it.
async fn finish_drain(mut task: JoinHandle<Vec<u8>>) -> Vec<u8> {
    match tokio::time::timeout(STDERR_DRAIN_GRACE, &mut task).await {
        Ok(Ok(buf)) => buf,
        Ok(Err(_)) => Vec::new(),
        Err(_) => {
            task.abort();
            Vec::new()
        }
    }
}

fn elapsed_ms(start: Instant) -> u64 {
    start.elapsed().as_millis() as u64
}
