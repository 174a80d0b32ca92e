//! Analyze - analyzer dispatch CLI
//!
//! The `analyze` command runs the analyze engine outside of a job pipeline.
//!
//! ## Commands
//!
//! - `list`: Discover analyzers and show the catalog
//! - `run`: Process one job and print the resulting job
//! - `serve`: Process newline-delimited jobs from stdin
//! - `summarize`: Shape captured analyzer output into a job result

use analyze_core::{
    synthesize, EngineConfig, ExecutionOutcome, Job, JobResult, TerminalError, ANALYZE_JOB_KIND,
};
use analyze_engine::{AnalyzeEngine, LocalJobManager, Startup};
use anyhow::{bail, Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand};
use serde_json::Value;
use std::io::Write;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tracing::{info, warn, Level};

#[derive(Parser)]
#[command(name = "analyze")]
#[command(author = "Stevedores Org")]
#[command(version = analyze_core::VERSION)]
#[command(about = "Run external analyzers against jobs", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    #[command(flatten)]
    config: ConfigArgs,

    #[command(subcommand)]
    command: Commands,
}

/// Engine settings layered over the config file.
#[derive(Args, Debug, Default)]
struct ConfigArgs {
    /// JSON config file; missing keys keep their defaults
    #[arg(long, global = true, env = "ANALYZE_CONFIG")]
    config: Option<PathBuf>,

    /// Directory scanned for analyzers
    #[arg(long, global = true, env = "ANALYZE_ANALYZERS_PATH")]
    analyzers_path: Option<PathBuf>,

    /// Root of the per-analyzer dependency directories
    #[arg(long, global = true, env = "ANALYZE_DEPENDENCY_PATH")]
    dependency_path: Option<PathBuf>,

    /// Local package source for dependency installs
    #[arg(long, global = true, env = "ANALYZE_DEPENDENCY_SOURCE_PATH")]
    dependency_source_path: Option<PathBuf>,

    /// Executable that runs analyzers
    #[arg(long, global = true, env = "ANALYZE_RUN_EXECUTABLE")]
    run_executable: Option<String>,

    /// Executable that installs analyzer dependencies
    #[arg(long, global = true, env = "ANALYZE_INSTALL_EXECUTABLE")]
    install_executable: Option<String>,

    /// Per-analyzer timeout in milliseconds
    #[arg(long, global = true, env = "ANALYZE_TIMEOUT_MS")]
    timeout_ms: Option<u64>,

    /// Maximum number of analyzers running at once
    #[arg(long, global = true, env = "ANALYZE_PARALLEL_LIMIT")]
    parallel_limit: Option<usize>,

    /// Summary length cap in characters
    #[arg(long, global = true, env = "ANALYZE_SUMMARY_LENGTH")]
    summary_length: Option<usize>,

    /// Variable pointing analyzers at their dependency directory; empty disables it
    #[arg(long, global = true, env = "ANALYZE_DEPENDENCY_ENV_VAR")]
    dependency_env_var: Option<String>,

    /// Install analyzer dependencies at startup
    #[arg(
        long,
        global = true,
        env = "ANALYZE_INSTALL_DEPENDENCIES",
        value_name = "BOOL",
        action = ArgAction::Set
    )]
    install_dependencies: Option<bool>,
}

impl ConfigArgs {
    fn resolve(&self) -> Result<EngineConfig> {
        let mut config = match &self.config {
            Some(path) => EngineConfig::from_file(path)
                .with_context(|| format!("Failed to load config {}", path.display()))?,
            None => EngineConfig::default(),
        };

        if let Some(v) = &self.analyzers_path {
            config.analyzers_path = v.clone();
        }
        if let Some(v) = &self.dependency_path {
            config.dependency_path = v.clone();
        }
        if let Some(v) = &self.dependency_source_path {
            config.dependency_source_path = v.clone();
        }
        if let Some(v) = &self.run_executable {
            config.run_executable = v.clone();
        }
        if let Some(v) = &self.install_executable {
            config.install_executable = v.clone();
        }
        if let Some(v) = self.timeout_ms {
            config.timeout_ms = v;
        }
        if let Some(v) = self.parallel_limit {
            config.parallel_limit = v;
        }
        if let Some(v) = self.summary_length {
            config.summary_length = v;
        }
        if let Some(v) = &self.dependency_env_var {
            config.dependency_env_var = v.clone();
        }
        if let Some(v) = self.install_dependencies {
            config.install_dependencies = v;
        }

        config.validate().context("Invalid engine configuration")?;
        Ok(config)
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Discover analyzers and show the catalog
    List {
        /// Skip installing analyzer dependencies
        #[arg(long)]
        no_install: bool,
    },

    /// Process a single job and print it as JSON
    Run {
        /// Filter parameter; values that parse as JSON are kept as JSON
        #[arg(short, long = "param", value_name = "KEY=VALUE", value_parser = parse_param)]
        params: Vec<(String, Value)>,

        /// Job kind
        #[arg(short, long, default_value = ANALYZE_JOB_KIND)]
        kind: String,

        /// Read the whole job from a JSON file instead
        #[arg(long, conflicts_with_all = ["params", "kind"])]
        job: Option<PathBuf>,
    },

    /// Process newline-delimited job JSON from stdin, one job per output line
    Serve,

    /// Shape captured analyzer output into a job result
    Summarize {
        /// File holding the analyzer's stdout
        #[arg(short, long)]
        file: PathBuf,

        /// Treat the output as coming from a failed run
        #[arg(long)]
        failed: bool,

        /// Summary length cap (default: configured summary length)
        #[arg(short, long)]
        length: Option<usize>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    analyze_core::init_tracing(cli.json, level);

    let config = cli.config.resolve()?;

    match cli.command {
        Commands::List { no_install } => cmd_list(config, no_install),
        Commands::Run { params, kind, job } => {
            let job = match job {
                Some(path) => read_job(&path)?,
                None => build_job(&kind, params),
            };
            cmd_run(config, job).await
        }
        Commands::Serve => {
            let (host, _startup) = start_engine(config)?;
            let stdin = BufReader::new(tokio::io::stdin());
            cmd_serve(&host, stdin, &mut std::io::stdout()).await
        }
        Commands::Summarize {
            file,
            failed,
            length,
        } => cmd_summarize(&file, failed, length.unwrap_or(config.summary_length)),
    }
}

/// Bootstrap the engine behind an in-process host.
fn start_engine(config: EngineConfig) -> Result<(LocalJobManager, Startup)> {
    let host = LocalJobManager::new();
    let startup = AnalyzeEngine::bootstrap(config, Some(&host))
        .context("Failed to start analyze engine")?;
    if let Some(err) = &startup.error {
        warn!(error = %err, "analyze engine started with errors");
    }
    Ok((host, startup))
}

/// List the analyzer catalog
fn cmd_list(mut config: EngineConfig, no_install: bool) -> Result<()> {
    if no_install {
        config.install_dependencies = false;
    }
    let (_host, startup) = start_engine(config)?;
    let engine = &startup.engine;
    let catalog = engine.catalog();

    println!("Analyzers ({})", engine.config().analyzers_path.display());
    if catalog.is_empty() {
        println!("  (none)");
    }
    for analyzer in catalog.iter() {
        println!(
            "  {:<20} {:<8} {}{}",
            analyzer.id,
            if analyzer.enabled { "enabled" } else { "disabled" },
            analyzer.run_command.display_line(),
            if analyzer.has_dependencies() {
                "  [deps]"
            } else {
                ""
            }
        );
    }

    if !startup.skipped.is_empty() {
        println!("\nSkipped descriptors:");
        for skipped in &startup.skipped {
            println!("  {}: {}", skipped.path.display(), skipped.reason);
        }
    }
    if !startup.install_failures.is_empty() {
        println!("\nInstall failures:");
        for failure in &startup.install_failures {
            println!("  {}: {}", failure.analyzer_id, failure.reason);
        }
    }

    Ok(())
}

/// Process one job and print it
async fn cmd_run(config: EngineConfig, mut job: Job) -> Result<()> {
    let (host, _startup) = start_engine(config)?;

    let dispatched = host.dispatch(&mut job).await;
    println!("{}", serde_json::to_string_pretty(&job)?);

    match dispatched {
        Ok(()) => {
            info!(job_id = %job.id, results = job.results.len(), "job processed");
            Ok(())
        }
        Err(e) => bail!("Job {} failed: {}", job.id, e),
    }
}

/// Dispatch each job line from `input` and write the processed job to `out`.
///
/// Lines that are not a job are logged and skipped. A job that fails
/// processing is still written, carrying its failure status.
async fn cmd_serve<R, W>(host: &LocalJobManager, input: R, out: &mut W) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    let mut lines = input.lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let mut job: Job = match serde_json::from_str(line) {
            Ok(job) => job,
            Err(e) => {
                warn!(error = %e, "skipping malformed job line");
                continue;
            }
        };

        // Failure is recorded on the job itself.
        let _ = host.dispatch(&mut job).await;

        serde_json::to_writer(&mut *out, &job)?;
        writeln!(out)?;
        out.flush()?;
    }
    Ok(())
}

/// Summarize captured analyzer output
fn cmd_summarize(file: &Path, failed: bool, length: usize) -> Result<()> {
    let result = summarize_file(file, failed, length)?;
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

fn summarize_file(file: &Path, failed: bool, length: usize) -> Result<JobResult> {
    let output =
        std::fs::read(file).with_context(|| format!("Failed to read {}", file.display()))?;
    let analyzer_id = file
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "analyzer".to_string());

    let outcome = if failed {
        ExecutionOutcome::failure(analyzer_id, output, TerminalError::ExitStatus { code: None })
    } else {
        ExecutionOutcome::success(analyzer_id, output)
    };
    Ok(synthesize(&outcome, length))
}

fn read_job(path: &Path) -> Result<Job> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read job file {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("Invalid job JSON in {}", path.display()))
}

fn build_job(kind: &str, params: Vec<(String, Value)>) -> Job {
    let mut job = Job::with_kind(kind);
    for (key, value) in params {
        job.set_parameter(key, value);
    }
    job
}

/// Parse `key=value`. The value is taken as JSON when it parses, else as a string.
fn parse_param(raw: &str) -> std::result::Result<(String, Value), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got {raw:?}"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("empty parameter name in {raw:?}"));
    }
    let value =
        serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
    Ok((key.to_string(), value))
}
