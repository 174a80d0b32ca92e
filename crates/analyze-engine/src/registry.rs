//! Analyzer registry: descriptor discovery and dependency bootstrap.

use crate::descriptor::{AnalyzerDescriptor, DescriptorError};
use crate::runner::AnalyzerRunner;
use analyze_core::{obs, AnalyzerDefinition, EngineConfig, EngineError, EngineResult};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Read-only catalog of analyzers, in load order.
#[derive(Debug, Clone, Default)]
pub struct AnalyzerCatalog {
    analyzers: Vec<Arc<AnalyzerDefinition>>,
}

impl AnalyzerCatalog {
    pub fn new(analyzers: Vec<AnalyzerDefinition>) -> Self {
        Self {
            analyzers: analyzers.into_iter().map(Arc::new).collect(),
        }
    }

    /// Scan the analyzers directory and install each analyzer's dependencies.
    ///
    /// Runs synchronously. Relative paths are taken from the process working
    /// directory. Malformed descriptors and failed installs are recorded on
    /// the report; neither aborts the scan.
    pub fn bootstrap(config: &EngineConfig) -> BootstrapReport {
        let anchored = match config.with_absolute_paths() {
            Ok(anchored) => anchored,
            Err(e) => {
                warn!(error = %e, "unable to resolve working directory, using paths as given");
                config.clone()
            }
        };
        let config = &anchored;

        let mut report = BootstrapReport::new(config.analyzers_path.clone());

        let dirs = match analyzer_dirs(&config.analyzers_path) {
            Ok(dirs) => dirs,
            Err(e) => {
                warn!(
                    path = %config.analyzers_path.display(),
                    error = %e,
                    "unable to read analyzers directory"
                );
                return report;
            }
        };

        let mut seen = HashSet::new();
        let mut analyzers = Vec::new();
        for dir in dirs {
            let Some(descriptor_path) = AnalyzerDescriptor::path_for(&dir) else {
                continue;
            };
            if !descriptor_path.is_file() {
                debug!(path = %dir.display(), "no analyzer descriptor, ignoring directory");
                continue;
            }

            let resolved = AnalyzerDescriptor::load(&descriptor_path)
                .and_then(|descriptor| descriptor.resolve(&dir, config))
                .and_then(|analyzer| {
                    if seen.insert(analyzer.id.clone()) {
                        Ok(analyzer)
                    } else {
                        Err(DescriptorError::DuplicateId(analyzer.id))
                    }
                });

            match resolved {
                Ok(analyzer) => {
                    debug!(analyzer_id = %analyzer.id, enabled = analyzer.enabled, "loaded analyzer");
                    analyzers.push(analyzer);
                }
                Err(e) => {
                    warn!(path = %descriptor_path.display(), error = %e, "skipping analyzer descriptor");
                    report.skipped.push(SkippedDescriptor {
                        path: descriptor_path,
                        reason: e.to_string(),
                    });
                }
            }
        }

        if config.install_dependencies {
            report.install_failures = install_all(&analyzers, config);
        }

        report.catalog = AnalyzerCatalog::new(analyzers);
        obs::emit_registry_loaded(
            &config.analyzers_path.to_string_lossy(),
            report.catalog.len(),
            report.catalog.enabled().count(),
            report.skipped.len(),
        );
        report
    }

    pub fn len(&self) -> usize {
        self.analyzers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.analyzers.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<AnalyzerDefinition>> {
        self.analyzers.iter()
    }

    /// Analyzers that run for each job, in catalog order.
    pub fn enabled(&self) -> impl Iterator<Item = &Arc<AnalyzerDefinition>> {
        self.analyzers.iter().filter(|a| a.enabled)
    }

    pub fn get(&self, id: &str) -> Option<&Arc<AnalyzerDefinition>> {
        self.analyzers.iter().find(|a| a.id == id)
    }
}

/// A descriptor that could not be turned into an analyzer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedDescriptor {
    pub path: PathBuf,
    pub reason: String,
}

/// An analyzer whose installer did not exit cleanly. It stays registered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallFailure {
    pub analyzer_id: String,
    pub reason: String,
}

/// Everything bootstrap produced.
#[derive(Debug, Clone)]
pub struct BootstrapReport {
    pub analyzers_path: PathBuf,
    pub catalog: AnalyzerCatalog,
    pub skipped: Vec<SkippedDescriptor>,
    pub install_failures: Vec<InstallFailure>,
}

impl BootstrapReport {
    fn new(analyzers_path: PathBuf) -> Self {
        Self {
            analyzers_path,
            catalog: AnalyzerCatalog::default(),
            skipped: Vec::new(),
            install_failures: Vec::new(),
        }
    }

    /// Bootstrap fails outright only when nothing was loaded.
    pub fn check(&self) -> EngineResult<()> {
        if self.catalog.is_empty() {
            return Err(EngineError::NoAnalyzersLoaded {
                path: self.analyzers_path.clone(),
            });
        }
        Ok(())
    }
}

/// Direct subdirectories of `root`, sorted by name.
fn analyzer_dirs(root: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut dirs = Vec::new();
    for entry in std::fs::read_dir(root)? {
        let path = entry?.path();
        if path.is_dir() {
            dirs.push(path);
        }
    }
    dirs.sort();
    Ok(dirs)
}

fn install_all(analyzers: &[AnalyzerDefinition], config: &EngineConfig) -> Vec<InstallFailure> {
    let mut failures = Vec::new();
    let with_deps: Vec<_> = analyzers.iter().filter(|a| a.has_dependencies()).collect();
    if with_deps.is_empty() {
        return failures;
    }

    if let Err(e) = std::fs::create_dir_all(&config.dependency_path) {
        warn!(
            path = %config.dependency_path.display(),
            error = %e,
            "unable to create dependency root"
        );
    }

    for analyzer in with_deps {
        let Some(install) = &analyzer.install_command else {
            continue;
        };
        info!(analyzer_id = %analyzer.id, command = %install.display_line(), "installing analyzer dependencies");
        if let Err(e) = AnalyzerRunner::install(install) {
            let reason = e.to_string();
            obs::emit_install_failed(&analyzer.id, &reason);
            failures.push(InstallFailure {
                analyzer_id: analyzer.id.clone(),
                reason,
            });
        }
    }
    failures
}
