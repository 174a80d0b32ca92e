//! Analyzer descriptor files and their resolution into definitions.
//!
//! An analyzer lives in `<analyzers_path>/<dir>/` and is described by
//! `<dir>/<dir>.json`. Every descriptor field is optional:
//!
//! ```json
//! {
//!   "id": "whois",
//!   "name": "WHOIS",
//!   "enabled": true,
//!   "run": ["-m", "{id}.{id}"],
//!   "requirements": "requirements.txt"
//! }
//! ```
//!
//! Argument templates may use `{id}`, `{analyzer_dir}`, `{source}`,
//! `{target}` and `{requirements}`.

use analyze_core::{AnalyzerDefinition, CommandSpec, EngineConfig};
use serde::Deserialize;
use std::path::{Path, PathBuf};

const DEFAULT_REQUIREMENTS_FILE: &str = "requirements.txt";

/// Errors that make a descriptor unusable. The analyzer is skipped.
#[derive(Debug, thiserror::Error)]
pub enum DescriptorError {
    #[error("unable to read descriptor: {0}")]
    Read(#[from] std::io::Error),

    #[error("malformed descriptor: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid analyzer id: {0:?}")]
    InvalidId(String),

    #[error("run command must not be empty")]
    EmptyRun,

    #[error("duplicate analyzer id: {0}")]
    DuplicateId(String),
}

/// On-disk analyzer descriptor.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct AnalyzerDescriptor {
    pub id: Option<String>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub version: Option<String>,
    pub enabled: Option<bool>,
    pub run: Option<Vec<String>>,
    pub install: Option<Vec<String>>,
    pub requirements: Option<String>,
}

impl AnalyzerDescriptor {
    /// Path of the descriptor file for an analyzer directory.
    pub fn path_for(analyzer_dir: &Path) -> Option<PathBuf> {
        let dir_name = analyzer_dir.file_name()?.to_str()?;
        Some(analyzer_dir.join(format!("{dir_name}.json")))
    }

    /// Read and parse a descriptor file.
    pub fn load(path: &Path) -> Result<Self, DescriptorError> {
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Resolve into a definition using the engine's executables and paths.
    pub fn resolve(
        self,
        analyzer_dir: &Path,
        config: &EngineConfig,
    ) -> Result<AnalyzerDefinition, DescriptorError> {
        let dir_name = analyzer_dir
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default();
        let id = self.id.unwrap_or_else(|| dir_name.to_string());
        validate_id(&id)?;

        let requirements = analyzer_dir.join(
            self.requirements
                .as_deref()
                .unwrap_or(DEFAULT_REQUIREMENTS_FILE),
        );
        let target = config.dependency_dir(&id);
        let placeholders = Placeholders {
            id: &id,
            analyzer_dir,
            source: &config.dependency_source_path,
            target: &target,
            requirements: &requirements,
        };

        let run_args = self.run.unwrap_or_else(default_run_args);
        if run_args.is_empty() {
            return Err(DescriptorError::EmptyRun);
        }
        let mut run_command =
            CommandSpec::new(&config.run_executable, placeholders.expand_all(&run_args))
                .in_dir(&config.analyzers_path);
        if !config.dependency_env_var.is_empty() {
            run_command = run_command.with_env(
                &config.dependency_env_var,
                target.to_string_lossy().into_owned(),
            );
        }

        let install_command = requirements.is_file().then(|| {
            let install_args = self.install.unwrap_or_else(default_install_args);
            CommandSpec::new(
                &config.install_executable,
                placeholders.expand_all(&install_args),
            )
        });

        Ok(AnalyzerDefinition {
            id,
            name: self.name,
            description: self.description,
            enabled: self.enabled.unwrap_or(true),
            run_command,
            install_command,
        })
    }
}

fn validate_id(id: &str) -> Result<(), DescriptorError> {
    let path_like = id.contains('/') || id.contains('\\') || id == "." || id == "..";
    if id.trim().is_empty() || path_like {
        return Err(DescriptorError::InvalidId(id.to_string()));
    }
    Ok(())
}

fn default_run_args() -> Vec<String> {
    vec!["-m".to_string(), "{id}.{id}".to_string()]
}

fn default_install_args() -> Vec<String> {
    [
        "install",
        "--upgrade",
        "--no-index",
        "--find-links",
        "{source}",
        "--target",
        "{target}",
        "-r",
        "{requirements}",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

struct Placeholders<'a> {
    id: &'a str,
    analyzer_dir: &'a Path,
    source: &'a Path,
    target: &'a Path,
    requirements: &'a Path,
}

impl Placeholders<'_> {
    fn expand(&self, arg: &str) -> String {
        arg.replace("{id}", self.id)
            .replace("{analyzer_dir}", &self.analyzer_dir.to_string_lossy())
            .replace("{source}", &self.source.to_string_lossy())
            .replace("{target}", &self.target.to_string_lossy())
            .replace("{requirements}", &self.requirements.to_string_lossy())
    }

    fn expand_all(&self, args: &[String]) -> Vec<String> {
        args.iter().map(|arg| self.expand(arg)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(root: &Path) -> EngineConfig {
        EngineConfig {
            analyzers_path: root.join("analyzers"),
            dependency_path: root.join("site-packages"),
            dependency_source_path: root.join("sources"),
            ..EngineConfig::default()
        }
    }

    #[test]
    fn test_path_for_uses_directory_name() {
        assert_eq!(
            AnalyzerDescriptor::path_for(Path::new("/a/whois")),
            Some(PathBuf::from("/a/whois/whois.json"))
        );
    }

    #[test]
    fn test_resolve_defaults() {
        let root = tempfile::tempdir().unwrap();
        let cfg = config(root.path());
        let dir = cfg.analyzers_path.join("whois");

        let analyzer = AnalyzerDescriptor::default().resolve(&dir, &cfg).unwrap();

        assert_eq!(analyzer.id, "whois");
        assert!(analyzer.enabled);
        assert_eq!(analyzer.run_command.program, "python3");
        assert_eq!(analyzer.run_command.args, vec!["-m", "whois.whois"]);
        assert_eq!(
            analyzer.run_command.current_dir,
            Some(cfg.analyzers_path.clone())
        );
        assert_eq!(
            analyzer.run_command.env,
            vec![(
                "PYTHONPATH".to_string(),
                cfg.dependency_dir("whois").to_string_lossy().into_owned()
            )]
        );
        // No requirements file on disk.
        assert!(analyzer.install_command.is_none());
    }

    #[test]
    fn test_resolve_install_when_requirements_present() {
        let root = tempfile::tempdir().unwrap();
        let cfg = config(root.path());
        let dir = cfg.analyzers_path.join("whois");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("requirements.txt"), "whois==0.9\n").unwrap();

        let analyzer = AnalyzerDescriptor::default().resolve(&dir, &cfg).unwrap();
        let install = analyzer.install_command.unwrap();

        assert_eq!(install.program, "pip3");
        let target = cfg.dependency_dir("whois").to_string_lossy().into_owned();
        let source = cfg.dependency_source_path.to_string_lossy().into_owned();
        assert!(install.args.contains(&target));
        assert!(install.args.contains(&source));
        assert!(install
            .args
            .contains(&dir.join("requirements.txt").to_string_lossy().into_owned()));
        assert!(install.current_dir.is_none());
    }

    #[test]
    fn test_resolve_custom_templates() {
        let root = tempfile::tempdir().unwrap();
        let cfg = EngineConfig {
            dependency_env_var: String::new(),
            ..config(root.path())
        };
        let dir = cfg.analyzers_path.join("dns");
        let descriptor: AnalyzerDescriptor = serde_json::from_str(
            r#"{"id": "dns-lookup", "enabled": false, "run": ["{analyzer_dir}/run.sh", "{id}"]}"#,
        )
        .unwrap();

        let analyzer = descriptor.resolve(&dir, &cfg).unwrap();

        assert_eq!(analyzer.id, "dns-lookup");
        assert!(!analyzer.enabled);
        assert_eq!(
            analyzer.run_command.args,
            vec![
                format!("{}/run.sh", dir.to_string_lossy()),
                "dns-lookup".to_string()
            ]
        );
        assert!(analyzer.run_command.env.is_empty());
    }

    #[test]
    fn test_resolve_rejects_bad_ids_and_empty_run() {
        let root = tempfile::tempdir().unwrap();
        let cfg = config(root.path());
        let dir = cfg.analyzers_path.join("x");

        for id in ["", "  ", "../escape", "a/b", ".."] {
            let descriptor = AnalyzerDescriptor {
                id: Some(id.to_string()),
                ..Default::default()
            };
            assert!(matches!(
                descriptor.resolve(&dir, &cfg),
                Err(DescriptorError::InvalidId(_))
            ));
        }

        let descriptor = AnalyzerDescriptor {
            run: Some(vec![]),
            ..Default::default()
        };
        assert!(matches!(
            descriptor.resolve(&dir, &cfg),
            Err(DescriptorError::EmptyRun)
        ));
    }

    #[test]
    fn test_load_rejects_wrong_field_types() {
        let root = tempfile::tempdir().unwrap();
        let path = root.path().join("bad.json");
        std::fs::write(&path, r#"{"enabled": "yes"}"#).unwrap();
        assert!(matches!(
            AnalyzerDescriptor::load(&path),
            Err(DescriptorError::Parse(_))
        ));
    }

    #[test]
    fn test_load_ignores_unknown_fields() {
        let root = tempfile::tempdir().unwrap();
        let path = root.path().join("whois.json");
        std::fs::write(
            &path,
            r#"{"name": "Whois", "version": "0.1", "author": "Security Onion Solutions"}"#,
        )
        .unwrap();
        let descriptor = AnalyzerDescriptor::load(&path).unwrap();
        assert_eq!(descriptor.name.as_deref(), Some("Whois"));
    }
}
