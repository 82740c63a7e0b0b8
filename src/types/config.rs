//! Configuration types for documentation extraction.

use std::path::{Path, PathBuf};

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use crate::{CONFIG_FILE_NAME, DEFAULT_MAX_CONCURRENT_READS, DEFAULT_REPORT_ARTIFACT};

/// Global docwalk configuration.
///
/// Layered with the `config` crate: built-in defaults, then
/// `<project>/docwalk.toml`, then `DOCWALK_*` environment variables.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DocwalkConfig {
    /// Source files to process, relative to the project directory
    pub inputs: Vec<String>,

    /// Grammar selector; inferred from each file's extension when unset
    pub grammar: Option<String>,

    /// Project root (always the directory the config was loaded from)
    pub project_dir: PathBuf,

    /// Directory artifacts are written to
    pub output_dir: PathBuf,

    /// Named transform rule set
    pub transform_rules: Option<String>,

    /// Named report rule set
    pub report_rules: Option<String>,

    /// Renderers to run, by name
    pub renderers: Vec<String>,

    /// Name of the primary report artifact
    pub report_artifact: String,

    /// Key of the item to mark as home, overriding the rules' choice
    pub home: Option<String>,

    /// Maximum files read concurrently
    pub max_concurrent_reads: usize,

    /// Emit logs as JSON
    pub log_json: bool,
}

impl Default for DocwalkConfig {
    fn default() -> Self {
        Self {
            inputs: Vec::new(),
            grammar: None,
            project_dir: PathBuf::from("."),
            output_dir: PathBuf::from("docs"),
            transform_rules: None,
            report_rules: None,
            renderers: vec!["report".to_string()],
            report_artifact: DEFAULT_REPORT_ARTIFACT.to_string(),
            home: None,
            max_concurrent_reads: DEFAULT_MAX_CONCURRENT_READS,
            log_json: false,
        }
    }
}

impl DocwalkConfig {
    /// Load configuration for the project rooted at `project_dir`.
    pub fn load(project_dir: &Path) -> Result<Self, config::ConfigError> {
        let settings = Config::builder()
            .add_source(File::from(project_dir.join(CONFIG_FILE_NAME)).required(false))
            .add_source(
                Environment::with_prefix("DOCWALK")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("inputs")
                    .with_list_parse_key("renderers"),
            )
            .build()?;

        let mut config: DocwalkConfig = settings.try_deserialize()?;
        config.project_dir = project_dir.to_path_buf();
        if config.output_dir.is_relative() {
            config.output_dir = project_dir.join(&config.output_dir);
        }
        if config.max_concurrent_reads == 0 {
            config.max_concurrent_reads = DEFAULT_MAX_CONCURRENT_READS;
        }
        Ok(config)
    }

    /// Set the grammar selector.
    pub fn with_grammar(mut self, grammar: &str) -> Self {
        self.grammar = Some(grammar.to_string());
        self
    }

    /// Set the renderers to run.
    pub fn with_renderers(mut self, renderers: &[&str]) -> Self {
        self.renderers = renderers.iter().map(|r| r.to_string()).collect();
        self
    }
}
