//! End-to-end extraction pipeline.
//!
//! Stages run in order: load, parse and normalize into one corpus tree,
//! transform pass, report pass, home override, finalize, post-process and
//! render. Only loading is concurrent; both passes walk the whole corpus on
//! one thread.

mod catalog;
mod loader;

pub use catalog::{report_rule_set, resolve_rules, transform_rule_set, DEFAULT_RULE_SET, EMPTY_RULE_SET};
pub use loader::{load_sources, select_grammar, FsLoader, MemoryLoader, SourceLoader, PACKAGE_MANIFEST};

use std::sync::Arc;

use tracing::info;

use crate::ast_engine::GrammarCache;
use crate::error::Result;
use crate::render::{self, Artifacts, RenderInput, Renderer};
use crate::report::{post_process, Report, ReportGraph, REPORT_PASS};
use crate::transform::TRANSFORM_PASS;
use crate::tree::{assemble_corpus, CorpusEntry, Normalizer, Tree};
use crate::types::{DocwalkConfig, SourceFile};
use crate::walk::{Pass, RuleRegistry, RuleSet, WalkStats};

/// Parse and normalize every file into one corpus tree.
pub fn parse_corpus(files: &[SourceFile]) -> Result<Tree> {
    let cache = GrammarCache::global();
    let entries = files
        .iter()
        .map(|file| -> Result<CorpusEntry> {
            let grammar = cache.load(&file.grammar)?;
            let raw = grammar.parse(&file.content, &file.path)?;
            Ok(CorpusEntry {
                path: file.path.clone(),
                grammar: grammar.name().to_string(),
                package: file.package.clone(),
                program: Normalizer::new(grammar).normalize(raw),
            })
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(assemble_corpus(entries)?)
}

/// Everything a run produced.
#[derive(Debug)]
pub struct RunOutput {
    /// The transformed corpus tree.
    pub tree: Tree,
    /// The finalized, post-processed report.
    pub report: Report,
    pub artifacts: Artifacts,
    pub transform_stats: WalkStats,
    pub report_stats: WalkStats,
}

/// Configures a [`Pipeline`].
pub struct PipelineBuilder {
    config: DocwalkConfig,
    loader: Option<Arc<dyn SourceLoader>>,
    transform_rules: Option<RuleSet<()>>,
    report_rules: Option<RuleSet<ReportGraph>>,
    transform_set: Option<String>,
    report_set: Option<String>,
    renderers: Option<Vec<String>>,
}

impl PipelineBuilder {
    /// Read sources through `loader` instead of the project directory.
    pub fn loader(mut self, loader: Arc<dyn SourceLoader>) -> Self {
        self.loader = Some(loader);
        self
    }

    /// Use these transform rules, ignoring any named set.
    pub fn transform_rules(mut self, rules: RuleSet<()>) -> Self {
        self.transform_rules = Some(rules);
        self
    }

    /// Use these report rules, ignoring any named set.
    pub fn report_rules(mut self, rules: RuleSet<ReportGraph>) -> Self {
        self.report_rules = Some(rules);
        self
    }

    pub fn transform_set(mut self, name: &str) -> Self {
        self.transform_set = Some(name.to_string());
        self
    }

    pub fn report_set(mut self, name: &str) -> Self {
        self.report_set = Some(name.to_string());
        self
    }

    /// Run these renderers instead of the configured ones.
    pub fn renderers(mut self, names: &[&str]) -> Self {
        self.renderers = Some(names.iter().map(|n| n.to_string()).collect());
        self
    }

    /// Resolve rule sets and renderers.
    pub fn build(self) -> Result<Pipeline> {
        let transform = resolve_rules(
            TRANSFORM_PASS,
            self.transform_rules,
            self.transform_set.as_deref(),
            self.config.transform_rules.as_deref(),
            transform_rule_set,
        )?;
        let report = resolve_rules(
            REPORT_PASS,
            self.report_rules,
            self.report_set.as_deref(),
            self.config.report_rules.as_deref(),
            report_rule_set,
        )?;

        let names = self.renderers.unwrap_or_else(|| self.config.renderers.clone());
        let renderers = names
            .iter()
            .map(|name| render::renderer(name))
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let loader: Arc<dyn SourceLoader> = match self.loader {
            Some(loader) => loader,
            None => Arc::new(FsLoader::new(self.config.project_dir.clone())),
        };

        Ok(Pipeline {
            transform: Pass::new(TRANSFORM_PASS, RuleRegistry::build(transform)),
            report: Pass::new(REPORT_PASS, RuleRegistry::build(report)),
            renderers,
            loader,
            config: self.config,
        })
    }
}

/// A configured extraction run.
pub struct Pipeline {
    config: DocwalkConfig,
    loader: Arc<dyn SourceLoader>,
    transform: Pass<()>,
    report: Pass<ReportGraph>,
    renderers: Vec<Arc<dyn Renderer>>,
}

impl Pipeline {
    pub fn builder(config: DocwalkConfig) -> PipelineBuilder {
        PipelineBuilder {
            config,
            loader: None,
            transform_rules: None,
            report_rules: None,
            transform_set: None,
            report_set: None,
            renderers: None,
        }
    }

    pub fn config(&self) -> &DocwalkConfig {
        &self.config
    }

    /// Run every stage. The first error aborts the run.
    pub async fn run(&self) -> Result<RunOutput> {
        let files = load_sources(
            self.loader.as_ref(),
            &self.config.inputs,
            self.config.grammar.as_deref(),
            self.config.max_concurrent_reads,
        )
        .await?;
        info!(files = files.len(), "Loaded sources");

        let mut tree = parse_corpus(&files)?;
        info!(nodes = tree.len(), "Parsed corpus");

        let transform_stats = self.transform.run(&mut tree, &mut ())?;
        info!(
            visited = transform_stats.visited,
            requeued = transform_stats.requeued,
            "Transform pass complete"
        );

        let mut graph = ReportGraph::new();
        let report_stats = self.report.run(&mut tree, &mut graph)?;
        info!(items = graph.len(), "Report pass complete");

        if let Some(home) = &self.config.home {
            graph.set_home(home)?;
        }
        graph.finalize();
        let report = post_process(&graph.into_report());

        let input = RenderInput {
            tree: &tree,
            report: &report,
            report_artifact: &self.config.report_artifact,
        };
        let mut artifacts = Artifacts::new();
        for renderer in &self.renderers {
            renderer.render(&input, &mut artifacts)?;
        }
        info!(artifacts = artifacts.len(), "Rendered artifacts");

        Ok(RunOutput {
            tree,
            report,
            artifacts,
            transform_stats,
            report_stats,
        })
    }

    /// Run, then write the artifacts to the configured output directory.
    pub async fn run_and_write(&self) -> Result<RunOutput> {
        let output = self.run().await?;
        let written = output.artifacts.write_to(&self.config.output_dir).await?;
        info!(
            count = written.len(),
            dir = %self.config.output_dir.display(),
            "Wrote artifacts"
        );
        Ok(output)
    }
}
