//! Renderers turn the finished tree and report into artifacts.

mod artifacts;
mod source;

pub use artifacts::{Artifact, ArtifactKind, Artifacts};
pub use source::Reconstructor;

use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use crate::error::{Result, RuleLoadError};
use crate::report::Report;
use crate::tree::{Tree, FILE_ITEM, GRAMMAR_ITEM};

/// Name of the exported tree artifact.
pub const TREE_ARTIFACT: &str = "tree.json";

/// Directory reconstructed sources are written under.
pub const SOURCES_DIR: &str = "sources";

/// Everything a renderer may read.
#[derive(Debug, Clone, Copy)]
pub struct RenderInput<'a> {
    pub tree: &'a Tree,
    pub report: &'a Report,
    /// Artifact name for the primary report.
    pub report_artifact: &'a str,
}

/// Produces artifacts from a finished run.
pub trait Renderer: Send + Sync {
    fn name(&self) -> &str;

    fn render(&self, input: &RenderInput<'_>, out: &mut Artifacts) -> Result<()>;
}

/// Writes the post-processed report as JSON.
#[derive(Debug, Default)]
pub struct ReportRenderer;

impl Renderer for ReportRenderer {
    fn name(&self) -> &str {
        "report"
    }

    fn render(&self, input: &RenderInput<'_>, out: &mut Artifacts) -> Result<()> {
        out.insert_json(input.report_artifact, input.report)?;
        Ok(())
    }
}

/// Reconstructs every file whose grammar has a reconstruction table.
#[derive(Debug, Default)]
pub struct SourceRenderer;

impl Renderer for SourceRenderer {
    fn name(&self) -> &str {
        "source"
    }

    fn render(&self, input: &RenderInput<'_>, out: &mut Artifacts) -> Result<()> {
        let tree = input.tree;
        for &file in tree.children(tree.root()) {
            let path = tree.item(file, FILE_ITEM).and_then(Value::as_str);
            let grammar = tree.item(file, GRAMMAR_ITEM).and_then(Value::as_str);
            let (Some(path), Some(grammar)) = (path, grammar) else {
                continue;
            };
            let Some(reconstructor) = Reconstructor::for_grammar(grammar) else {
                debug!(path, grammar, "No source reconstruction for grammar");
                continue;
            };
            let text = reconstructor.render(tree, file)?;
            out.insert_text(&format!("{}/{}", SOURCES_DIR, path), text);
        }
        Ok(())
    }
}

/// Writes the exported corpus tree.
#[derive(Debug, Default)]
pub struct TreeRenderer;

impl Renderer for TreeRenderer {
    fn name(&self) -> &str {
        "tree"
    }

    fn render(&self, input: &RenderInput<'_>, out: &mut Artifacts) -> Result<()> {
        let plain = input.tree.export(input.tree.root());
        out.insert_json(TREE_ARTIFACT, &plain)?;
        Ok(())
    }
}

/// Names accepted by [`renderer`].
pub fn builtin_renderers() -> &'static [&'static str] {
    &["report", "source", "tree"]
}

/// Look up a built-in renderer by name.
pub fn renderer(name: &str) -> std::result::Result<Arc<dyn Renderer>, RuleLoadError> {
    match name {
        "report" => Ok(Arc::new(ReportRenderer)),
        "source" => Ok(Arc::new(SourceRenderer)),
        "tree" => Ok(Arc::new(TreeRenderer)),
        other => Err(RuleLoadError::UnknownRenderer(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::parse_corpus;
    use crate::report::ReportGraph;
    use crate::types::SourceFile;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_renderer_catalog() {
        for name in builtin_renderers() {
            assert_eq!(renderer(name).unwrap().name(), *name);
        }
        assert_eq!(
            renderer("html").err(),
            Some(RuleLoadError::UnknownRenderer("html".to_string()))
        );
    }

    #[test]
    fn test_render_all() {
        let files = vec![
            SourceFile::new("a.js", "let a = 1;", "javascript"),
            SourceFile::new("b.ts", "let b: number = 2;", "typescript"),
        ];
        let tree = parse_corpus(&files).unwrap();
        let report = ReportGraph::new().into_report();
        let input = RenderInput {
            tree: &tree,
            report: &report,
            report_artifact: "api.json",
        };

        let mut out = Artifacts::new();
        for name in builtin_renderers() {
            renderer(name).unwrap().render(&input, &mut out).unwrap();
        }

        assert_eq!(
            out.names().collect::<Vec<_>>(),
            vec!["api.json", "sources/a.js", "tree.json"]
        );
        assert_eq!(out.get("sources/a.js").unwrap().content, "let a = 1;\n");
        assert!(out.get("api.json").unwrap().content.contains("\"root\""));
        assert!(out.get("tree.json").unwrap().content.contains("\"corpus\""));
    }

    #[test]
    fn test_jsx_and_with_sources_render() {
        let files = vec![
            SourceFile::new("app.jsx", "const el = <div>hi</div>;", "javascript"),
            SourceFile::new("legacy.js", "with (o) { f(); }", "javascript"),
        ];
        let tree = parse_corpus(&files).unwrap();
        let report = ReportGraph::new().into_report();
        let input = RenderInput {
            tree: &tree,
            report: &report,
            report_artifact: "report.json",
        };

        let mut out = Artifacts::new();
        SourceRenderer.render(&input, &mut out).unwrap();

        assert_eq!(out.get("sources/app.jsx").unwrap().content, "const el = <div>hi</div>;\n");
        assert_eq!(out.get("sources/legacy.js").unwrap().content, "with (o) {\n  f();\n}\n");
    }
}
