//! Report pass: builds the item graph from the transformed tree.

pub mod graph;
pub mod postprocess;
pub mod rules;

pub use graph::{Item, Report, ReportGraph, DEFAULT_ITEM_TYPE, GROUP_TYPE, ROOT_GROUP};
pub use postprocess::post_process;
pub use rules::default_rules;

use crate::error::HandlerError;
use crate::tree::Tree;
use crate::walk::{Pass, RuleRegistry, RuleSet, WalkStats};

/// Name the report pass reports in logs and errors.
pub const REPORT_PASS: &str = "report";

/// Walk `tree` with report rules, collecting items into a fresh graph.
///
/// The graph is returned unfinalized so callers can still adjust `home`.
pub fn build_report(tree: &mut Tree, rules: RuleSet<ReportGraph>) -> Result<(ReportGraph, WalkStats), HandlerError> {
    let pass = Pass::new(REPORT_PASS, RuleRegistry::build(rules));
    let mut graph = ReportGraph::new();
    let stats = pass.run(tree, &mut graph)?;
    Ok((graph, stats))
}
