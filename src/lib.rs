//! docwalk Library
//!
//! Rule-driven API documentation extraction. Source files are parsed with
//! tree-sitter into one mutable node tree, annotated by a transform pass,
//! walked again by a report pass that builds a multi-parent item graph, and
//! rendered into artifacts such as `report.json`.

pub mod ast_engine;
pub mod error;
pub mod pipeline;
pub mod render;
pub mod report;
pub mod transform;
pub mod tree;
pub mod types;
pub mod walk;

pub use error::{Error, Result};
pub use pipeline::{Pipeline, PipelineBuilder, RunOutput};
pub use report::{Item, Report, ReportGraph};
pub use tree::{NodeId, Tree};
pub use types::DocwalkConfig;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::error::*;
    pub use crate::pipeline::{Pipeline, SourceLoader};
    pub use crate::report::{Item, Report, ReportGraph};
    pub use crate::tree::{Insert, NodeId, NodeValue, RawNode, Tree};
    pub use crate::types::*;
    pub use crate::walk::{Event, FnRule, PassContext, Rule, RuleSet};
}

/// Project configuration file, relative to the project directory
pub const CONFIG_FILE_NAME: &str = "docwalk.toml";

/// Default number of source files read concurrently
pub const DEFAULT_MAX_CONCURRENT_READS: usize = 8;

/// Default name of the primary report artifact
pub const DEFAULT_REPORT_ARTIFACT: &str = "report.json";
