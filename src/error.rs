//! Error taxonomy.
//!
//! Each concern has its own `thiserror` enum; [`Error`] aggregates them for
//! pipeline-level results. Nothing here is retried: parse and handler errors
//! abort the current pass, graph invariant errors signal a defective rule.

use std::path::PathBuf;

use thiserror::Error;

use crate::tree::NodeId;
use crate::types::Location;

/// Malformed source text.
#[derive(Debug, Clone, Error)]
#[error("syntax error in {file} at {location}: {message}")]
pub struct ParseError {
    pub file: String,
    pub location: Location,
    pub message: String,
}

impl ParseError {
    pub fn new(file: &str, location: Location, message: impl Into<String>) -> Self {
        Self {
            file: file.to_string(),
            location,
            message: message.into(),
        }
    }

    pub fn line(&self) -> usize {
        self.location.line
    }

    pub fn column(&self) -> usize {
        self.location.column
    }

    pub fn position(&self) -> usize {
        self.location.position
    }
}

/// Structural misuse of the node tree.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TreeError {
    #[error("malformed node: {0}")]
    Malformed(String),

    #[error("node {0} is detached from the tree")]
    Detached(NodeId),

    #[error("cannot insert node {node} under its own descendant {parent}")]
    Cycle { node: NodeId, parent: NodeId },

    #[error("the root node cannot be moved")]
    RootMove,
}

/// A rule handler failed during a pass.
#[derive(Debug, Error)]
#[error("{pass} pass: rule `{rule}` failed on `{kind}` node at {at}: {source}")]
pub struct HandlerError {
    pub pass: String,
    pub rule: String,
    pub kind: String,
    pub file: Option<String>,
    pub location: Option<Location>,
    /// Rendered `file:line:column` for display.
    pub at: String,
    #[source]
    pub source: Box<dyn std::error::Error + Send + Sync + 'static>,
}

/// Report graph invariant violations. Always a defect in a rule set.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
    #[error("item key must not be empty")]
    EmptyKey,

    #[error("item `{0}` already exists")]
    DuplicateKey(String),

    #[error("unknown item `{0}`")]
    UnknownKey(String),

    #[error("group `{key}` still has {count} children")]
    NonEmptyGroup { key: String, count: usize },

    #[error("item `{0}` cannot be its own group")]
    SelfGroup(String),
}

/// Missing or unusable rule set or renderer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuleLoadError {
    #[error("no {pass} rule set could be resolved (tried: {tried})")]
    Unresolved { pass: String, tried: String },

    #[error("unknown renderer `{0}`")]
    UnknownRenderer(String),

    #[error("unknown grammar `{0}`")]
    UnknownGrammar(String),

    #[error("grammar `{name}` could not be loaded: {reason}")]
    GrammarLoad { name: String, reason: String },
}

/// Source reconstruction failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RenderError {
    #[error("no source renderer for node type `{0}`")]
    MissingEntry(String),

    #[error("malformed `{kind}` node: {reason}")]
    Malformed { kind: String, reason: String },
}

/// An artifact could not be serialized.
#[derive(Debug, Error)]
#[error("failed to serialize artifact `{artifact}`: {source}")]
pub struct SerializationError {
    pub artifact: String,
    #[source]
    pub source: serde_json::Error,
}

/// Pipeline-level error.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Tree(#[from] TreeError),

    #[error(transparent)]
    Handler(#[from] HandlerError),

    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    RuleLoad(#[from] RuleLoadError),

    #[error(transparent)]
    Render(#[from] RenderError),

    #[error(transparent)]
    Serialization(#[from] SerializationError),

    #[error(transparent)]
    Config(#[from] config::ConfigError),

    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
