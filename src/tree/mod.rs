//! Node model.
//!
//! Source files become one mutable [`Tree`] of typed nodes stored in an arena.
//! Nodes are addressed by [`NodeId`]; parent and sibling links are handles,
//! never owning references. Each node also carries a scoped item store whose
//! lookups fall back through its ancestors.

mod arena;
mod compare;
mod node;
mod normalize;

pub use arena::{Insert, Tree};
pub use compare::{equal, like, like_source};
pub use node::{Node, NodeId, NodeValue, PlainNode, RawNode};
pub use normalize::{assemble_corpus, CorpusEntry, Normalizer};

/// Node type of the synthetic root holding every file of a run.
pub const CORPUS_KIND: &str = "corpus";

/// Scoped item holding the path of the enclosing file.
pub const FILE_ITEM: &str = "file";

/// Scoped item holding the grammar name of the enclosing file.
pub const GRAMMAR_ITEM: &str = "grammar";

/// Scoped item holding the module name of the enclosing file.
pub const MODULE_ITEM: &str = "module";

/// Placeholder matching any subtree in structural patterns.
pub const WILDCARD: &str = "$_";
