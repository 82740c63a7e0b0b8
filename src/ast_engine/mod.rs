//! AST Engine module for source parsing.
//!
//! This module provides:
//! - Grammar tables for the supported tree-sitter languages
//! - The parse adapter producing the nested raw parse form
//! - A process-wide grammar cache with single compile per grammar

pub mod languages;
pub mod parser;

pub use languages::{get_grammar_spec, grammar_for_path, resolve_selector, supported_grammars, GrammarSpec};
pub use parser::{Grammar, GrammarCache};
