//! Walk engine and rule dispatch.
//!
//! A [`Pass`] walks a tree depth-first, dispatching each pre-order and
//! post-order event to the rules registered for the node's type. Subtrees
//! inserted by handlers are queued and walked after the main traversal.

mod engine;
mod rules;

pub use engine::{Pass, PassContext, WalkStats, WorkQueue};
pub use rules::{end_key, Event, FnRule, Rule, RuleRegistry, RuleSet, END};
