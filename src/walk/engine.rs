//! Mutation-safe depth-first pass over a tree.

use std::collections::{HashSet, VecDeque};

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, trace};

use super::rules::{end_key, Event, Rule, RuleRegistry, END};
use crate::error::{HandlerError, TreeError};
use crate::tree::{self, Insert, NodeId, NodeValue, Tree, FILE_ITEM};
use crate::types::Location;

/// Nodes inserted during a pass, waiting for their own walk.
#[derive(Debug, Default)]
pub struct WorkQueue {
    queue: VecDeque<NodeId>,
    pending: HashSet<NodeId>,
}

impl WorkQueue {
    pub fn push(&mut self, id: NodeId) {
        if self.pending.insert(id) {
            self.queue.push_back(id);
        }
    }

    pub fn pop(&mut self) -> Option<NodeId> {
        let id = self.queue.pop_front()?;
        self.pending.remove(&id);
        Some(id)
    }

    pub fn is_pending(&self, id: NodeId) -> bool {
        self.pending.contains(&id)
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

/// Handler view of a running pass.
///
/// Reads go through [`tree`](Self::tree); every structural mutation goes
/// through the context so inserted subtrees get scheduled.
pub struct PassContext<'a, S> {
    tree: &'a mut Tree,
    queue: &'a mut WorkQueue,
    /// Pass state shared by all handlers.
    pub state: &'a mut S,
    event: Event,
    pass: &'a str,
}

impl<'a, S> PassContext<'a, S> {
    pub fn tree(&self) -> &Tree {
        &*self.tree
    }

    pub fn event(&self) -> Event {
        self.event
    }

    pub fn pass(&self) -> &str {
        self.pass
    }

    pub fn kind(&self, id: NodeId) -> &str {
        self.tree.kind(id)
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.tree.children(id)
    }

    pub fn text(&self, id: NodeId) -> Option<&str> {
        self.tree.text(id)
    }

    pub fn attr(&self, id: NodeId, key: &str) -> Option<&Value> {
        self.tree.attr(id, key)
    }

    pub fn item(&self, id: NodeId, key: &str) -> Option<&Value> {
        self.tree.item(id, key)
    }

    /// String scoped item.
    pub fn item_str(&self, id: NodeId, key: &str) -> Option<&str> {
        self.tree.item(id, key).and_then(Value::as_str)
    }

    pub fn like_source(&self, id: NodeId, snippet: &str) -> bool {
        tree::like_source(&*self.tree, id, snippet)
    }

    pub fn append(&mut self, parent: NodeId, insert: impl Into<Insert>) -> Result<NodeId, TreeError> {
        let id = self.tree.append(parent, insert)?;
        self.queue.push(id);
        Ok(id)
    }

    pub fn prepend(&mut self, parent: NodeId, insert: impl Into<Insert>) -> Result<NodeId, TreeError> {
        let id = self.tree.prepend(parent, insert)?;
        self.queue.push(id);
        Ok(id)
    }

    pub fn after(&mut self, sibling: NodeId, insert: impl Into<Insert>) -> Result<NodeId, TreeError> {
        let id = self.tree.after(sibling, insert)?;
        self.queue.push(id);
        Ok(id)
    }

    pub fn before(&mut self, sibling: NodeId, insert: impl Into<Insert>) -> Result<NodeId, TreeError> {
        let id = self.tree.before(sibling, insert)?;
        self.queue.push(id);
        Ok(id)
    }

    pub fn remove(&mut self, id: NodeId) -> Result<(), TreeError> {
        self.tree.remove(id)
    }

    pub fn set_attr(&mut self, id: NodeId, key: &str, value: impl Into<Value>) {
        self.tree.set_attr(id, key, value);
    }

    pub fn remove_attr(&mut self, id: NodeId, key: &str) -> Option<Value> {
        self.tree.remove_attr(id, key)
    }

    pub fn set_item(&mut self, id: NodeId, key: &str, value: impl Into<Value>) {
        self.tree.set_item(id, key, value);
    }

    pub fn set_value(&mut self, id: NodeId, value: Option<NodeValue>) {
        self.tree.set_value(id, value);
    }
}

/// Counters reported by a finished pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct WalkStats {
    /// Nodes entered.
    pub visited: usize,
    /// Rule handlers invoked.
    pub dispatched: usize,
    /// Inserted subtrees walked after the main traversal.
    pub requeued: usize,
}

enum Step {
    Visit(NodeId),
    End(NodeId),
}

/// One walk of a tree with a fixed rule registry.
pub struct Pass<S> {
    name: String,
    registry: RuleRegistry<S>,
}

impl<S> Pass<S> {
    pub fn new(name: &str, registry: RuleRegistry<S>) -> Self {
        Self {
            name: name.to_string(),
            registry,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Walk the whole tree, then every subtree inserted along the way.
    ///
    /// The first handler error aborts the pass.
    pub fn run(&self, tree: &mut Tree, state: &mut S) -> Result<WalkStats, HandlerError> {
        let mut queue = WorkQueue::default();
        let mut stats = WalkStats::default();

        let root = tree.root();
        self.walk(tree, state, &mut queue, root, &mut stats)?;

        while let Some(id) = queue.pop() {
            if !tree.is_live(id) {
                continue;
            }
            stats.requeued += 1;
            self.walk(tree, state, &mut queue, id, &mut stats)?;
        }

        debug!(
            pass = %self.name,
            visited = stats.visited,
            dispatched = stats.dispatched,
            requeued = stats.requeued,
            "Pass complete"
        );
        Ok(stats)
    }

    fn walk(
        &self,
        tree: &mut Tree,
        state: &mut S,
        queue: &mut WorkQueue,
        start: NodeId,
        stats: &mut WalkStats,
    ) -> Result<(), HandlerError> {
        let mut stack = vec![Step::Visit(start)];

        while let Some(step) = stack.pop() {
            match step {
                Step::Visit(id) => {
                    // Pending nodes get their own walk once the queue drains
                    if !tree.is_live(id) || queue.is_pending(id) {
                        continue;
                    }
                    stats.visited += 1;

                    let children = tree.children(id).to_vec();
                    self.dispatch(tree, state, queue, id, Event::Enter, stats)?;
                    if !tree.is_live(id) {
                        continue;
                    }

                    let node = tree.node(id);
                    if node.value().is_none() || !node.children().is_empty() {
                        stack.push(Step::End(id));
                    }
                    stack.extend(children.into_iter().rev().map(Step::Visit));
                }
                Step::End(id) => {
                    if tree.is_live(id) {
                        self.dispatch(tree, state, queue, id, Event::End, stats)?;
                    }
                }
            }
        }
        Ok(())
    }

    fn dispatch(
        &self,
        tree: &mut Tree,
        state: &mut S,
        queue: &mut WorkQueue,
        id: NodeId,
        event: Event,
        stats: &mut WalkStats,
    ) -> Result<(), HandlerError> {
        let kind = tree.kind(id).to_string();
        let keys = match event {
            Event::Enter => vec![kind],
            Event::End => vec![END.to_string(), end_key(&kind)],
        };

        for key in &keys {
            for rule in self.registry.lookup(key) {
                if !tree.is_live(id) {
                    return Ok(());
                }

                let result = {
                    let mut ctx = PassContext {
                        tree: &mut *tree,
                        queue: &mut *queue,
                        state: &mut *state,
                        event,
                        pass: &self.name,
                    };
                    if !rule.matches(&ctx, id) {
                        continue;
                    }
                    stats.dispatched += 1;
                    trace!(pass = %self.name, rule = rule.name(), bucket = %key, node = %id, "Dispatch");
                    rule.apply(&mut ctx, id)
                };

                if let Err(source) = result {
                    return Err(self.annotate(tree, id, rule.as_ref(), source));
                }
            }
        }
        Ok(())
    }

    fn annotate(&self, tree: &Tree, id: NodeId, rule: &dyn Rule<S>, source: anyhow::Error) -> HandlerError {
        let file = tree.item(id, FILE_ITEM).and_then(Value::as_str).map(String::from);
        let location = tree.location_of(id);

        HandlerError {
            pass: self.name.clone(),
            rule: rule.name().to_string(),
            kind: tree.kind(id).to_string(),
            at: describe_at(file.as_deref(), location),
            file,
            location,
            source: source.into(),
        }
    }
}

fn describe_at(file: Option<&str>, location: Option<Location>) -> String {
    match (file, location) {
        (Some(file), Some(location)) => format!("{}:{}", file, location),
        (Some(file), None) => file.to_string(),
        (None, Some(location)) => location.to_string(),
        (None, None) => "<unknown>".to_string(),
    }
}
