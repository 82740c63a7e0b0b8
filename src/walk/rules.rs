//! Rules and the type-indexed rule registry.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use super::engine::PassContext;
use crate::tree::NodeId;

/// Bucket receiving every post-order event.
pub const END: &str = "end";

/// Bucket receiving post-order events for one node type only.
pub fn end_key(kind: &str) -> String {
    format!("{}-{}", END, kind)
}

fn is_typed_end(key: &str) -> bool {
    key.strip_prefix(END).map_or(false, |rest| rest.starts_with('-'))
}

/// Walk event being dispatched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    /// Pre-order visit.
    Enter,
    /// Post-order visit, after all children.
    End,
}

/// A rule applied during a pass.
///
/// `S` is the pass state handed to every handler: nothing for the transform
/// pass, the report graph for the report pass.
pub trait Rule<S>: Send + Sync {
    /// Bucket this rule registers under. `None` or an empty string makes the
    /// rule a wildcard.
    fn kind(&self) -> Option<&str>;

    fn name(&self) -> &str {
        "anonymous"
    }

    fn matches(&self, _ctx: &PassContext<'_, S>, _node: NodeId) -> bool {
        true
    }

    fn apply(&self, ctx: &mut PassContext<'_, S>, node: NodeId) -> anyhow::Result<()>;
}

type Handler<S> = dyn Fn(&mut PassContext<'_, S>, NodeId) -> anyhow::Result<()> + Send + Sync;
type Matcher<S> = dyn Fn(&PassContext<'_, S>, NodeId) -> bool + Send + Sync;

/// A rule built from closures.
pub struct FnRule<S> {
    kind: Option<String>,
    name: String,
    matcher: Option<Box<Matcher<S>>>,
    handler: Box<Handler<S>>,
}

impl<S: 'static> FnRule<S> {
    /// Rule for one bucket (a node type, `end` or `end-<type>`).
    pub fn on<F>(kind: &str, handler: F) -> Self
    where
        F: Fn(&mut PassContext<'_, S>, NodeId) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        Self {
            kind: Some(kind.to_string()),
            name: kind.to_string(),
            matcher: None,
            handler: Box::new(handler),
        }
    }

    /// Wildcard rule.
    pub fn any<F>(handler: F) -> Self
    where
        F: Fn(&mut PassContext<'_, S>, NodeId) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        Self {
            kind: None,
            name: "*".to_string(),
            matcher: None,
            handler: Box::new(handler),
        }
    }

    /// Only apply when `matcher` passes.
    pub fn when<M>(mut self, matcher: M) -> Self
    where
        M: Fn(&PassContext<'_, S>, NodeId) -> bool + Send + Sync + 'static,
    {
        self.matcher = Some(Box::new(matcher));
        self
    }

    pub fn named(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    pub fn build(self) -> Arc<dyn Rule<S>> {
        Arc::new(self)
    }
}

impl<S> Rule<S> for FnRule<S> {
    fn kind(&self) -> Option<&str> {
        self.kind.as_deref()
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn matches(&self, ctx: &PassContext<'_, S>, node: NodeId) -> bool {
        self.matcher.as_ref().map_or(true, |m| m(ctx, node))
    }

    fn apply(&self, ctx: &mut PassContext<'_, S>, node: NodeId) -> anyhow::Result<()> {
        (self.handler)(ctx, node)
    }
}

impl<S> fmt::Debug for FnRule<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnRule")
            .field("kind", &self.kind)
            .field("name", &self.name)
            .finish()
    }
}

/// Ordered rule list for a pass.
pub type RuleSet<S> = Vec<Arc<dyn Rule<S>>>;

/// Dispatch table from bucket key to ordered rules.
///
/// Wildcards are merged explicitly: a new wildcard is appended to every
/// bucket that exists at that point, and a new bucket starts out with the
/// wildcards registered so far. `end-<type>` buckets never receive
/// wildcards, which see post-order events through the `end` bucket instead.
pub struct RuleRegistry<S> {
    buckets: HashMap<String, RuleSet<S>>,
    wildcards: RuleSet<S>,
}

impl<S> Default for RuleRegistry<S> {
    fn default() -> Self {
        Self {
            buckets: HashMap::new(),
            wildcards: Vec::new(),
        }
    }
}

impl<S> RuleRegistry<S> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from rules in declaration order.
    pub fn build(rules: impl IntoIterator<Item = Arc<dyn Rule<S>>>) -> Self {
        let mut registry = Self::new();
        for rule in rules {
            registry.register(rule);
        }
        registry
    }

    pub fn register(&mut self, rule: Arc<dyn Rule<S>>) {
        let kind = rule.kind().filter(|k| !k.is_empty()).map(str::to_string);
        match kind {
            None => {
                for (key, bucket) in self.buckets.iter_mut() {
                    if !is_typed_end(key) {
                        bucket.push(Arc::clone(&rule));
                    }
                }
                self.wildcards.push(rule);
            }
            Some(kind) => {
                let wildcards = &self.wildcards;
                self.buckets
                    .entry(kind)
                    .or_insert_with_key(|key| {
                        if is_typed_end(key) {
                            Vec::new()
                        } else {
                            wildcards.clone()
                        }
                    })
                    .push(rule);
            }
        }
    }

    /// Rules for a bucket key. Unregistered node types fall back to the
    /// wildcards; unregistered `end-<type>` keys have no rules.
    pub fn lookup(&self, key: &str) -> &[Arc<dyn Rule<S>>] {
        match self.buckets.get(key) {
            Some(bucket) => bucket.as_slice(),
            None if is_typed_end(key) => &[],
            None => self.wildcards.as_slice(),
        }
    }

    pub fn wildcard_count(&self) -> usize {
        self.wildcards.len()
    }

    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }
}

impl<S> fmt::Debug for RuleRegistry<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys: Vec<_> = self.buckets.keys().collect();
        keys.sort();
        f.debug_struct("RuleRegistry")
            .field("buckets", &keys)
            .field("wildcards", &self.wildcards.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop(kind: Option<&str>, name: &str) -> Arc<dyn Rule<()>> {
        let rule = match kind {
            Some(kind) => FnRule::on(kind, |_, _| Ok(())),
            None => FnRule::any(|_, _| Ok(())),
        };
        rule.named(name).build()
    }

    fn names(rules: &[Arc<dyn Rule<()>>]) -> Vec<&str> {
        rules.iter().map(|r| r.name()).collect()
    }

    #[test]
    fn test_end_keys() {
        assert_eq!(end_key("class_declaration"), "end-class_declaration");
        assert!(is_typed_end("end-program"));
        assert!(!is_typed_end(END));
        assert!(!is_typed_end("endless"));
    }

    #[test]
    fn test_interleaved_wildcards() {
        let registry = RuleRegistry::build(vec![
            noop(None, "w1"),
            noop(Some("x"), "x"),
            noop(None, "w2"),
            noop(Some("y"), "y"),
            noop(Some(""), "w3"),
        ]);

        assert_eq!(names(registry.lookup("x")), vec!["w1", "x", "w2", "w3"]);
        assert_eq!(names(registry.lookup("y")), vec!["w1", "w2", "y", "w3"]);
        assert_eq!(names(registry.lookup("unseen")), vec!["w1", "w2", "w3"]);
        assert_eq!(registry.wildcard_count(), 3);
    }

    #[test]
    fn test_typed_end_buckets_skip_wildcards() {
        let registry = RuleRegistry::build(vec![
            noop(None, "w"),
            noop(Some("end-a"), "end-a"),
            noop(Some(END), "end"),
        ]);

        assert_eq!(names(registry.lookup("end-a")), vec!["end-a"]);
        assert_eq!(names(registry.lookup(END)), vec!["w", "end"]);
        assert!(registry.lookup("end-b").is_empty());
    }
}
