//! Multi-parent item graph built during the report pass.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::GraphError;

/// Key of the implicit top-level group.
pub const ROOT_GROUP: &str = "root";

/// Type given to items that do not declare one.
pub const DEFAULT_ITEM_TYPE: &str = "item";

/// Type of group-like items.
pub const GROUP_TYPE: &str = "group";

fn is_false(b: &bool) -> bool {
    !*b
}

/// A named entity in the report.
///
/// `items` and `itemTypeCounts` are maintained by [`ReportGraph`]; values
/// set on an item passed to `add` are ignored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    pub key: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub name: String,
    #[serde(default)]
    pub groups: Vec<String>,
    #[serde(default)]
    pub items: Vec<String>,
    #[serde(default)]
    pub item_type_counts: BTreeMap<String, usize>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub home: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub home_path: bool,
    #[serde(flatten)]
    pub attrs: Map<String, Value>,
    #[serde(skip)]
    placeholder: bool,
}

impl Item {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            ..Default::default()
        }
    }

    pub fn with_type(mut self, kind: &str) -> Self {
        self.kind = kind.to_string();
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.groups.push(group.into());
        self
    }

    pub fn with_attr(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.attrs.insert(key.to_string(), value.into());
        self
    }

    pub fn as_home(mut self) -> Self {
        self.home = true;
        self
    }

    pub fn attr(&self, key: &str) -> Option<&Value> {
        self.attrs.get(key)
    }

    /// Whether this entry was created implicitly as someone's parent.
    pub fn is_placeholder(&self) -> bool {
        self.placeholder
    }

    fn placeholder(key: &str) -> Self {
        Self {
            key: key.to_string(),
            kind: GROUP_TYPE.to_string(),
            name: key.to_string(),
            placeholder: true,
            ..Default::default()
        }
    }
}

/// The finished report: `{items: {<key>: Item}, home?: <key>}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub items: BTreeMap<String, Item>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub home: Option<String>,
}

/// Item graph with bidirectional group/child bookkeeping.
///
/// After every `add`, `replace`, `attach` and `remove` returns, each item's
/// key appears in the `items` of every group it lists, and each group's
/// `itemTypeCounts` matches its children exactly.
#[derive(Debug, Clone)]
pub struct ReportGraph {
    items: BTreeMap<String, Item>,
    home: Option<String>,
}

impl Default for ReportGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl ReportGraph {
    pub fn new() -> Self {
        let mut items = BTreeMap::new();
        let root = Item::new(ROOT_GROUP).with_type(GROUP_TYPE).with_name(ROOT_GROUP);
        items.insert(ROOT_GROUP.to_string(), root);
        Self { items, home: None }
    }

    pub fn item(&self, key: &str) -> Option<&Item> {
        self.items.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.items.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn items(&self) -> impl Iterator<Item = &Item> {
        self.items.values()
    }

    /// Add a new item. An existing placeholder with the same key is promoted
    /// and keeps its children.
    pub fn add(&mut self, item: Item) -> Result<(), GraphError> {
        let item = self.prepare(item)?;
        if self.items.get(&item.key).map_or(false, |existing| !existing.placeholder) {
            return Err(GraphError::DuplicateKey(item.key));
        }
        self.link(item);
        Ok(())
    }

    /// Upsert: any existing item with the same key is unlinked from all its
    /// groups and replaced. Only the graph-maintained children carry over.
    pub fn replace(&mut self, item: Item) -> Result<(), GraphError> {
        let item = self.prepare(item)?;
        if let Some(old) = self.unlink(&item.key) {
            let mut carried = Item::placeholder(&old.key);
            carried.items = old.items;
            carried.item_type_counts = old.item_type_counts;
            self.items.insert(carried.key.clone(), carried);
            if old.home {
                self.home = None;
            }
        }
        self.link(item);
        Ok(())
    }

    /// Add `group` as an additional parent of an existing item.
    pub fn attach(&mut self, key: &str, group: &str) -> Result<(), GraphError> {
        if key == group {
            return Err(GraphError::SelfGroup(key.to_string()));
        }
        let item = self
            .items
            .get_mut(key)
            .ok_or_else(|| GraphError::UnknownKey(key.to_string()))?;
        if item.groups.iter().any(|g| g == group) {
            return Ok(());
        }
        item.groups.push(group.to_string());
        let kind = item.kind.clone();
        self.link_into(group, key, &kind);
        Ok(())
    }

    /// Remove an item without children.
    pub fn remove(&mut self, key: &str) -> Result<Item, GraphError> {
        let item = self
            .items
            .get(key)
            .ok_or_else(|| GraphError::UnknownKey(key.to_string()))?;
        if !item.items.is_empty() {
            return Err(GraphError::NonEmptyGroup {
                key: key.to_string(),
                count: item.items.len(),
            });
        }

        let removed = self
            .unlink(key)
            .ok_or_else(|| GraphError::UnknownKey(key.to_string()))?;
        if removed.home {
            self.home = None;
        }
        Ok(removed)
    }

    pub fn home(&self) -> Option<&str> {
        self.home.as_deref()
    }

    /// Designate the home item, clearing any previous one.
    pub fn set_home(&mut self, key: &str) -> Result<(), GraphError> {
        if !self.items.contains_key(key) {
            return Err(GraphError::UnknownKey(key.to_string()));
        }
        self.clear_home();
        if let Some(item) = self.items.get_mut(key) {
            item.home = true;
        }
        self.home = Some(key.to_string());
        Ok(())
    }

    /// Mark every item on the way up from home through its groups.
    ///
    /// Groups may form cycles, so visited keys are tracked.
    pub fn finalize(&mut self) {
        for item in self.items.values_mut() {
            item.home_path = false;
        }
        let Some(home) = self.home.clone() else {
            return;
        };

        let mut seen = HashSet::new();
        let mut stack = vec![home];
        while let Some(key) = stack.pop() {
            if !seen.insert(key.clone()) {
                continue;
            }
            if let Some(item) = self.items.get_mut(&key) {
                item.home_path = true;
                stack.extend(item.groups.iter().cloned());
            }
        }
    }

    /// Check the group/child invariants, returning every violation found.
    pub fn verify(&self) -> Vec<String> {
        verify_items(&self.items)
    }

    pub fn report(&self) -> Report {
        Report {
            items: self.items.clone(),
            home: self.home.clone(),
        }
    }

    pub fn into_report(self) -> Report {
        Report {
            items: self.items,
            home: self.home,
        }
    }

    fn prepare(&self, mut item: Item) -> Result<Item, GraphError> {
        if item.key.is_empty() {
            return Err(GraphError::EmptyKey);
        }
        if item.kind.is_empty() {
            item.kind = DEFAULT_ITEM_TYPE.to_string();
        }
        if item.name.is_empty() {
            item.name = item.key.clone();
        }

        let mut seen = HashSet::new();
        item.groups.retain(|g| seen.insert(g.clone()));
        if item.groups.iter().any(|g| *g == item.key) {
            return Err(GraphError::SelfGroup(item.key));
        }
        if item.kind == GROUP_TYPE && item.groups.is_empty() && item.key != ROOT_GROUP {
            item.groups.push(ROOT_GROUP.to_string());
        }

        item.items.clear();
        item.item_type_counts.clear();
        item.home_path = false;
        item.placeholder = false;
        Ok(item)
    }

    fn link(&mut self, mut item: Item) {
        if let Some(existing) = self.items.remove(&item.key) {
            item.items = existing.items;
            item.item_type_counts = existing.item_type_counts;
        }
        for group in &item.groups {
            self.link_into(group, &item.key, &item.kind);
        }
        if item.home {
            self.clear_home();
            self.home = Some(item.key.clone());
        }
        self.items.insert(item.key.clone(), item);
    }

    /// Append a child to `group`, creating a placeholder group if needed.
    fn link_into(&mut self, group: &str, key: &str, kind: &str) {
        let parent = self
            .items
            .entry(group.to_string())
            .or_insert_with(|| Item::placeholder(group));
        link_child(parent, key, kind);
    }

    /// Detach an item from all its groups and delete it.
    fn unlink(&mut self, key: &str) -> Option<Item> {
        let item = self.items.remove(key)?;
        for group in &item.groups {
            if let Some(parent) = self.items.get_mut(group) {
                unlink_child(parent, key, &item.kind);
            }
        }
        Some(item)
    }

    fn clear_home(&mut self) {
        if let Some(previous) = self.home.take() {
            if let Some(item) = self.items.get_mut(&previous) {
                item.home = false;
            }
        }
    }
}

/// Drop `key` from a parent's children and decrement its type counter.
pub(crate) fn unlink_child(parent: &mut Item, key: &str, kind: &str) {
    let before = parent.items.len();
    parent.items.retain(|k| k != key);
    if parent.items.len() == before {
        return;
    }
    if let Some(count) = parent.item_type_counts.get_mut(kind) {
        *count = count.saturating_sub(1);
        if *count == 0 {
            parent.item_type_counts.remove(kind);
        }
    }
}

/// Add `key` to a parent's children and increment its type counter.
pub(crate) fn link_child(parent: &mut Item, key: &str, kind: &str) {
    parent.items.push(key.to_string());
    *parent.item_type_counts.entry(kind.to_string()).or_insert(0) += 1;
}

pub(crate) fn verify_items(items: &BTreeMap<String, Item>) -> Vec<String> {
    let mut problems = Vec::new();

    for item in items.values() {
        for group in &item.groups {
            match items.get(group) {
                None => problems.push(format!("{}: group `{}` does not exist", item.key, group)),
                Some(parent) if !parent.items.contains(&item.key) => {
                    problems.push(format!("{}: missing from `{}` items", item.key, group))
                }
                Some(_) => {}
            }
        }

        let mut counts: BTreeMap<String, usize> = BTreeMap::new();
        for child in &item.items {
            match items.get(child) {
                Some(c) if c.groups.contains(&item.key) => *counts.entry(c.kind.clone()).or_insert(0) += 1,
                Some(_) => problems.push(format!("{}: child `{}` does not list it as group", item.key, child)),
                None => problems.push(format!("{}: child `{}` does not exist", item.key, child)),
            }
        }
        if counts != item.item_type_counts {
            problems.push(format!(
                "{}: itemTypeCounts {:?} but children give {:?}",
                item.key, item.item_type_counts, counts
            ));
        }
    }
    problems
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn graph() -> ReportGraph {
        let mut graph = ReportGraph::new();
        graph.add(Item::new("lib/a.js").with_type("module").with_group(ROOT_GROUP)).unwrap();
        graph
            .add(Item::new("lib/a.js#f").with_type("function").with_group("lib/a.js"))
            .unwrap();
        graph
            .add(Item::new("lib/a.js#X").with_type("class").with_group("lib/a.js"))
            .unwrap();
        graph
    }

    #[test]
    fn test_add_links_both_directions() {
        let graph = graph();
        let module = graph.item("lib/a.js").unwrap();

        assert_eq!(module.items, vec!["lib/a.js#f", "lib/a.js#X"]);
        assert_eq!(module.item_type_counts.get("function"), Some(&1));
        assert_eq!(module.item_type_counts.get("class"), Some(&1));
        assert_eq!(graph.item(ROOT_GROUP).unwrap().items, vec!["lib/a.js"]);
        assert!(graph.verify().is_empty());
    }

    #[test]
    fn test_add_defaults() {
        let mut graph = ReportGraph::new();
        graph.add(Item::new("thing")).unwrap();
        graph.add(Item::new("section").with_type(GROUP_TYPE)).unwrap();

        let thing = graph.item("thing").unwrap();
        assert_eq!(thing.kind, DEFAULT_ITEM_TYPE);
        assert_eq!(thing.name, "thing");
        assert!(thing.groups.is_empty());
        assert_eq!(graph.item("section").unwrap().groups, vec![ROOT_GROUP]);
    }

    #[test]
    fn test_add_rejects_bad_keys() {
        let mut graph = graph();
        assert_eq!(graph.add(Item::new("")), Err(GraphError::EmptyKey));
        assert_eq!(
            graph.add(Item::new("lib/a.js#f")),
            Err(GraphError::DuplicateKey("lib/a.js#f".to_string()))
        );
        assert_eq!(
            graph.add(Item::new("loop").with_group("loop")),
            Err(GraphError::SelfGroup("loop".to_string()))
        );
    }

    #[test]
    fn test_placeholder_groups_are_promoted() {
        let mut graph = ReportGraph::new();
        graph.add(Item::new("m#a").with_type("function").with_group("m")).unwrap();
        assert!(graph.item("m").unwrap().is_placeholder());

        graph.add(Item::new("m").with_type("module").with_group(ROOT_GROUP)).unwrap();
        let module = graph.item("m").unwrap();
        assert!(!module.is_placeholder());
        assert_eq!(module.items, vec!["m#a"]);
        assert!(graph.verify().is_empty());
    }

    #[test]
    fn test_replace_drops_prior_attributes() {
        let mut graph = graph();
        graph
            .replace(
                Item::new("lib/a.js#f")
                    .with_type("function")
                    .with_group("lib/a.js")
                    .with_attr("doc", "Adds."),
            )
            .unwrap();
        graph
            .replace(Item::new("lib/a.js#f").with_type("variable").with_group(ROOT_GROUP))
            .unwrap();

        let f = graph.item("lib/a.js#f").unwrap();
        assert_eq!(f.kind, "variable");
        assert!(f.attr("doc").is_none());
        assert_eq!(f.groups, vec![ROOT_GROUP]);

        let module = graph.item("lib/a.js").unwrap();
        assert_eq!(module.items, vec!["lib/a.js#X"]);
        assert_eq!(module.item_type_counts.get("function"), None);
        assert!(graph.verify().is_empty());
    }

    #[test]
    fn test_replace_keeps_children_consistent() {
        let mut graph = graph();
        graph
            .replace(Item::new("lib/a.js").with_type("module").with_name("a"))
            .unwrap();

        let module = graph.item("lib/a.js").unwrap();
        assert_eq!(module.name, "a");
        assert_eq!(module.items.len(), 2);
        assert!(graph.item(ROOT_GROUP).unwrap().items.is_empty());
        assert!(graph.verify().is_empty());
    }

    #[test]
    fn test_remove_failures_leave_graph_unchanged() {
        let mut graph = graph();
        let before = graph.report();

        assert_eq!(graph.remove("nope"), Err(GraphError::UnknownKey("nope".to_string())));
        assert_eq!(
            graph.remove("lib/a.js"),
            Err(GraphError::NonEmptyGroup {
                key: "lib/a.js".to_string(),
                count: 2
            })
        );
        assert_eq!(graph.report(), before);
    }

    #[test]
    fn test_remove_unlinks_from_all_groups() {
        let mut graph = graph();
        graph.add(Item::new("other").with_type(GROUP_TYPE)).unwrap();
        graph.attach("lib/a.js#f", "other").unwrap();

        graph.remove("lib/a.js#f").unwrap();

        assert_eq!(graph.item("lib/a.js").unwrap().items, vec!["lib/a.js#X"]);
        assert!(graph.item("other").unwrap().items.is_empty());
        assert!(graph.item("other").unwrap().item_type_counts.is_empty());
        assert!(graph.verify().is_empty());
    }

    #[test]
    fn test_home_is_exclusive() {
        let mut graph = graph();
        graph.add(Item::new("h1").as_home()).unwrap();
        graph.add(Item::new("h2").as_home()).unwrap();

        assert_eq!(graph.home(), Some("h2"));
        assert!(!graph.item("h1").unwrap().home);

        graph.set_home("lib/a.js").unwrap();
        assert!(!graph.item("h2").unwrap().home);
        assert_eq!(graph.set_home("missing"), Err(GraphError::UnknownKey("missing".to_string())));
    }

    #[test]
    fn test_finalize_terminates_on_cycles() {
        let mut graph = graph();
        graph.add(Item::new("b").with_type("module").with_group("lib/a.js#f")).unwrap();
        graph.attach("lib/a.js", "b").unwrap();
        graph.set_home("lib/a.js#X").unwrap();

        graph.finalize();

        let on_path: Vec<_> = graph.items().filter(|i| i.home_path).map(|i| i.key.as_str()).collect();
        assert_eq!(on_path, vec!["b", "lib/a.js", "lib/a.js#X", "lib/a.js#f", "root"]);
        assert!(graph.verify().is_empty());
    }

    #[test]
    fn test_report_json_shape() {
        let mut graph = ReportGraph::new();
        graph
            .add(Item::new("m").with_type("module").with_group(ROOT_GROUP).with_attr("path", "m.js").as_home())
            .unwrap();
        graph.finalize();

        let value = serde_json::to_value(graph.into_report()).unwrap();
        assert_eq!(
            value["items"]["m"],
            json!({
                "key": "m",
                "type": "module",
                "name": "m",
                "groups": ["root"],
                "items": [],
                "itemTypeCounts": {},
                "home": true,
                "homePath": true,
                "path": "m.js"
            })
        );
        assert_eq!(value["home"], json!("m"));
        assert_eq!(value["items"]["root"]["itemTypeCounts"], json!({"module": 1}));
    }
}
