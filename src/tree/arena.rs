//! Arena-backed mutable tree.

use serde_json::Value;

use super::node::{Node, NodeId, NodeValue, RawNode};
use crate::error::TreeError;
use crate::types::Location;

/// What to insert: a fresh subtree or an existing node to move.
#[derive(Debug, Clone)]
pub enum Insert {
    Raw(RawNode),
    Node(NodeId),
}

impl From<RawNode> for Insert {
    fn from(raw: RawNode) -> Self {
        Insert::Raw(raw)
    }
}

impl From<NodeId> for Insert {
    fn from(id: NodeId) -> Self {
        Insert::Node(id)
    }
}

enum Position {
    Start,
    End,
    After(NodeId),
}

/// A mutable tree of nodes.
///
/// Every node ever created stays in the arena; removed nodes are only
/// unlinked, so handles never dangle. `prev`/`next` mirror the parent's
/// current child order after every mutation.
#[derive(Debug, Clone)]
pub struct Tree {
    nodes: Vec<Node>,
    root: NodeId,
}

impl Tree {
    /// A tree holding a single empty root.
    pub fn new(kind: &str) -> Self {
        Self::from_raw(RawNode::new(kind))
    }

    /// Construct from the raw parse form, splicing groups.
    pub fn from_raw(raw: RawNode) -> Self {
        let mut tree = Self {
            nodes: Vec::new(),
            root: NodeId(0),
        };
        tree.root = tree.alloc(raw, None);
        tree
    }

    /// Construct from a JSON attribute bag.
    pub fn from_value(value: &Value) -> Result<Self, TreeError> {
        Ok(Self::from_raw(RawNode::from_value(value)?))
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Borrow a node. Handles are only ever issued by this tree.
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0)
    }

    pub fn kind(&self, id: NodeId) -> &str {
        &self.node(id).kind
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.node(id).nodes
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).parent
    }

    /// Number of nodes ever allocated.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    fn alloc(&mut self, raw: RawNode, parent: Option<NodeId>) -> NodeId {
        let id = NodeId(self.nodes.len());
        let RawNode {
            kind,
            value,
            nodes,
            location,
            attrs,
        } = raw;

        let mut node = Node::new(kind, value, location, attrs);
        node.parent = parent;
        self.nodes.push(node);

        let children: Vec<NodeId> = splice_groups(nodes)
            .into_iter()
            .map(|child| self.alloc(child, Some(id)))
            .collect();
        let count = children.len();
        self.nodes[id.0].nodes = children;
        for index in 0..count {
            self.fix_one(id, index);
        }
        id
    }

    /// Position among the parent's children; 0 for the root or a detached node.
    pub fn index(&self, id: NodeId) -> usize {
        self.node(id)
            .parent
            .and_then(|parent| self.children(parent).iter().position(|&child| child == id))
            .unwrap_or(0)
    }

    /// Recompute sibling links around `index` in `parent`'s children.
    pub fn fix(&mut self, parent: NodeId, index: usize) {
        let len = self.children(parent).len();
        for i in index.saturating_sub(1)..=index + 1 {
            if i < len {
                self.fix_one(parent, i);
            }
        }
    }

    fn fix_one(&mut self, parent: NodeId, index: usize) {
        let siblings = &self.nodes[parent.0].nodes;
        let id = siblings[index];
        let prev = index.checked_sub(1).map(|i| siblings[i]);
        let next = siblings.get(index + 1).copied();

        let node = &mut self.nodes[id.0];
        node.prev = prev;
        node.next = next;
    }

    pub fn append(&mut self, parent: NodeId, insert: impl Into<Insert>) -> Result<NodeId, TreeError> {
        self.attach(parent, Position::End, insert.into())
    }

    pub fn prepend(&mut self, parent: NodeId, insert: impl Into<Insert>) -> Result<NodeId, TreeError> {
        self.attach(parent, Position::Start, insert.into())
    }

    /// Insert immediately after `sibling`.
    pub fn after(&mut self, sibling: NodeId, insert: impl Into<Insert>) -> Result<NodeId, TreeError> {
        let parent = self.node(sibling).parent.ok_or(TreeError::Detached(sibling))?;
        self.attach(parent, Position::After(sibling), insert.into())
    }

    /// Insert immediately before `sibling`.
    pub fn before(&mut self, sibling: NodeId, insert: impl Into<Insert>) -> Result<NodeId, TreeError> {
        let node = self.node(sibling);
        match (node.prev, node.parent) {
            (Some(prev), _) => self.after(prev, insert),
            (None, Some(parent)) => self.prepend(parent, insert),
            (None, None) => Err(TreeError::Detached(sibling)),
        }
    }

    fn attach(&mut self, parent: NodeId, position: Position, insert: Insert) -> Result<NodeId, TreeError> {
        let id = match insert {
            Insert::Raw(raw) => {
                if raw.is_group() {
                    return Err(TreeError::Malformed("a group cannot be inserted as a node".to_string()));
                }
                self.alloc(raw, Some(parent))
            }
            Insert::Node(id) => {
                if id == self.root {
                    return Err(TreeError::RootMove);
                }
                if id == parent || self.ancestors(parent).any(|a| a == id) {
                    return Err(TreeError::Cycle { node: id, parent });
                }
                if matches!(position, Position::After(sibling) if sibling == id) {
                    return Ok(id);
                }
                self.detach(id);
                let node = &mut self.nodes[id.0];
                node.removed = false;
                node.parent = Some(parent);
                id
            }
        };

        let index = match position {
            Position::Start => 0,
            Position::End => self.children(parent).len(),
            Position::After(sibling) => self.index(sibling) + 1,
        };
        self.nodes[parent.0].nodes.insert(index, id);
        self.fix(parent, index);
        Ok(id)
    }

    fn detach(&mut self, id: NodeId) {
        let Some(parent) = self.nodes[id.0].parent else {
            return;
        };
        let index = self.index(id);
        self.nodes[parent.0].nodes.remove(index);

        let node = &mut self.nodes[id.0];
        node.parent = None;
        node.prev = None;
        node.next = None;

        self.fix(parent, index);
    }

    /// Unlink a node and mark it removed. The root is left in place.
    pub fn remove(&mut self, id: NodeId) -> Result<(), TreeError> {
        if id == self.root {
            return Ok(());
        }
        if self.node(id).parent.is_none() {
            return Err(TreeError::Detached(id));
        }
        self.detach(id);
        self.nodes[id.0].removed = true;
        Ok(())
    }

    /// Whether the node is still reachable from the root.
    pub fn is_live(&self, id: NodeId) -> bool {
        let mut current = id;
        loop {
            let node = self.node(current);
            if node.removed {
                return false;
            }
            match node.parent {
                Some(parent) => current = parent,
                None => return current == self.root,
            }
        }
    }

    /// Strict ancestors, nearest first.
    pub fn ancestors(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::successors(self.node(id).parent, move |&current| self.node(current).parent)
    }

    /// Pre-order list of the subtree rooted at `id`.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            out.push(current);
            stack.extend(self.children(current).iter().rev());
        }
        out
    }

    /// First child of the given type.
    pub fn child_of_kind(&self, id: NodeId, kind: &str) -> Option<NodeId> {
        self.children(id).iter().copied().find(|&child| self.kind(child) == kind)
    }

    /// Scoped lookup: the nearest value set on this node or an ancestor.
    pub fn item(&self, id: NodeId, key: &str) -> Option<&Value> {
        std::iter::once(id)
            .chain(self.ancestors(id))
            .find_map(|current| self.node(current).items.get(key))
    }

    /// Set a scoped item on this node only.
    pub fn set_item(&mut self, id: NodeId, key: &str, value: impl Into<Value>) {
        self.nodes[id.0].items.insert(key.to_string(), value.into());
    }

    pub fn attr(&self, id: NodeId, key: &str) -> Option<&Value> {
        self.node(id).attrs.get(key)
    }

    pub fn set_attr(&mut self, id: NodeId, key: &str, value: impl Into<Value>) {
        self.nodes[id.0].attrs.insert(key.to_string(), value.into());
    }

    pub fn remove_attr(&mut self, id: NodeId, key: &str) -> Option<Value> {
        self.nodes[id.0].attrs.remove(key)
    }

    pub fn value(&self, id: NodeId) -> Option<&NodeValue> {
        self.node(id).value.as_ref()
    }

    pub fn set_value(&mut self, id: NodeId, value: Option<NodeValue>) {
        self.nodes[id.0].value = value;
    }

    /// Text payload of a leaf.
    pub fn text(&self, id: NodeId) -> Option<&str> {
        self.value(id).and_then(NodeValue::as_str)
    }

    /// Location of the node, or of its nearest located ancestor.
    pub fn location_of(&self, id: NodeId) -> Option<Location> {
        std::iter::once(id)
            .chain(self.ancestors(id))
            .find_map(|current| self.node(current).location)
    }

    /// Plain copy of a subtree without back-references or scoped items.
    pub fn export(&self, id: NodeId) -> RawNode {
        let node = self.node(id);
        RawNode {
            kind: node.kind.clone(),
            value: node.value.clone(),
            nodes: node.nodes.iter().map(|&child| self.export(child)).collect(),
            location: node.location,
            attrs: node.attrs.clone(),
        }
    }
}

fn splice_groups(nodes: Vec<RawNode>) -> Vec<RawNode> {
    let mut out = Vec::with_capacity(nodes.len());
    for node in nodes {
        if node.is_group() {
            out.extend(splice_groups(node.nodes));
        } else {
            out.push(node);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn leaf(name: &str) -> RawNode {
        RawNode::leaf("identifier", NodeValue::Text(name.to_string()))
    }

    fn sample() -> Tree {
        Tree::from_raw(
            RawNode::new("root")
                .with_child(RawNode::new("A").with_child(leaf("a1")).with_child(leaf("a2")))
                .with_child(RawNode::new("B")),
        )
    }

    /// Every live node's links mirror its parent's child order.
    fn assert_siblings_consistent(tree: &Tree) {
        for id in tree.descendants(tree.root()) {
            let children = tree.children(id);
            for (i, &child) in children.iter().enumerate() {
                let node = tree.node(child);
                assert_eq!(node.parent(), Some(id), "parent of {}", child);
                assert_eq!(node.prev(), i.checked_sub(1).map(|p| children[p]), "prev of {}", child);
                assert_eq!(node.next(), children.get(i + 1).copied(), "next of {}", child);
                assert_eq!(tree.index(child), i);
            }
        }
    }

    fn names(tree: &Tree, id: NodeId) -> Vec<String> {
        tree.children(id)
            .iter()
            .map(|&c| tree.text(c).map_or_else(|| tree.kind(c).to_string(), String::from))
            .collect()
    }

    #[test]
    fn test_construct_links_siblings() {
        let tree = sample();
        let root = tree.root();
        assert_eq!(names(&tree, root), vec!["A", "B"]);
        assert_eq!(tree.index(root), 0);
        assert_siblings_consistent(&tree);
    }

    #[test]
    fn test_construct_splices_groups() {
        let tree = Tree::from_value(&json!({
            "type": "root",
            "nodes": [[{"type": "x", "value": 1}, {"type": "", "nodes": [{"type": "y", "value": 2}]}]]
        }))
        .unwrap();

        let kinds: Vec<_> = tree.children(tree.root()).iter().map(|&c| tree.kind(c)).collect();
        assert_eq!(kinds, vec!["x", "y"]);
        assert_siblings_consistent(&tree);
    }

    #[test]
    fn test_mutations_keep_sibling_invariant() {
        let mut tree = sample();
        let root = tree.root();
        let a = tree.children(root)[0];
        let a1 = tree.children(a)[0];
        let a2 = tree.children(a)[1];

        tree.append(a, leaf("a3")).unwrap();
        tree.prepend(a, leaf("a0")).unwrap();
        tree.after(a1, leaf("a1b")).unwrap();
        tree.before(a1, leaf("a1a")).unwrap();
        assert_eq!(names(&tree, a), vec!["a0", "a1a", "a1", "a1b", "a2", "a3"]);
        assert_siblings_consistent(&tree);

        tree.remove(a1).unwrap();
        tree.remove(a2).unwrap();
        assert_eq!(names(&tree, a), vec!["a0", "a1a", "a1b", "a3"]);
        assert_siblings_consistent(&tree);
        assert!(!tree.is_live(a1));
        assert_eq!(tree.index(a1), 0);

        // Move a subtree under another parent
        let b = tree.children(root)[1];
        tree.append(b, a).unwrap();
        assert_eq!(names(&tree, root), vec!["B"]);
        assert_eq!(tree.parent(a), Some(b));
        assert_siblings_consistent(&tree);
    }

    #[test]
    fn test_before_first_child_prepends() {
        let mut tree = sample();
        let a = tree.children(tree.root())[0];
        let a1 = tree.children(a)[0];

        tree.before(a1, leaf("first")).unwrap();
        assert_eq!(names(&tree, a), vec!["first", "a1", "a2"]);
        assert_siblings_consistent(&tree);
    }

    #[test]
    fn test_remove_root_and_detached() {
        let mut tree = sample();
        let root = tree.root();
        let b = tree.children(root)[1];

        assert_eq!(tree.remove(root), Ok(()));
        assert!(tree.is_live(root));

        tree.remove(b).unwrap();
        assert_eq!(tree.remove(b), Err(TreeError::Detached(b)));
        assert_eq!(tree.after(b, leaf("x")), Err(TreeError::Detached(b)));
    }

    #[test]
    fn test_removed_ancestor_hides_descendants() {
        let mut tree = sample();
        let a = tree.children(tree.root())[0];
        let a1 = tree.children(a)[0];

        tree.remove(a).unwrap();
        assert!(!tree.is_live(a1));
        assert!(tree.node(a1).parent().is_some());
    }

    #[test]
    fn test_move_rejects_cycles() {
        let mut tree = sample();
        let root = tree.root();
        let a = tree.children(root)[0];
        let a1 = tree.children(a)[0];

        assert_eq!(tree.append(a1, a), Err(TreeError::Cycle { node: a, parent: a1 }));
        assert_eq!(tree.append(a, root), Err(TreeError::RootMove));
        assert_siblings_consistent(&tree);
    }

    #[test]
    fn test_scoped_items_shadow_per_subtree() {
        let mut tree = sample();
        let root = tree.root();
        let a = tree.children(root)[0];
        let b = tree.children(root)[1];
        let a1 = tree.children(a)[0];

        tree.set_item(root, "module", "outer");
        tree.set_item(a, "module", "inner");

        assert_eq!(tree.item(a1, "module"), Some(&json!("inner")));
        assert_eq!(tree.item(a, "module"), Some(&json!("inner")));
        assert_eq!(tree.item(b, "module"), Some(&json!("outer")));
        assert_eq!(tree.item(root, "module"), Some(&json!("outer")));
        assert_eq!(tree.item(b, "missing"), None);
    }

    #[test]
    fn test_export_strips_scoped_items() {
        let mut tree = sample();
        let root = tree.root();
        tree.set_item(root, "file", "a.js");
        tree.set_attr(root, "path", "a.js");

        let plain = tree.export(root);
        assert_eq!(plain.attrs["path"], json!("a.js"));
        assert_eq!(plain.nodes[0].nodes[1].value, Some(NodeValue::Text("a2".to_string())));
        assert!(!serde_json::to_string(&plain).unwrap().contains("file"));
    }
}
