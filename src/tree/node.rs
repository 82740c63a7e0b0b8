//! Node types: the raw parse form and arena entries.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::TreeError;
use crate::types::Location;

/// Stable handle to a node inside a [`Tree`](super::Tree).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Leaf payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NodeValue {
    Bool(bool),
    Number(f64),
    Text(String),
}

impl NodeValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            NodeValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Convert a JSON scalar. `null` and containers have no leaf form.
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Bool(b) => Some(NodeValue::Bool(*b)),
            Value::Number(n) => n.as_f64().map(NodeValue::Number),
            Value::String(s) => Some(NodeValue::Text(s.clone())),
            _ => None,
        }
    }
}

impl fmt::Display for NodeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeValue::Bool(b) => write!(f, "{}", b),
            NodeValue::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => write!(f, "{}", *n as i64),
            NodeValue::Number(n) => write!(f, "{}", n),
            NodeValue::Text(s) => f.write_str(s),
        }
    }
}

/// Nested parse form: what the parse adapter produces and what
/// [`Tree::export`](super::Tree::export) gives back.
///
/// A node with an empty `type` is a transparent group whose children are
/// spliced into its parent on construction.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawNode {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<NodeValue>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub nodes: Vec<RawNode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
    #[serde(flatten)]
    pub attrs: Map<String, Value>,
}

/// Back-reference free export of a subtree.
pub type PlainNode = RawNode;

impl RawNode {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            ..Default::default()
        }
    }

    pub fn leaf(kind: impl Into<String>, value: NodeValue) -> Self {
        Self {
            kind: kind.into(),
            value: Some(value),
            ..Default::default()
        }
    }

    /// A transparent group of nodes.
    pub fn group(nodes: Vec<RawNode>) -> Self {
        Self {
            nodes,
            ..Default::default()
        }
    }

    pub fn with_child(mut self, child: RawNode) -> Self {
        self.nodes.push(child);
        self
    }

    pub fn with_attr(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.attrs.insert(key.to_string(), value.into());
        self
    }

    pub fn at(mut self, location: Location) -> Self {
        self.location = Some(location);
        self
    }

    pub fn is_group(&self) -> bool {
        self.kind.is_empty()
    }

    /// Build from a JSON attribute bag.
    ///
    /// Arrays nested in `nodes` become groups. Anything that is not an
    /// object where a node is expected is rejected.
    pub fn from_value(value: &Value) -> Result<Self, TreeError> {
        let object = value
            .as_object()
            .ok_or_else(|| TreeError::Malformed(format!("expected an object, found {}", json_kind(value))))?;

        let mut raw = RawNode::default();
        for (key, field) in object {
            match key.as_str() {
                "type" => {
                    raw.kind = field
                        .as_str()
                        .ok_or_else(|| TreeError::Malformed("`type` must be a string".to_string()))?
                        .to_string();
                }
                "value" => raw.value = NodeValue::from_json(field),
                "nodes" => raw.nodes = children_from_value(field)?,
                "location" => {
                    raw.location = serde_json::from_value(field.clone())
                        .map_err(|e| TreeError::Malformed(format!("bad location: {}", e)))?;
                }
                _ => {
                    raw.attrs.insert(key.clone(), field.clone());
                }
            }
        }
        Ok(raw)
    }
}

fn children_from_value(value: &Value) -> Result<Vec<RawNode>, TreeError> {
    let entries = value
        .as_array()
        .ok_or_else(|| TreeError::Malformed("`nodes` must be an array".to_string()))?;

    entries
        .iter()
        .map(|entry| match entry {
            Value::Array(_) => Ok(RawNode::group(children_from_value(entry)?)),
            _ => RawNode::from_value(entry),
        })
        .collect()
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// A node stored in the arena.
#[derive(Debug, Clone)]
pub struct Node {
    pub(crate) kind: String,
    pub(crate) value: Option<NodeValue>,
    pub(crate) nodes: Vec<NodeId>,
    pub(crate) parent: Option<NodeId>,
    pub(crate) prev: Option<NodeId>,
    pub(crate) next: Option<NodeId>,
    pub(crate) location: Option<Location>,
    pub(crate) attrs: Map<String, Value>,
    pub(crate) items: HashMap<String, Value>,
    pub(crate) removed: bool,
}

impl Node {
    pub(crate) fn new(raw_kind: String, value: Option<NodeValue>, location: Option<Location>, attrs: Map<String, Value>) -> Self {
        Self {
            kind: raw_kind,
            value,
            nodes: Vec::new(),
            parent: None,
            prev: None,
            next: None,
            location,
            attrs,
            items: HashMap::new(),
            removed: false,
        }
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn value(&self) -> Option<&NodeValue> {
        self.value.as_ref()
    }

    pub fn children(&self) -> &[NodeId] {
        &self.nodes
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn prev(&self) -> Option<NodeId> {
        self.prev
    }

    pub fn next(&self) -> Option<NodeId> {
        self.next
    }

    pub fn location(&self) -> Option<Location> {
        self.location
    }

    pub fn attrs(&self) -> &Map<String, Value> {
        &self.attrs
    }

    pub fn attr(&self, key: &str) -> Option<&Value> {
        self.attrs.get(key)
    }

    /// Whether `remove` was called on this node itself.
    pub fn is_removed(&self) -> bool {
        self.removed
    }

    /// A leaf carries a value and no children.
    pub fn is_leaf(&self) -> bool {
        self.value.is_some() && self.nodes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_from_value_groups_nested_arrays() {
        let raw = RawNode::from_value(&json!({
            "type": "program",
            "nodes": [
                {"type": "identifier", "value": "a"},
                [{"type": "number", "value": 1}, {"type": "number", "value": 2}]
            ],
            "exported": true
        }))
        .unwrap();

        assert_eq!(raw.kind, "program");
        assert_eq!(raw.nodes.len(), 2);
        assert!(raw.nodes[1].is_group());
        assert_eq!(raw.nodes[1].nodes[1].value, Some(NodeValue::Number(2.0)));
        assert_eq!(raw.attrs["exported"], json!(true));
    }

    #[test]
    fn test_from_value_rejects_non_objects() {
        assert!(matches!(RawNode::from_value(&json!("program")), Err(TreeError::Malformed(_))));
        assert!(matches!(
            RawNode::from_value(&json!({"type": "a", "nodes": [3]})),
            Err(TreeError::Malformed(_))
        ));
    }

    #[test]
    fn test_serialized_shape() {
        let raw = RawNode::new("call_expression")
            .with_child(RawNode::leaf("identifier", NodeValue::Text("f".to_string())))
            .with_attr("required", "./util");

        assert_eq!(
            serde_json::to_value(&raw).unwrap(),
            json!({
                "type": "call_expression",
                "nodes": [{"type": "identifier", "value": "f"}],
                "required": "./util"
            })
        );
    }

    #[test]
    fn test_value_display() {
        assert_eq!(NodeValue::Number(42.0).to_string(), "42");
        assert_eq!(NodeValue::Number(0.5).to_string(), "0.5");
        assert_eq!(NodeValue::Bool(false).to_string(), "false");
    }
}
