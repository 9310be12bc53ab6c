//! Lenient decoding of JSON into [`DocumentNode`]s.
//!
//! Model output is loosely shaped: types come in any spelling, `children` may
//! be missing or null, `text` may be a number. Decoding never rejects a node
//! for those reasons; it normalises instead. The same path decodes canonical
//! JSON produced by [`crate::tree::export_tree_as_json`], which is what makes
//! the export/parse round trip exact.
//!
//! Tree depth is unbounded. [`parse_json_value`] lifts serde_json's recursion
//! limit and grows the stack while parsing, and [`node_from_value`] consumes
//! the `Value` with an explicit stack so nothing deep is ever dropped or
//! walked recursively. Attribute values are the exception: they are kept as
//! `Value` and must nest no deeper than [`MAX_ATTRIBUTE_DEPTH`].

use super::node::{Attributes, DocumentNode, NodeType};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::HashSet;
use thiserror::Error;

/// Deepest attribute value kept on decode; deeper ones are dropped.
pub const MAX_ATTRIBUTE_DEPTH: usize = 64;

/// Failure to decode a tree from JSON text.
#[derive(Debug, Error)]
pub enum TreeJsonError {
    /// The text is not valid JSON.
    #[error("invalid tree JSON: {0}")]
    Syntax(#[from] serde_json::Error),

    /// Valid JSON, but the top-level value is not an object.
    #[error("tree JSON must be an object, got {found}")]
    NotAnObject { found: &'static str },
}

/// Parse a tree from JSON text (the inverse of `export_tree_as_json`).
///
/// Nodes are normalised and ids made unique, but the top node is kept as-is:
/// no synthetic root is added. Canonical input comes back unchanged.
pub fn parse_tree_json(json: &str) -> Result<DocumentNode, TreeJsonError> {
    let value = parse_json_value(json)?;
    let found = value_kind(&value);
    let mut root = node_from_value(value).ok_or(TreeJsonError::NotAnObject { found })?;
    assign_unique_ids(&mut root);
    Ok(root)
}

/// Parse JSON text of any nesting depth.
pub fn parse_json_value(json: &str) -> Result<Value, serde_json::Error> {
    let mut de = serde_json::Deserializer::from_str(json);
    de.disable_recursion_limit();
    let value = Value::deserialize(serde_stacker::Deserializer::new(&mut de))?;
    de.end()?;
    Ok(value)
}

/// A node whose children are still undecoded.
struct Pending {
    node: DocumentNode,
    children: std::vec::IntoIter<Value>,
}

/// Decode one JSON object (and its subtree) into a node.
///
/// Returns `None` only when `value` is not an object. Ids are taken verbatim
/// (missing → empty); uniqueness is a tree-level concern handled by
/// [`assign_unique_ids`].
pub fn node_from_value(value: Value) -> Option<DocumentNode> {
    let map = match value {
        Value::Object(map) => map,
        other => {
            discard(other);
            return None;
        }
    };

    let mut stack = vec![shallow_node(map)];
    while let Some(top) = stack.last_mut() {
        match top.children.next() {
            Some(Value::Object(map)) => stack.push(shallow_node(map)),
            // Children may be bare strings in sloppy output; those become `other` nodes.
            Some(Value::String(s)) => top
                .node
                .children
                .push(DocumentNode::new("", NodeType::Other).with_text(s)),
            Some(other) => discard(other),
            None => {
                let done = stack.pop()?;
                match stack.last_mut() {
                    Some(parent) => parent.node.children.push(done.node),
                    None => return Some(done.node),
                }
            }
        }
    }
    None
}

/// Decode the node's own fields; its children are returned undecoded.
fn shallow_node(mut obj: Map<String, Value>) -> Pending {
    let children = match obj.remove("children") {
        Some(Value::Array(items)) => items,
        Some(other) => {
            discard(other);
            Vec::new()
        }
        None => Vec::new(),
    };

    let attributes: Attributes = match obj.remove("attributes") {
        Some(Value::Object(map)) => map
            .into_iter()
            .filter_map(|(k, v)| {
                if value_depth(&v) <= MAX_ATTRIBUTE_DEPTH {
                    Some((k, v))
                } else {
                    discard(v);
                    None
                }
            })
            .collect(),
        Some(other) => {
            discard(other);
            Attributes::new()
        }
        None => Attributes::new(),
    };

    let node_type = obj
        .get("type")
        .and_then(Value::as_str)
        .map(NodeType::from_label)
        .unwrap_or(NodeType::Other);

    let id = obj.get("id").map(scalar_to_string).unwrap_or_default();

    let text = obj
        .get("text")
        .filter(|v| !v.is_null())
        .or_else(|| obj.get("content"))
        .map(scalar_to_string)
        .unwrap_or_default();

    let level = obj.get("level").and_then(level_from_value);

    discard(Value::Object(obj));

    Pending {
        node: DocumentNode {
            id,
            node_type,
            text,
            level,
            children: Vec::new(),
            attributes,
        },
        children: children.into_iter(),
    }
}

/// Drop a value without recursing into it.
pub(crate) fn discard(value: Value) {
    let mut stack = vec![value];
    while let Some(v) = stack.pop() {
        match v {
            Value::Array(items) => stack.extend(items),
            Value::Object(map) => stack.extend(map.into_iter().map(|(_, v)| v)),
            _ => {}
        }
    }
}

/// Nesting depth of a value; a scalar is 1.
fn value_depth(value: &Value) -> usize {
    let mut deepest = 0;
    let mut stack = vec![(value, 1usize)];
    while let Some((v, depth)) = stack.pop() {
        deepest = deepest.max(depth);
        match v {
            Value::Array(items) => stack.extend(items.iter().map(|c| (c, depth + 1))),
            Value::Object(map) => stack.extend(map.values().map(|c| (c, depth + 1))),
            _ => {}
        }
    }
    deepest
}

/// Scalars as text; arrays flatten to their non-empty parts, one per line.
fn scalar_to_string(value: &Value) -> String {
    let mut parts: Vec<String> = Vec::new();
    let mut stack = vec![value];
    while let Some(v) = stack.pop() {
        match v {
            Value::Null | Value::Object(_) => {}
            Value::String(s) if s.is_empty() => {}
            Value::String(s) => parts.push(s.clone()),
            Value::Bool(b) => parts.push(b.to_string()),
            Value::Number(n) => parts.push(n.to_string()),
            Value::Array(items) => stack.extend(items.iter().rev()),
        }
    }
    parts.join("\n")
}

fn level_from_value(value: &Value) -> Option<u32> {
    match value {
        Value::Number(n) => {
            if let Some(u) = n.as_u64() {
                u32::try_from(u).ok()
            } else {
                n.as_f64()
                    .filter(|f| f.fract() == 0.0 && *f >= 0.0 && *f <= u32::MAX as f64)
                    .map(|f| f as u32)
            }
        }
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Replace missing or duplicate ids with `node-N`.
///
/// Walks pre-order; the first occurrence of an id keeps it. Generated ids
/// skip anything already present anywhere in the tree.
pub fn assign_unique_ids(root: &mut DocumentNode) {
    let mut taken: HashSet<String> = HashSet::new();
    collect_ids(root, &mut taken);

    let mut seen: HashSet<String> = HashSet::new();
    let mut counter = 0usize;
    let mut stack: Vec<&mut DocumentNode> = vec![root];

    while let Some(node) = stack.pop() {
        if node.id.is_empty() || !seen.insert(node.id.clone()) {
            loop {
                counter += 1;
                let candidate = format!("node-{counter}");
                if !taken.contains(&candidate) {
                    taken.insert(candidate.clone());
                    seen.insert(candidate.clone());
                    node.id = candidate;
                    break;
                }
            }
        }
        for child in node.children.iter_mut().rev() {
            stack.push(child);
        }
    }
}

fn collect_ids(root: &DocumentNode, out: &mut HashSet<String>) {
    let mut stack = vec![root];
    while let Some(node) = stack.pop() {
        if !node.id.is_empty() {
            out.insert(node.id.clone());
        }
        stack.extend(node.children.iter());
    }
}

/// Enforce the single-root invariant on a tree decoded from model output.
///
/// A top node that is not `root` is wrapped under a synthetic root; any
/// `root` found below the top is demoted to `section`.
pub fn ensure_root(node: DocumentNode) -> DocumentNode {
    let mut top = if node.node_type == NodeType::Root {
        node
    } else {
        DocumentNode::root("").with_child(node)
    };

    let mut stack: Vec<&mut DocumentNode> = top.children.iter_mut().collect();
    while let Some(n) = stack.pop() {
        if n.node_type == NodeType::Root {
            n.node_type = NodeType::Section;
        }
        stack.extend(n.children.iter_mut());
    }
    top
}
