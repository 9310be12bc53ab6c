//! The document node: one structural unit of an analysed document.
//!
//! A tree is a plain owned hierarchy: every node owns its children, there are
//! no parent pointers and nothing is shared between trees. The only logic
//! here is [`NodeType::from_label`], which folds whatever label the model
//! produced into the closed vocabulary.

use serde::ser::SerializeStruct;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Open metadata bag attached to a node (e.g. inferred page number).
///
/// A `BTreeMap` keeps key order stable so canonical JSON is deterministic.
pub type Attributes = BTreeMap<String, Value>;

/// The closed set of node kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NodeType {
    Root,
    Section,
    Header,
    Paragraph,
    List,
    ListItem,
    Table,
    TableRow,
    TableCell,
    Other,
}

impl NodeType {
    /// Every variant, in declaration order.
    pub const ALL: [NodeType; 10] = [
        NodeType::Root,
        NodeType::Section,
        NodeType::Header,
        NodeType::Paragraph,
        NodeType::List,
        NodeType::ListItem,
        NodeType::Table,
        NodeType::TableRow,
        NodeType::TableCell,
        NodeType::Other,
    ];

    /// Wire name of the variant (`listItem`, `tableCell`, …).
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeType::Root => "root",
            NodeType::Section => "section",
            NodeType::Header => "header",
            NodeType::Paragraph => "paragraph",
            NodeType::List => "list",
            NodeType::ListItem => "listItem",
            NodeType::Table => "table",
            NodeType::TableRow => "tableRow",
            NodeType::TableCell => "tableCell",
            NodeType::Other => "other",
        }
    }

    /// Map an arbitrary label onto the closed vocabulary.
    ///
    /// Matching ignores case, `_`, `-` and whitespace, so `list_item`,
    /// `List Item` and `listItem` are the same label. A few common synonyms
    /// are accepted; anything else becomes [`NodeType::Other`].
    pub fn from_label(label: &str) -> NodeType {
        let folded: String = label
            .chars()
            .filter(|c| !matches!(c, '_' | '-') && !c.is_whitespace())
            .flat_map(char::to_lowercase)
            .collect();

        match folded.as_str() {
            "root" => NodeType::Root,
            "section" => NodeType::Section,
            "header" | "heading" => NodeType::Header,
            "paragraph" => NodeType::Paragraph,
            "list" => NodeType::List,
            "listitem" | "item" => NodeType::ListItem,
            "table" => NodeType::Table,
            "tablerow" | "row" => NodeType::TableRow,
            "tablecell" | "cell" => NodeType::TableCell,
            _ => NodeType::Other,
        }
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for NodeType {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(NodeType::from_label(s))
    }
}

impl Serialize for NodeType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for NodeType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let label = String::deserialize(deserializer)?;
        Ok(NodeType::from_label(&label))
    }
}

/// Free stack left before a recursive step moves onto a fresh segment.
const STACK_RED_ZONE: usize = 64 * 1024;
/// Size of each extra stack segment.
const STACK_SEGMENT: usize = 1024 * 1024;

/// One node of a document tree.
///
/// Trees may be arbitrarily deep. The recursive impls (`Clone`,
/// `PartialEq`, `Serialize`) grow the stack on demand and `Drop` is
/// iterative, so depth never overflows the thread stack.
#[derive(Debug)]
pub struct DocumentNode {
    /// Opaque identifier, unique within its tree.
    pub id: String,

    pub node_type: NodeType,

    /// Text directly owned by this node; empty for pure containers.
    pub text: String,

    /// Heading depth for `header`, nesting depth for `list`.
    pub level: Option<u32>,

    /// Children in reading order.
    pub children: Vec<DocumentNode>,

    pub attributes: Attributes,
}

impl DocumentNode {
    /// Create an empty node of the given type.
    pub fn new(id: impl Into<String>, node_type: NodeType) -> Self {
        Self {
            id: id.into(),
            node_type,
            text: String::new(),
            level: None,
            children: Vec::new(),
            attributes: Attributes::new(),
        }
    }

    /// Create an empty `root` node.
    pub fn root(id: impl Into<String>) -> Self {
        Self::new(id, NodeType::Root)
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    pub fn with_level(mut self, level: u32) -> Self {
        self.level = Some(level);
        self
    }

    pub fn with_child(mut self, child: DocumentNode) -> Self {
        self.children.push(child);
        self
    }

    pub fn with_children(mut self, children: impl IntoIterator<Item = DocumentNode>) -> Self {
        self.children.extend(children);
        self
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }
}

impl Clone for DocumentNode {
    fn clone(&self) -> Self {
        stacker::maybe_grow(STACK_RED_ZONE, STACK_SEGMENT, || Self {
            id: self.id.clone(),
            node_type: self.node_type,
            text: self.text.clone(),
            level: self.level,
            children: self.children.clone(),
            attributes: self.attributes.clone(),
        })
    }
}

impl PartialEq for DocumentNode {
    fn eq(&self, other: &Self) -> bool {
        stacker::maybe_grow(STACK_RED_ZONE, STACK_SEGMENT, || {
            self.id == other.id
                && self.node_type == other.node_type
                && self.text == other.text
                && self.level == other.level
                && self.attributes == other.attributes
                && self.children == other.children
        })
    }
}

impl Drop for DocumentNode {
    fn drop(&mut self) {
        let mut pending = std::mem::take(&mut self.children);
        while let Some(mut node) = pending.pop() {
            pending.append(&mut node.children);
        }
    }
}

impl Serialize for DocumentNode {
    /// Canonical field order: `id, type, text, level?, children, attributes?`.
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        stacker::maybe_grow(STACK_RED_ZONE, STACK_SEGMENT, || {
            let len = 4 + usize::from(self.level.is_some()) + usize::from(!self.attributes.is_empty());
            let mut node = serializer.serialize_struct("DocumentNode", len)?;
            node.serialize_field("id", &self.id)?;
            node.serialize_field("type", &self.node_type)?;
            node.serialize_field("text", &self.text)?;
            match self.level {
                Some(level) => node.serialize_field("level", &level)?,
                None => node.skip_field("level")?,
            }
            node.serialize_field("children", &self.children)?;
            if self.attributes.is_empty() {
                node.skip_field("attributes")?;
            } else {
                node.serialize_field("attributes", &self.attributes)?;
            }
            node.end()
        })
    }
}

impl<'de> Deserialize<'de> for DocumentNode {
    /// Decodes through the same lenient path the response parser uses, so
    /// deserialising canonical JSON and parsing model output cannot drift.
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        crate::tree::decode::node_from_value(value)
            .ok_or_else(|| serde::de::Error::custom("document node must be a JSON object"))
    }
}
