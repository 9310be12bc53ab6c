//! Response parser: raw model text → document tree + schema data.
//!
//! The model's reply is untrusted, semi-structured text. It may contain the
//! tagged blocks from [`crate::protocol`], be wrapped in prose or code fences,
//! or stop mid-object because it hit the output-token limit. Parsing is two
//! independent sections, each a fixed chain of strategies:
//!
//! ```text
//! tree: strict ──▶ recovered ──▶ degraded (single `other` node, raw text)
//! data: strict ──▶ recovered ──▶ absent
//! ```
//!
//! A failure in one section never affects the other, and nothing here
//! returns an error: outcomes are reported in [`ParseReport`].

pub mod clean;
pub mod scan;

use crate::protocol::{self, DATA_CLOSE, DATA_OPEN, TREE_CLOSE, TREE_OPEN};
use crate::tree::decode::{assign_unique_ids, discard, ensure_root, node_from_value, parse_json_value};
use crate::tree::{DocumentNode, NodeType};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

/// Id given to the degraded fallback node.
pub const FALLBACK_NODE_ID: &str = "fallback";

/// How a section of the response was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SectionOutcome {
    /// The designated block parsed as-is.
    Strict,
    /// Recovered from the largest balanced JSON object found.
    Recovered,
    /// Nothing parsable; a fallback value stands in (tree only).
    Degraded,
    /// Nothing parsable and no fallback (schema data only).
    Absent,
}

/// Per-section outcome of one parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParseReport {
    pub tree: SectionOutcome,
    pub data: SectionOutcome,
}

/// Structural fields recovered from a model response.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedResponse {
    /// Always present; the fallback node when the tree section degraded.
    pub tree: DocumentNode,
    /// Schema-extraction payload, if one parsed.
    pub data: Option<Value>,
    pub report: ParseReport,
}

impl ParsedResponse {
    /// `true` when the tree is the fallback node rather than the model's layout.
    pub fn is_degraded(&self) -> bool {
        self.report.tree == SectionOutcome::Degraded
    }
}

/// Parse a raw model response. Never fails.
pub fn parse_response(raw: &str) -> ParsedResponse {
    let text = clean::normalise_response(raw);

    let (tree, tree_outcome) = match parse_tree_section(&text) {
        Some((tree, outcome)) => (tree, outcome),
        None => {
            warn!(
                "No parsable document tree in {} bytes of model output; using fallback node",
                raw.len()
            );
            (fallback_tree(raw), SectionOutcome::Degraded)
        }
    };

    let (data, data_outcome) = match parse_data_section(&text) {
        Some((data, outcome)) => (Some(data), outcome),
        None => (None, SectionOutcome::Absent),
    };

    debug!(
        "Parsed response: tree={:?}, data={:?}",
        tree_outcome, data_outcome
    );

    ParsedResponse {
        tree,
        data,
        report: ParseReport {
            tree: tree_outcome,
            data: data_outcome,
        },
    }
}

/// The single-node tree used when no structure could be recovered.
pub fn fallback_tree(raw: &str) -> DocumentNode {
    DocumentNode::new(FALLBACK_NODE_ID, NodeType::Other).with_text(raw)
}

// ── Tree section ─────────────────────────────────────────────────────────────

fn parse_tree_section(text: &str) -> Option<(DocumentNode, SectionOutcome)> {
    let block = protocol::locate(text, TREE_OPEN, TREE_CLOSE);

    let strict = block
        .and_then(|b| strict_object(b.body, parse_json_value))
        .and_then(|v| accept_or_discard(v, is_tree_shaped));

    let (value, outcome) = match strict {
        Some(v) => (v, SectionOutcome::Strict),
        None => {
            let recovered = match block {
                Some(b) => recover_object(b.body, parse_json_value, is_tree_shaped),
                // Without a tree tag the whole reply is searched, minus the
                // schema block: its object is data, never layout.
                None => match protocol::locate(text, DATA_OPEN, DATA_CLOSE) {
                    Some(data) => recover_object(&data.remove_from(text), parse_json_value, is_tree_shaped),
                    None => recover_object(text, parse_json_value, is_tree_shaped),
                },
            };
            (recovered?, SectionOutcome::Recovered)
        }
    };

    let node = node_from_value(value)?;
    let mut tree = ensure_root(node);
    assign_unique_ids(&mut tree);
    Some((tree, outcome))
}

/// A tree candidate must look like a node, not an arbitrary object.
fn is_tree_shaped(value: &Value) -> bool {
    value
        .as_object()
        .map(|obj| obj.contains_key("type") || obj.contains_key("children"))
        .unwrap_or(false)
}

// ── Schema-data section ──────────────────────────────────────────────────────

fn parse_data_section(text: &str) -> Option<(Value, SectionOutcome)> {
    let block = protocol::locate(text, DATA_OPEN, DATA_CLOSE)?;
    if let Some(value) = strict_object(block.body, parse_bounded) {
        return Some((value, SectionOutcome::Strict));
    }
    recover_object(block.body, parse_bounded, |_| true).map(|v| (v, SectionOutcome::Recovered))
}

// ── Strategies ───────────────────────────────────────────────────────────────

type JsonParser = fn(&str) -> Result<Value, serde_json::Error>;

/// Schema data keeps serde_json's default nesting limit.
fn parse_bounded(text: &str) -> Result<Value, serde_json::Error> {
    serde_json::from_str(text)
}

fn accept_or_discard(value: Value, accept: impl Fn(&Value) -> bool) -> Option<Value> {
    if accept(&value) {
        Some(value)
    } else {
        discard(value);
        None
    }
}

/// Whole (cleaned) body parses as a JSON object.
fn strict_object(body: &str, parse: JsonParser) -> Option<Value> {
    let cleaned = clean::clean_block(body);
    match parse(&cleaned) {
        Ok(v @ Value::Object(_)) => Some(v),
        Ok(other) => {
            discard(other);
            None
        }
        Err(e) => {
            debug!("Strict parse failed: {}", e);
            None
        }
    }
}

/// Largest balanced `{ … }` in `scope` that parses and satisfies `accept`.
fn recover_object(scope: &str, parse: JsonParser, accept: impl Fn(&Value) -> bool) -> Option<Value> {
    scan::first_parsable(scope, |candidate| {
        parse(candidate)
            .ok()
            .and_then(|v| accept_or_discard(v, |v| v.is_object() && accept(v)))
    })
    .map(|(_, v)| v)
}
