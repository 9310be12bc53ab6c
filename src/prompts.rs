//! Prompts for VLM-based layout analysis.
//!
//! Every prompt lives here so prompt changes touch one file and tests can
//! inspect them without a live model. The tag names come from
//! [`crate::protocol`]; the parser reads the same constants.
//!
//! Callers can override the layout instructions via
//! [`crate::config::AnalysisConfig::system_prompt`].

use crate::protocol::{DATA_CLOSE, DATA_OPEN, TREE_CLOSE, TREE_OPEN};
use crate::tree::NodeType;
use serde_json::Value;

/// System and user turns sent to the model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub system: String,
    pub user: String,
}

/// Default layout-analysis instructions.
///
/// This is used when `AnalysisConfig::system_prompt` is `None`.
pub fn layout_instructions() -> String {
    let vocabulary = NodeType::ALL
        .iter()
        .map(|t| t.as_str())
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        r#"You are an expert document layout analyst. You receive a PDF document (as the file itself or as page images) and describe its visual and logical structure as a tree.

Follow these rules precisely:

1. NODE FORMAT
   Every node is a JSON object with exactly these fields:
   - "id": a short identifier, unique within the tree
   - "type": one of: {vocabulary}
   - "text": the text directly belonging to this node ("" for pure containers)
   - "level": integer heading depth for "header", nesting depth for "list"; omit otherwise
   - "children": array of child nodes in reading order ([] when none)
   - "attributes": optional object of extra facts, e.g. {{"page": 2}}

2. STRUCTURE
   - The top node has type "root" and is the only "root" in the tree
   - Group content under "section" nodes following the document's headings
   - Lists contain "listItem" children; tables contain "tableRow" nodes which contain "tableCell" nodes
   - Use "other" for anything that fits no other type (figures, captions, footers)
   - Preserve the reading order as a human would read the document

3. TEXT
   - Transcribe text faithfully; do not summarise or paraphrase
   - Skip page numbers and repeated running headers/footers

4. OUTPUT FORMAT
   - Put the tree, as a single JSON object, between {TREE_OPEN} and {TREE_CLOSE}
   - When asked to extract fields, put them as a single JSON object between {DATA_OPEN} and {DATA_CLOSE}
   - Do NOT wrap JSON in ``` fences
   - Do NOT add commentary outside the tagged blocks"#
    )
}

/// Build the full prompt for one analysis.
///
/// The schema, when present, is serialised as pretty JSON for the model to
/// target. Free-text instructions are passed through verbatim.
pub fn build_prompt(
    system_override: Option<&str>,
    schema: Option<&Value>,
    instructions: Option<&str>,
) -> Prompt {
    let system = system_override
        .map(str::to_string)
        .unwrap_or_else(layout_instructions);

    let mut user = String::from(
        "Analyse the layout of the attached document and return its document tree.",
    );

    if let Some(schema) = schema {
        let rendered =
            serde_json::to_string_pretty(schema).unwrap_or_else(|_| schema.to_string());
        user.push_str(&format!(
            "\n\nAlso extract the following fields. Return an object matching this target schema between {DATA_OPEN} and {DATA_CLOSE}; use null for fields not present in the document.\n\nTarget schema:\n{rendered}"
        ));
    }

    if let Some(instructions) = instructions.map(str::trim).filter(|s| !s.is_empty()) {
        user.push_str(&format!(
            "\n\nAdditional extraction instructions (results go between {DATA_OPEN} and {DATA_CLOSE}):\n{instructions}"
        ));
    }

    Prompt { system, user }
}
