//! Result types returned by the analyzer.

use crate::error::{AnalysisError, ModelError};
use crate::parser::{ParseReport, ParsedResponse};
use crate::tree::{count_elements, DocumentNode, ExtractedElements};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Outcome of analysing one document.
///
/// `success = false` means the model call itself failed; `error` then holds
/// the reason and the structural fields are `None`. A successful result may
/// still be `degraded` when the reply held no recognisable tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub success: bool,
    /// Fields extracted against the caller's schema or instructions.
    pub data: Option<Value>,
    pub document_tree: Option<DocumentNode>,
    pub extracted_elements: Option<ExtractedElements>,
    /// The model's reply, unmodified. Empty when the call failed.
    pub raw_analysis: String,
    pub error: Option<String>,
    /// `true` when `document_tree` is the single-node fallback.
    #[serde(default)]
    pub degraded: bool,
    pub report: Option<ParseReport>,
    #[serde(default)]
    pub stats: AnalysisStats,
}

/// Usage and timing for one analysis.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisStats {
    pub input_tokens: usize,
    pub output_tokens: usize,
    /// Attachments sent with the prompt (1 inline PDF, or one per page).
    pub attachments: usize,
    pub duration_ms: u64,
    /// Served from the response cache without a model call.
    pub cache_hit: bool,
}

impl AnalysisResult {
    /// Assemble a successful result from a parsed reply.
    pub fn from_parsed(raw: String, parsed: ParsedResponse, stats: AnalysisStats) -> Self {
        let degraded = parsed.is_degraded();
        let elements = ExtractedElements::from_tree(&parsed.tree);
        Self {
            success: true,
            data: parsed.data,
            document_tree: Some(parsed.tree),
            extracted_elements: Some(elements),
            raw_analysis: raw,
            error: None,
            degraded,
            report: Some(parsed.report),
            stats,
        }
    }

    /// A failed generation: no tree, no data, no raw text.
    pub fn failure(error: &ModelError, stats: AnalysisStats) -> Self {
        Self {
            success: false,
            data: None,
            document_tree: None,
            extracted_elements: None,
            raw_analysis: String::new(),
            error: Some(error.to_string()),
            degraded: false,
            report: None,
            stats,
        }
    }

    /// Convert a failed result into `Err`, for callers that prefer `?`.
    pub fn into_result(self) -> Result<Self, AnalysisError> {
        if self.success {
            Ok(self)
        } else {
            Err(AnalysisError::Generation(
                self.error
                    .unwrap_or_else(|| "unknown generation failure".to_string()),
            ))
        }
    }

    /// Element count of the tree, 0 when there is none.
    pub fn node_count(&self) -> usize {
        self.document_tree.as_ref().map(count_elements).unwrap_or(0)
    }
}
