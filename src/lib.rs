//! # edgequake-doctree
//!
//! Analyse the layout of PDF documents with Vision Language Models and get
//! back a typed, queryable document tree.
//!
//! ## Why this crate?
//!
//! Text extractors flatten a PDF into a character stream and lose the
//! structure a reader sees: which line is a heading, which block belongs to
//! which section, where a table's rows and cells are. This crate asks a
//! multimodal model to describe that structure once, parses the reply into a
//! [`DocumentNode`] tree with a closed vocabulary of [`NodeType`]s, and
//! offers the algorithms you need over it: printing, canonical JSON export,
//! typed search, text extraction and counting. Optional schema-driven field
//! extraction comes back alongside the tree.
//!
//! Model output is untrusted. The [`parser`] never fails: it falls back from
//! strict parsing to balanced-brace recovery to a single-node tree holding
//! the raw reply, and reports which strategy won.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF
//!  │
//!  ├─ 1. Input     path / URL → bytes (size limit enforced while reading)
//!  ├─ 2. Validate  empty / oversized / %PDF magic
//!  ├─ 3. Attach    inline PDF, or pages rasterised via pdfium → PNG
//!  ├─ 4. Model     one call, bounded by the API timeout
//!  ├─ 5. Parse     strict → recovered → degraded
//!  └─ 6. Output    AnalysisResult { tree, data, catalog, raw text, stats }
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_doctree::{print_document_tree, AnalysisConfig, DocumentAnalyzer};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Provider auto-detected from OPENAI_API_KEY / GEMINI_API_KEY / …
//!     let analyzer = DocumentAnalyzer::from_config(AnalysisConfig::default())?;
//!     let result = analyzer
//!         .analyze_file("resume.pdf", None, None)
//!         .await?
//!         .into_result()?;
//!     if let Some(tree) = &result.document_tree {
//!         print!("{}", print_document_tree(tree));
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `doctree` binary (clap + anyhow + indicatif + tracing-subscriber) |
//!
//! ```toml
//! edgequake-doctree = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod analyze;
pub mod cache;
pub mod config;
pub mod error;
pub mod generation;
pub mod output;
pub mod parser;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod protocol;
pub mod stream;
pub mod tree;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use analyze::{validate_pdf, DocumentAnalyzer};
pub use cache::{Fingerprint, MemoryCache, ResponseCache};
pub use config::{AnalysisConfig, AnalysisConfigBuilder, PdfInput};
pub use error::{AnalysisError, ModelError};
pub use generation::{
    Attachment, Generation, GenerationOptions, GenerationRequest, LlmGenerator, TextGenerator,
};
pub use output::{AnalysisResult, AnalysisStats};
pub use parser::{parse_response, ParseReport, ParsedResponse, SectionOutcome};
pub use progress::{AnalysisProgressCallback, NoopProgressCallback, ProgressCallback};
pub use prompts::{build_prompt, Prompt};
pub use stream::{analyze_batch, analyze_stream, BatchItem, BatchJob, BatchStream, JobSource};
pub use tree::{
    count_elements, export_tree_as_json, extract_text_from_tree, find_elements_by_type,
    parse_tree_json, print_document_tree, DocumentNode, ExtractedElements, NodeType,
    TreeJsonError,
};
