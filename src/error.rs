//! Error types for the edgequake-doctree library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`AnalysisError`]: the analysis cannot start: empty or oversized input,
//!   not a PDF, unreadable file, provider not configured. Returned as
//!   `Err(AnalysisError)` from [`crate::DocumentAnalyzer::analyze`] before the
//!   model is ever called.
//!
//! * [`ModelError`]: the generation call itself failed (timeout, quota,
//!   rejected request). Fatal for that call, but reported inside
//!   [`crate::AnalysisResult`] as `success = false` rather than as `Err`.
//!
//! Malformed model output is neither: the parser degrades instead of failing
//! and the outcome is visible in [`crate::AnalysisResult::report`].

use once_cell::sync::Lazy;
use regex::Regex;
use std::path::PathBuf;
use thiserror::Error;

/// HTTP status codes the classifier routes on, as whole numbers only.
static RE_STATUS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(400|401|403|429)\b").unwrap());

/// Errors that prevent an analysis from running.
#[derive(Debug, Error)]
pub enum AnalysisError {
    // ── Precondition errors ───────────────────────────────────────────────
    /// PDF content was empty.
    #[error("PDF content is empty")]
    EmptyInput,

    /// PDF content exceeds the configured maximum.
    #[error("PDF is {size} bytes, larger than the {max}-byte limit\nRaise it with --max-bytes.")]
    InputTooLarge { size: u64, max: u64 },

    /// Content does not start with the `%PDF` signature.
    #[error("Input is not a valid PDF\nFirst bytes: {magic:?}")]
    NotAPdf { magic: Vec<u8> },

    // ── Input resolution errors ───────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("PDF file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The input string is not a valid file path or URL.
    #[error("Invalid input '{input}': not a file path or a valid HTTP/HTTPS URL")]
    InvalidInput { input: String },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'\nIncrease --download-timeout.")]
    DownloadTimeout { url: String, secs: u64 },

    // ── PDF errors (rendered mode) ────────────────────────────────────────
    /// pdfium could not parse the document.
    #[error("PDF is corrupt: {detail}\nTry repairing with: qpdf input.pdf output.pdf")]
    CorruptPdf { detail: String },

    /// PDF requires a password but none was provided.
    #[error("PDF is encrypted and requires a password.\nProvide it with --password <PASSWORD>.")]
    PasswordRequired,

    /// A password was provided but it is wrong.
    #[error("Wrong password for PDF")]
    WrongPassword,

    /// pdfium returned an error for a specific page.
    #[error("Rasterisation failed for page {page}: {detail}")]
    RasterisationFailed { page: usize, detail: String },

    // ── Generation errors ─────────────────────────────────────────────────
    /// The configured provider is not initialised (missing API key etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// The generation call failed.
    ///
    /// Only produced by [`crate::AnalysisResult::into_result`]; `analyze`
    /// itself reports generation failures inside the result.
    #[error("Generation failed: {0}")]
    Generation(String),

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AnalysisError {
    /// `true` for errors raised before any external call was made.
    pub fn is_precondition(&self) -> bool {
        !matches!(
            self,
            AnalysisError::Generation(_) | AnalysisError::Internal(_)
        )
    }
}

/// Failure of the external text-generation capability.
#[derive(Debug, Clone, PartialEq, Eq, Error, serde::Serialize, serde::Deserialize)]
pub enum ModelError {
    /// The call did not complete within the configured timeout.
    #[error("Model call timed out after {secs}s")]
    Timeout { secs: u64 },

    /// The provider reported a timeout of its own.
    #[error("Provider timed out: {detail}")]
    ProviderTimeout { detail: String },

    /// The call was cancelled before completing.
    #[error("Model call was cancelled")]
    Cancelled,

    /// HTTP 429 / quota exhausted.
    #[error("Rate limit or quota exceeded: {detail}")]
    RateLimited { detail: String },

    /// HTTP 401/403; retrying will not help.
    #[error("Authentication failed: {detail}")]
    Authentication { detail: String },

    /// The provider rejected the request (oversized attachment, bad options).
    #[error("Malformed request: {detail}")]
    InvalidRequest { detail: String },

    /// Any other provider error.
    #[error("Provider error: {message}")]
    Provider { message: String },
}

impl ModelError {
    /// Classify a provider error message.
    ///
    /// Providers surface their failures as strings; status codes and common
    /// phrases are enough to route them into the taxonomy above.
    pub fn from_provider_message(message: impl Into<String>) -> Self {
        let message = message.into();
        let lower = message.to_lowercase();
        let status = RE_STATUS
            .captures(&lower)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str());

        if status == Some("429")
            || lower.contains("rate limit")
            || lower.contains("quota")
            || lower.contains("resource exhausted")
        {
            ModelError::RateLimited { detail: message }
        } else if matches!(status, Some("401" | "403"))
            || lower.contains("unauthorized")
            || lower.contains("api key")
        {
            ModelError::Authentication { detail: message }
        } else if status == Some("400") || lower.contains("invalid request") || lower.contains("bad request") {
            ModelError::InvalidRequest { detail: message }
        } else if lower.contains("cancel") {
            ModelError::Cancelled
        } else if lower.contains("timed out") || lower.contains("timeout") {
            ModelError::ProviderTimeout { detail: message }
        } else {
            ModelError::Provider { message }
        }
    }

    /// `true` for timeout and cancellation.
    pub fn is_interrupted(&self) -> bool {
        matches!(
            self,
            ModelError::Timeout { .. } | ModelError::ProviderTimeout { .. } | ModelError::Cancelled
        )
    }
}
