//! Configuration types for document analysis.
//!
//! All analysis behaviour is controlled through [`AnalysisConfig`], built via
//! its [`AnalysisConfigBuilder`]. One struct for every knob makes configs easy
//! to share across tasks and to log.

use crate::error::AnalysisError;
use crate::progress::ProgressCallback;
use edgequake_llm::LLMProvider;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Default upper bound on PDF size: 20 MiB, the common inline-upload ceiling.
pub const DEFAULT_MAX_PDF_BYTES: u64 = 20 * 1024 * 1024;

/// Configuration for a document analysis.
///
/// Built via [`AnalysisConfig::builder()`] or using
/// [`AnalysisConfig::default()`].
///
/// # Example
/// ```rust
/// use edgequake_doctree::{AnalysisConfig, PdfInput};
///
/// let config = AnalysisConfig::builder()
///     .pdf_input(PdfInput::Inline)
///     .max_output_tokens(8192)
///     .model("gemini-2.0-flash")
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct AnalysisConfig {
    /// Largest PDF accepted, in bytes. Default: 20 MiB.
    ///
    /// Larger inputs are rejected before any model call; they are never
    /// truncated.
    pub max_pdf_bytes: u64,

    /// How the PDF reaches the model. Default: [`PdfInput::Rendered`].
    pub pdf_input: PdfInput,

    /// Rendering DPI for [`PdfInput::Rendered`]. Range: 72–400. Default: 150.
    pub dpi: u32,

    /// Cap on either rendered image dimension, in pixels. Default: 2000.
    pub max_rendered_pixels: u32,

    /// PDF user password for encrypted documents (rendered mode).
    pub password: Option<String>,

    /// LLM model identifier, e.g. "gpt-4.1-nano", "gemini-2.0-flash".
    /// If None, uses provider default.
    pub model: Option<String>,

    /// LLM provider name (e.g. "openai", "anthropic", "gemini").
    /// If None along with `provider`, the provider is auto-detected.
    pub provider_name: Option<String>,

    /// Pre-constructed LLM provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Sampling temperature. Default: 0.1.
    ///
    /// Layout description should be faithful, not creative.
    pub temperature: f32,

    /// Maximum tokens the model may generate. Default: 8192.
    ///
    /// The tree for a dense multi-page document is large; a low limit
    /// truncates it and forces the parser into recovery.
    pub max_output_tokens: usize,

    /// Timeout for the single model call, in seconds. Default: 120.
    pub api_timeout_secs: u64,

    /// Replacement for the built-in layout-analysis instructions.
    pub system_prompt: Option<String>,

    /// Download timeout for URL inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// Documents analysed at once by the batch APIs. Default: 4.
    pub concurrency: usize,

    /// Entry count of the in-memory response cache. Default: 128.
    pub cache_capacity: usize,

    /// Lifetime of a cached result in seconds. Default: 3600.
    pub cache_ttl_secs: u64,

    /// Receiver for batch progress events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            max_pdf_bytes: DEFAULT_MAX_PDF_BYTES,
            pdf_input: PdfInput::default(),
            dpi: 150,
            max_rendered_pixels: 2000,
            password: None,
            model: None,
            provider_name: None,
            provider: None,
            temperature: 0.1,
            max_output_tokens: 8192,
            api_timeout_secs: 120,
            system_prompt: None,
            download_timeout_secs: 120,
            concurrency: 4,
            cache_capacity: 128,
            cache_ttl_secs: 3600,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for AnalysisConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnalysisConfig")
            .field("max_pdf_bytes", &self.max_pdf_bytes)
            .field("pdf_input", &self.pdf_input)
            .field("dpi", &self.dpi)
            .field("max_rendered_pixels", &self.max_rendered_pixels)
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("temperature", &self.temperature)
            .field("max_output_tokens", &self.max_output_tokens)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("concurrency", &self.concurrency)
            .field("cache_capacity", &self.cache_capacity)
            .field("cache_ttl_secs", &self.cache_ttl_secs)
            .finish()
    }
}

impl AnalysisConfig {
    /// Create a new builder for `AnalysisConfig`.
    pub fn builder() -> AnalysisConfigBuilder {
        AnalysisConfigBuilder {
            config: Self::default(),
        }
    }

    /// Label identifying the model for cache fingerprints.
    pub fn model_tag(&self) -> String {
        format!(
            "{}/{}",
            self.provider_name.as_deref().unwrap_or("auto"),
            self.model.as_deref().unwrap_or("default")
        )
    }

    /// How the PDF reaches the model, for cache fingerprints.
    pub fn input_signature(&self) -> String {
        match self.pdf_input {
            PdfInput::Inline => "inline".to_string(),
            PdfInput::Rendered => format!(
                "rendered/dpi={}/max={}",
                self.dpi, self.max_rendered_pixels
            ),
        }
    }
}

/// Builder for [`AnalysisConfig`].
pub struct AnalysisConfigBuilder {
    config: AnalysisConfig,
}

impl fmt::Debug for AnalysisConfigBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnalysisConfigBuilder")
            .field("config", &self.config)
            .finish()
    }
}

impl AnalysisConfigBuilder {
    pub fn max_pdf_bytes(mut self, bytes: u64) -> Self {
        self.config.max_pdf_bytes = bytes;
        self
    }

    pub fn pdf_input(mut self, input: PdfInput) -> Self {
        self.config.pdf_input = input;
        self
    }

    pub fn dpi(mut self, dpi: u32) -> Self {
        self.config.dpi = dpi.clamp(72, 400);
        self
    }

    pub fn max_rendered_pixels(mut self, px: u32) -> Self {
        self.config.max_rendered_pixels = px.max(100);
        self
    }

    pub fn password(mut self, pwd: impl Into<String>) -> Self {
        self.config.password = Some(pwd.into());
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_output_tokens(mut self, n: usize) -> Self {
        self.config.max_output_tokens = n;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.system_prompt = Some(prompt.into());
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n.max(1);
        self
    }

    pub fn cache_capacity(mut self, n: usize) -> Self {
        self.config.cache_capacity = n;
        self
    }

    pub fn cache_ttl_secs(mut self, secs: u64) -> Self {
        self.config.cache_ttl_secs = secs;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<AnalysisConfig, AnalysisError> {
        let c = &self.config;
        if c.max_pdf_bytes == 0 {
            return Err(AnalysisError::InvalidConfig(
                "max_pdf_bytes must be ≥ 1".into(),
            ));
        }
        if c.max_output_tokens == 0 {
            return Err(AnalysisError::InvalidConfig(
                "max_output_tokens must be ≥ 1".into(),
            ));
        }
        if c.api_timeout_secs == 0 {
            return Err(AnalysisError::InvalidConfig(
                "api_timeout_secs must be ≥ 1".into(),
            ));
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// How the PDF is handed to the model.
///
/// | Mode | Use with |
/// |------|----------|
/// | `Rendered` | any vision model; pages are rasterised to PNG via pdfium (default) |
/// | `Inline`   | providers that accept `application/pdf` attachments (e.g. Gemini) |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PdfInput {
    /// Rasterise every page and attach the PNGs.
    #[default]
    Rendered,
    /// Attach the PDF bytes unchanged.
    Inline,
}
