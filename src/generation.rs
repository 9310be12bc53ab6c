//! The text-generation seam: one multimodal request in, one text reply out.
//!
//! The analyzer only depends on [`TextGenerator`]. [`LlmGenerator`] adapts
//! any `edgequake_llm` provider to it; tests and callers with their own
//! transport implement the trait directly.
//!
//! ## Message Layout
//!
//! [`LlmGenerator`] sends, in order:
//! 1. **System message**: the layout-analysis instructions
//! 2. **User message**: the task text with every attachment (the PDF or
//!    its rendered pages) embedded as images

use crate::config::AnalysisConfig;
use crate::error::{AnalysisError, ModelError};
use crate::prompts::Prompt;
use edgequake_llm::{ChatMessage, CompletionOptions, ImageData, LLMProvider, ProviderFactory};
use futures::future::BoxFuture;
use std::sync::Arc;
use tracing::debug;

/// Model used when a provider is named without one.
pub const DEFAULT_MODEL: &str = "gpt-4.1-nano";

/// Base64-encoded binary payload sent alongside the prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    /// Standard base64, no data-URI prefix.
    pub data: String,
    /// e.g. `application/pdf`, `image/png`.
    pub mime_type: String,
}

impl Attachment {
    pub fn new(data: impl Into<String>, mime_type: impl Into<String>) -> Self {
        Self {
            data: data.into(),
            mime_type: mime_type.into(),
        }
    }
}

/// Sampling options for a single call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationOptions {
    pub temperature: f32,
    pub max_output_tokens: usize,
}

impl GenerationOptions {
    pub fn from_config(config: &AnalysisConfig) -> Self {
        Self {
            temperature: config.temperature,
            max_output_tokens: config.max_output_tokens,
        }
    }
}

/// Everything the model receives for one analysis.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub prompt: Prompt,
    pub attachments: Vec<Attachment>,
    pub options: GenerationOptions,
}

/// The model's reply.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Generation {
    pub text: String,
    pub input_tokens: usize,
    pub output_tokens: usize,
}

impl Generation {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }
}

/// A multimodal text generator.
///
/// Implementations must be `Send + Sync`: batch analysis shares one
/// generator across concurrent tasks. The analyzer bounds every call with
/// the configured timeout, so implementations need not.
pub trait TextGenerator: Send + Sync {
    fn generate<'a>(
        &'a self,
        request: &'a GenerationRequest,
    ) -> BoxFuture<'a, Result<Generation, ModelError>>;

    /// Identifies the backing model in cache fingerprints.
    ///
    /// Generators that can answer differently must return different tags, or
    /// a shared cache will hand one generator's results to the other.
    fn model_tag(&self) -> String;
}

// ── edgequake-llm adapter ────────────────────────────────────────────────

/// [`TextGenerator`] backed by an `edgequake_llm` provider.
#[derive(Clone)]
pub struct LlmGenerator {
    provider: Arc<dyn LLMProvider>,
    tag: String,
}

impl std::fmt::Debug for LlmGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmGenerator").field("tag", &self.tag).finish()
    }
}

impl LlmGenerator {
    pub fn new(provider: Arc<dyn LLMProvider>, tag: impl Into<String>) -> Self {
        Self {
            provider,
            tag: tag.into(),
        }
    }

    /// Resolve a provider from the configuration and environment.
    pub fn from_config(config: &AnalysisConfig) -> Result<Self, AnalysisError> {
        let provider = resolve_provider(config)?;
        Ok(Self::new(provider, config.model_tag()))
    }
}

impl TextGenerator for LlmGenerator {
    fn generate<'a>(
        &'a self,
        request: &'a GenerationRequest,
    ) -> BoxFuture<'a, Result<Generation, ModelError>> {
        Box::pin(async move {
            let images: Vec<ImageData> = request
                .attachments
                .iter()
                .map(|a| ImageData::new(a.data.clone(), a.mime_type.clone()).with_detail("high"))
                .collect();

            let messages = vec![
                ChatMessage::system(request.prompt.system.as_str()),
                ChatMessage::user_with_images(request.prompt.user.as_str(), images),
            ];
            let options = build_options(&request.options);

            let response = self
                .provider
                .chat(&messages, Some(&options))
                .await
                .map_err(|e| ModelError::from_provider_message(e.to_string()))?;

            debug!(
                "{} input tokens, {} output tokens",
                response.prompt_tokens, response.completion_tokens
            );

            Ok(Generation {
                text: response.content,
                input_tokens: response.prompt_tokens,
                output_tokens: response.completion_tokens,
            })
        })
    }

    fn model_tag(&self) -> String {
        self.tag.clone()
    }
}

fn build_options(options: &GenerationOptions) -> CompletionOptions {
    CompletionOptions {
        temperature: Some(options.temperature),
        max_tokens: Some(options.max_output_tokens),
        ..Default::default()
    }
}

fn create_vision_provider(
    provider_name: &str,
    model: &str,
) -> Result<Arc<dyn LLMProvider>, AnalysisError> {
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        AnalysisError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })
}

/// Resolve the LLM provider, from most-specific to least-specific.
///
/// 1. **Pre-built provider** (`config.provider`), used as-is.
/// 2. **Named provider** (`config.provider_name`) with `config.model`, or
///    [`DEFAULT_MODEL`].
/// 3. **Environment pair** `EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL`, when
///    both are non-empty.
/// 4. **OpenAI key**: `OPENAI_API_KEY` present selects OpenAI even when other
///    keys are set.
/// 5. **Full auto-detection** via `ProviderFactory::from_env`.
pub fn resolve_provider(config: &AnalysisConfig) -> Result<Arc<dyn LLMProvider>, AnalysisError> {
    if let Some(ref provider) = config.provider {
        return Ok(Arc::clone(provider));
    }

    if let Some(ref name) = config.provider_name {
        let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);
        return create_vision_provider(name, model);
    }

    if let (Ok(prov), Ok(model)) = (
        std::env::var("EDGEQUAKE_LLM_PROVIDER"),
        std::env::var("EDGEQUAKE_MODEL"),
    ) {
        if !prov.is_empty() && !model.is_empty() {
            return create_vision_provider(&prov, &model);
        }
    }

    if let Ok(openai_key) = std::env::var("OPENAI_API_KEY") {
        if !openai_key.is_empty() {
            let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);
            return create_vision_provider("openai", model);
        }
    }

    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| AnalysisError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No LLM provider could be auto-detected from environment.\n\
                Set OPENAI_API_KEY, GEMINI_API_KEY, or pass --provider.\n\
                Error: {}",
                e
            ),
        })?;

    Ok(llm_provider)
}
