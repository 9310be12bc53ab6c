//! The analysis orchestrator.
//!
//! ## Flow
//!
//! ```text
//! bytes ─▶ validate ─▶ cache? ─▶ prompt + attachments ─▶ model (once, timed)
//!                                                          │
//!             AnalysisResult ◀─ catalog ◀─ parse_response ◀┘
//! ```
//!
//! Precondition failures come back as `Err` before the model is called. A
//! failed model call is a *result* (`success = false`), not an error, so a
//! batch of documents reports every outcome the same way.

use crate::cache::{Fingerprint, MemoryCache, ResponseCache};
use crate::config::AnalysisConfig;
use crate::error::{AnalysisError, ModelError};
use crate::generation::{GenerationOptions, GenerationRequest, LlmGenerator, TextGenerator};
use crate::output::{AnalysisResult, AnalysisStats};
use crate::parser::parse_response;
use crate::pipeline::{attach, input, PDF_MAGIC};
use crate::prompts::build_prompt;
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Analyses PDFs into document trees with one model call each.
///
/// Cheap to clone; clones share the generator, config and cache.
#[derive(Clone)]
pub struct DocumentAnalyzer {
    generator: Arc<dyn TextGenerator>,
    config: Arc<AnalysisConfig>,
    cache: Option<Arc<dyn ResponseCache>>,
}

impl std::fmt::Debug for DocumentAnalyzer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentAnalyzer")
            .field("model", &self.generator.model_tag())
            .field("config", &self.config)
            .field("cache", &self.cache.is_some())
            .finish()
    }
}

impl DocumentAnalyzer {
    pub fn new(generator: Arc<dyn TextGenerator>, config: AnalysisConfig) -> Self {
        Self {
            generator,
            config: Arc::new(config),
            cache: None,
        }
    }

    /// Build an analyzer over an `edgequake_llm` provider resolved from the
    /// config and environment.
    pub fn from_config(config: AnalysisConfig) -> Result<Self, AnalysisError> {
        let generator = LlmGenerator::from_config(&config)?;
        Ok(Self::new(Arc::new(generator), config))
    }

    pub fn with_cache(mut self, cache: Arc<dyn ResponseCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Attach a [`MemoryCache`] sized by `config.cache_capacity`.
    pub fn with_memory_cache(self) -> Self {
        let capacity = self.config.cache_capacity;
        self.with_cache(Arc::new(MemoryCache::new(capacity)))
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Analyse an in-memory PDF.
    ///
    /// # Errors
    /// Returns `Err` only for preconditions: empty, oversized or non-PDF
    /// input, and rasterisation failures in rendered mode. A model failure
    /// yields `Ok` with `success = false`.
    pub async fn analyze(
        &self,
        pdf: &[u8],
        schema: Option<&Value>,
        instructions: Option<&str>,
    ) -> Result<AnalysisResult, AnalysisError> {
        let start = Instant::now();
        validate_pdf(pdf, self.config.max_pdf_bytes)?;

        let prompt = build_prompt(self.config.system_prompt.as_deref(), schema, instructions);
        let options = GenerationOptions::from_config(&self.config);

        let fingerprint = self.cache.as_ref().map(|_| {
            Fingerprint::compute(
                pdf,
                &prompt,
                &options,
                &self.config.input_signature(),
                &self.generator.model_tag(),
            )
        });
        if let (Some(cache), Some(key)) = (&self.cache, &fingerprint) {
            if let Some(mut hit) = cache.get(key) {
                info!("Cache hit for {}", key);
                hit.stats.cache_hit = true;
                return Ok(hit);
            }
        }

        let attachments = attach::prepare_attachments(pdf, &self.config).await?;
        let request = GenerationRequest {
            prompt,
            attachments,
            options,
        };

        info!(
            "Analysing {} bytes with {} attachment(s)",
            pdf.len(),
            request.attachments.len()
        );

        let mut stats = AnalysisStats {
            attachments: request.attachments.len(),
            ..Default::default()
        };

        let outcome = self.generate_bounded(&request).await;
        stats.duration_ms = start.elapsed().as_millis() as u64;

        let generation = match outcome {
            Ok(generation) => generation,
            Err(e) => {
                warn!("Generation failed: {}", e);
                return Ok(AnalysisResult::failure(&e, stats));
            }
        };

        stats.input_tokens = generation.input_tokens;
        stats.output_tokens = generation.output_tokens;

        let parsed = parse_response(&generation.text);
        let result = AnalysisResult::from_parsed(generation.text, parsed, stats);

        info!(
            "Analysis complete: {} nodes, degraded={}, {}ms",
            result.node_count(),
            result.degraded,
            result.stats.duration_ms
        );

        if let (Some(cache), Some(key)) = (&self.cache, fingerprint) {
            debug!("Caching result under {}", key);
            cache.put(
                key,
                result.clone(),
                Duration::from_secs(self.config.cache_ttl_secs),
            );
        }

        Ok(result)
    }

    /// Read a path or URL and analyse it.
    pub async fn analyze_file(
        &self,
        path_or_url: &str,
        schema: Option<&Value>,
        instructions: Option<&str>,
    ) -> Result<AnalysisResult, AnalysisError> {
        let bytes = input::load_input(
            path_or_url,
            self.config.max_pdf_bytes,
            self.config.download_timeout_secs,
        )
        .await?;
        self.analyze(&bytes, schema, instructions).await
    }

    async fn generate_bounded(
        &self,
        request: &GenerationRequest,
    ) -> Result<crate::generation::Generation, ModelError> {
        let secs = self.config.api_timeout_secs;
        match tokio::time::timeout(Duration::from_secs(secs), self.generator.generate(request)).await
        {
            Ok(outcome) => outcome,
            Err(_) => Err(ModelError::Timeout { secs }),
        }
    }
}

/// Check the preconditions every PDF must meet before analysis.
pub fn validate_pdf(pdf: &[u8], max_bytes: u64) -> Result<(), AnalysisError> {
    if pdf.is_empty() {
        return Err(AnalysisError::EmptyInput);
    }
    let size = pdf.len() as u64;
    if size > max_bytes {
        return Err(AnalysisError::InputTooLarge {
            size,
            max: max_bytes,
        });
    }
    if !pdf.starts_with(PDF_MAGIC) {
        return Err(AnalysisError::NotAPdf {
            magic: pdf.iter().take(PDF_MAGIC.len()).copied().collect(),
        });
    }
    Ok(())
}
