//! Batch analysis: many documents, bounded concurrency.
//!
//! ## Why stream?
//!
//! Each document costs one model call that can take tens of seconds. A
//! stream lets callers show results as they arrive, drive progress bars, or
//! write outputs incrementally. [`analyze_stream`] yields items in
//! completion order; [`analyze_batch`] collects them and restores job order.

use crate::analyze::DocumentAnalyzer;
use crate::error::AnalysisError;
use crate::output::AnalysisResult;
use crate::pipeline::input;
use futures::stream::{self, StreamExt};
use serde_json::Value;
use std::pin::Pin;
use tokio_stream::Stream;
use tracing::info;

/// Where a job's PDF comes from.
#[derive(Debug, Clone)]
pub enum JobSource {
    Bytes(Vec<u8>),
    /// Local path or HTTP(S) URL.
    Location(String),
}

/// One document to analyse.
#[derive(Debug, Clone)]
pub struct BatchJob {
    pub label: String,
    pub source: JobSource,
    pub schema: Option<Value>,
    pub instructions: Option<String>,
}

impl BatchJob {
    pub fn from_bytes(label: impl Into<String>, pdf: Vec<u8>) -> Self {
        Self {
            label: label.into(),
            source: JobSource::Bytes(pdf),
            schema: None,
            instructions: None,
        }
    }

    /// A job for a path or URL, labelled with its file name.
    pub fn from_location(location: impl Into<String>) -> Self {
        let location = location.into();
        Self {
            label: input::display_name(&location),
            source: JobSource::Location(location),
            schema: None,
            instructions: None,
        }
    }

    pub fn with_schema(mut self, schema: Value) -> Self {
        self.schema = Some(schema);
        self
    }

    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = Some(instructions.into());
        self
    }
}

/// Outcome of one job.
#[derive(Debug)]
pub struct BatchItem {
    /// Position of the job in the input.
    pub index: usize,
    pub label: String,
    pub outcome: Result<AnalysisResult, AnalysisError>,
}

impl BatchItem {
    /// `true` when the job produced a successful result.
    pub fn succeeded(&self) -> bool {
        matches!(&self.outcome, Ok(r) if r.success)
    }

    /// Failure description, whether a precondition or the model call.
    pub fn error_message(&self) -> Option<String> {
        match &self.outcome {
            Ok(r) => r.error.clone(),
            Err(e) => Some(e.to_string()),
        }
    }
}

/// A boxed stream of batch items.
pub type BatchStream = Pin<Box<dyn Stream<Item = BatchItem> + Send>>;

/// Analyse `jobs` with at most `config.concurrency` in flight, yielding each
/// item as it completes.
pub fn analyze_stream(analyzer: &DocumentAnalyzer, jobs: Vec<BatchJob>) -> BatchStream {
    let total = jobs.len();
    let concurrency = analyzer.config().concurrency.max(1);
    let callback = analyzer.config().progress_callback.clone();
    info!("Starting batch of {} documents ({} concurrent)", total, concurrency);

    if let Some(cb) = &callback {
        cb.on_batch_start(total);
    }

    let analyzer = analyzer.clone();
    let s = stream::iter(jobs.into_iter().enumerate().map(move |(index, job)| {
        let analyzer = analyzer.clone();
        let callback = callback.clone();
        async move {
            if let Some(cb) = &callback {
                cb.on_document_start(index, total);
            }

            let schema = job.schema.as_ref();
            let instructions = job.instructions.as_deref();
            let outcome = match &job.source {
                JobSource::Bytes(pdf) => analyzer.analyze(pdf, schema, instructions).await,
                JobSource::Location(loc) => analyzer.analyze_file(loc, schema, instructions).await,
            };

            let item = BatchItem {
                index,
                label: job.label,
                outcome,
            };

            if let Some(cb) = &callback {
                match &item.outcome {
                    Ok(r) if r.success => cb.on_document_complete(index, total, r.node_count()),
                    _ => cb.on_document_error(
                        index,
                        total,
                        &item.error_message().unwrap_or_default(),
                    ),
                }
            }
            item
        }
    }))
    .buffer_unordered(concurrency);

    Box::pin(s)
}

/// Analyse every job and return the items in job order.
pub async fn analyze_batch(analyzer: &DocumentAnalyzer, jobs: Vec<BatchJob>) -> Vec<BatchItem> {
    let total = jobs.len();
    let mut items: Vec<BatchItem> = analyze_stream(analyzer, jobs).collect().await;
    items.sort_by_key(|item| item.index);

    let successes = items.iter().filter(|i| i.succeeded()).count();
    info!("Batch complete: {}/{} succeeded", successes, total);
    if let Some(cb) = &analyzer.config().progress_callback {
        cb.on_batch_complete(total, successes);
    }
    items
}
