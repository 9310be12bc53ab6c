//! Integration tests for the analyzer, cache and batch APIs.
//!
//! A scripted `TextGenerator` stands in for the model, so these run offline
//! and never touch pdfium (every config uses `PdfInput::Inline`).

use edgequake_doctree::{
    analyze_batch, analyze_stream, count_elements, export_tree_as_json, find_elements_by_type,
    parse_tree_json, AnalysisConfig, AnalysisError, AnalysisProgressCallback, BatchJob,
    DocumentAnalyzer, Generation, GenerationRequest, MemoryCache, ModelError, NodeType, PdfInput,
    SectionOutcome, TextGenerator,
};
use futures::future::BoxFuture;
use futures::StreamExt;
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

// ── Test helpers ─────────────────────────────────────────────────────────────

const PDF: &[u8] = b"%PDF-1.7\n1 0 obj << >> endobj\n%%EOF";

const RESUME_REPLY: &str = r#"<document_tree>
{"id":"root","type":"root","text":"","children":[
  {"id":"h1","type":"header","text":"Experience","level":1,"children":[]},
  {"id":"s1","type":"section","text":"","children":[
    {"id":"p1","type":"paragraph","text":"Worked at X","children":[]},
    {"id":"l1","type":"list","text":"","children":[
      {"id":"li1","type":"listItem","text":"Rust","children":[]}
    ]}
  ]}
]}
</document_tree>
<extracted_data>
{"name": "Ada", "skills": ["Rust"]}
</extracted_data>"#;

enum Script {
    Reply(String),
    Fail(ModelError),
    Hang,
}

/// Fake generator that records every request it receives.
struct ScriptedGenerator {
    script: Script,
    calls: AtomicUsize,
    last_user_prompt: Mutex<Option<String>>,
}

impl ScriptedGenerator {
    fn new(script: Script) -> Arc<Self> {
        Arc::new(Self {
            script,
            calls: AtomicUsize::new(0),
            last_user_prompt: Mutex::new(None),
        })
    }

    fn reply(text: &str) -> Arc<Self> {
        Self::new(Script::Reply(text.to_string()))
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl TextGenerator for ScriptedGenerator {
    fn generate<'a>(
        &'a self,
        request: &'a GenerationRequest,
    ) -> BoxFuture<'a, Result<Generation, ModelError>> {
        Box::pin(async move {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last_user_prompt.lock().unwrap() = Some(request.prompt.user.clone());
            match &self.script {
                Script::Reply(text) => Ok(Generation {
                    text: text.clone(),
                    input_tokens: 1200,
                    output_tokens: 300,
                }),
                Script::Fail(e) => Err(e.clone()),
                Script::Hang => {
                    tokio::time::sleep(Duration::from_secs(30)).await;
                    Ok(Generation::new("too late"))
                }
            }
        })
    }

    fn model_tag(&self) -> String {
        "scripted/test".to_string()
    }
}

fn inline_config() -> AnalysisConfig {
    AnalysisConfig::builder()
        .pdf_input(PdfInput::Inline)
        .build()
        .unwrap()
}

fn analyzer(generator: &Arc<ScriptedGenerator>) -> DocumentAnalyzer {
    DocumentAnalyzer::new(generator.clone(), inline_config())
}

// ── Analysis ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn resume_example_end_to_end() {
    let generator = ScriptedGenerator::reply(RESUME_REPLY);
    let schema = json!({"name": "string", "skills": ["string"]});
    let result = analyzer(&generator)
        .analyze(PDF, Some(&schema), None)
        .await
        .unwrap();

    assert!(result.success);
    assert!(!result.degraded);
    assert_eq!(result.raw_analysis, RESUME_REPLY);
    assert_eq!(result.data.as_ref().unwrap()["name"], "Ada");

    let tree = result.document_tree.as_ref().unwrap();
    assert_eq!(tree.node_type, NodeType::Root);
    assert_eq!(count_elements(tree), 6);

    let elements = result.extracted_elements.as_ref().unwrap();
    assert_eq!(elements.headers.len(), 1);
    assert_eq!(elements.headers[0].text, "Experience");
    assert_eq!(elements.paragraphs.len(), 1);
    assert_eq!(elements.lists.len(), 1);
    assert_eq!(elements.sections.len(), 1);
    assert!(elements.tables.is_empty());

    let report = result.report.unwrap();
    assert_eq!(report.tree, SectionOutcome::Strict);
    assert_eq!(report.data, SectionOutcome::Strict);

    assert_eq!(result.stats.input_tokens, 1200);
    assert_eq!(result.stats.output_tokens, 300);
    assert_eq!(result.stats.attachments, 1);
    assert!(!result.stats.cache_hit);
    assert_eq!(generator.calls(), 1);
}

#[tokio::test]
async fn prompt_carries_schema_and_instructions() {
    let generator = ScriptedGenerator::reply(RESUME_REPLY);
    let schema = json!({"invoice_number": "string"});
    analyzer(&generator)
        .analyze(PDF, Some(&schema), Some("Dates as ISO-8601."))
        .await
        .unwrap();

    let prompt = generator.last_user_prompt.lock().unwrap().clone().unwrap();
    assert!(prompt.contains("invoice_number"));
    assert!(prompt.contains("Dates as ISO-8601."));
}

#[tokio::test]
async fn unstructured_reply_degrades_but_succeeds() {
    let reply = "The document appears to be a scanned letter.";
    let generator = ScriptedGenerator::reply(reply);
    let result = analyzer(&generator).analyze(PDF, None, None).await.unwrap();

    assert!(result.success);
    assert!(result.degraded);
    let tree = result.document_tree.unwrap();
    assert_eq!(tree.node_type, NodeType::Other);
    assert_eq!(tree.text, reply);
    assert!(result.data.is_none());
}

#[tokio::test]
async fn generation_failure_is_a_result_not_an_error() {
    let generator = ScriptedGenerator::new(Script::Fail(ModelError::RateLimited {
        detail: "429".into(),
    }));
    let result = analyzer(&generator).analyze(PDF, None, None).await.unwrap();

    assert!(!result.success);
    assert!(result.error.as_deref().unwrap().contains("Rate limit"));
    assert!(result.document_tree.is_none());
    assert!(result.data.is_none());
    assert!(result.extracted_elements.is_none());
    assert!(result.raw_analysis.is_empty());

    let err = result.into_result().unwrap_err();
    assert!(matches!(err, AnalysisError::Generation(_)));
}

#[tokio::test]
async fn slow_generation_times_out() {
    let generator = ScriptedGenerator::new(Script::Hang);
    let config = AnalysisConfig::builder()
        .pdf_input(PdfInput::Inline)
        .api_timeout_secs(1)
        .build()
        .unwrap();
    let result = DocumentAnalyzer::new(generator.clone(), config)
        .analyze(PDF, None, None)
        .await
        .unwrap();

    assert!(!result.success);
    assert!(result.error.unwrap().contains("timed out after 1s"));
    assert!(result.document_tree.is_none());
    assert_eq!(generator.calls(), 1);
}

// ── Preconditions ────────────────────────────────────────────────────────────

#[tokio::test]
async fn preconditions_never_reach_the_generator() {
    let generator = ScriptedGenerator::reply(RESUME_REPLY);
    let config = AnalysisConfig::builder()
        .pdf_input(PdfInput::Inline)
        .max_pdf_bytes(64)
        .build()
        .unwrap();
    let analyzer = DocumentAnalyzer::new(generator.clone(), config);

    let empty = analyzer.analyze(b"", None, None).await.unwrap_err();
    assert!(matches!(empty, AnalysisError::EmptyInput));

    let big = vec![b'%'; 65];
    let too_large = analyzer.analyze(&big, None, None).await.unwrap_err();
    assert!(matches!(too_large, AnalysisError::InputTooLarge { size: 65, max: 64 }));

    let not_pdf = analyzer.analyze(b"<html></html>", None, None).await.unwrap_err();
    assert!(matches!(not_pdf, AnalysisError::NotAPdf { .. }));

    assert_eq!(generator.calls(), 0);
}

#[tokio::test]
async fn analyze_file_reads_from_disk() {
    let generator = ScriptedGenerator::reply(RESUME_REPLY);
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("resume.pdf");
    std::fs::write(&path, PDF).unwrap();

    let result = analyzer(&generator)
        .analyze_file(path.to_str().unwrap(), None, None)
        .await
        .unwrap();
    assert!(result.success);

    let missing = analyzer(&generator)
        .analyze_file(dir.path().join("nope.pdf").to_str().unwrap(), None, None)
        .await
        .unwrap_err();
    assert!(matches!(missing, AnalysisError::FileNotFound { .. }));
    assert_eq!(generator.calls(), 1);
}

// ── Cache ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn cache_hit_skips_the_generator() {
    let generator = ScriptedGenerator::reply(RESUME_REPLY);
    let analyzer = analyzer(&generator).with_cache(Arc::new(MemoryCache::new(8)));

    let first = analyzer.analyze(PDF, None, None).await.unwrap();
    let second = analyzer.analyze(PDF, None, None).await.unwrap();

    assert_eq!(generator.calls(), 1);
    assert!(!first.stats.cache_hit);
    assert!(second.stats.cache_hit);
    assert_eq!(first.document_tree, second.document_tree);

    // A different schema is a different fingerprint.
    let schema = json!({"name": "string"});
    analyzer.analyze(PDF, Some(&schema), None).await.unwrap();
    assert_eq!(generator.calls(), 2);
}

#[tokio::test]
async fn failures_are_not_cached() {
    let generator = ScriptedGenerator::new(Script::Fail(ModelError::Cancelled));
    let analyzer = analyzer(&generator).with_cache(Arc::new(MemoryCache::new(8)));

    analyzer.analyze(PDF, None, None).await.unwrap();
    analyzer.analyze(PDF, None, None).await.unwrap();
    assert_eq!(generator.calls(), 2);
}

#[tokio::test]
async fn expired_cache_entries_trigger_a_fresh_call() {
    let generator = ScriptedGenerator::reply(RESUME_REPLY);
    let config = AnalysisConfig::builder()
        .pdf_input(PdfInput::Inline)
        .cache_ttl_secs(0)
        .build()
        .unwrap();
    let analyzer =
        DocumentAnalyzer::new(generator.clone(), config).with_cache(Arc::new(MemoryCache::new(8)));

    analyzer.analyze(PDF, None, None).await.unwrap();
    let again = analyzer.analyze(PDF, None, None).await.unwrap();
    assert!(!again.stats.cache_hit);
    assert_eq!(generator.calls(), 2);
}

#[tokio::test]
async fn shared_cache_separates_differently_configured_analyzers() {
    let generator = ScriptedGenerator::reply(RESUME_REPLY);
    let cache = Arc::new(MemoryCache::new(8));
    let config_a = AnalysisConfig::builder()
        .pdf_input(PdfInput::Inline)
        .system_prompt("A")
        .build()
        .unwrap();
    let config_b = AnalysisConfig::builder()
        .pdf_input(PdfInput::Inline)
        .system_prompt("B")
        .max_output_tokens(16)
        .build()
        .unwrap();
    let a = DocumentAnalyzer::new(generator.clone(), config_a).with_cache(cache.clone());
    let b = DocumentAnalyzer::new(generator.clone(), config_b).with_cache(cache.clone());

    a.analyze(PDF, None, None).await.unwrap();
    let from_b = b.analyze(PDF, None, None).await.unwrap();
    assert!(!from_b.stats.cache_hit);
    assert_eq!(generator.calls(), 2);

    // Same configuration again is a hit.
    let again = b.analyze(PDF, None, None).await.unwrap();
    assert!(again.stats.cache_hit);
    assert_eq!(generator.calls(), 2);
}

// ── Batch ────────────────────────────────────────────────────────────────────

#[derive(Default)]
struct Counting {
    starts: AtomicUsize,
    completes: AtomicUsize,
    errors: AtomicUsize,
    batch_successes: AtomicUsize,
}

impl AnalysisProgressCallback for Counting {
    fn on_document_start(&self, _index: usize, _total: usize) {
        self.starts.fetch_add(1, Ordering::SeqCst);
    }
    fn on_document_complete(&self, _index: usize, _total: usize, _node_count: usize) {
        self.completes.fetch_add(1, Ordering::SeqCst);
    }
    fn on_document_error(&self, _index: usize, _total: usize, _error: &str) {
        self.errors.fetch_add(1, Ordering::SeqCst);
    }
    fn on_batch_complete(&self, _total: usize, success_count: usize) {
        self.batch_successes.store(success_count, Ordering::SeqCst);
    }
}

#[tokio::test]
async fn batch_returns_every_job_in_order() {
    let generator = ScriptedGenerator::reply(RESUME_REPLY);
    let progress = Arc::new(Counting::default());
    let config = AnalysisConfig::builder()
        .pdf_input(PdfInput::Inline)
        .concurrency(3)
        .progress_callback(progress.clone())
        .build()
        .unwrap();
    let analyzer = DocumentAnalyzer::new(generator.clone(), config);

    let jobs = vec![
        BatchJob::from_bytes("a.pdf", PDF.to_vec()),
        BatchJob::from_bytes("b.txt", b"plain text".to_vec()),
        BatchJob::from_bytes("c.pdf", PDF.to_vec()).with_instructions("Emails only."),
        BatchJob::from_bytes("d.pdf", PDF.to_vec()),
    ];
    let items = analyze_batch(&analyzer, jobs).await;

    let indices: Vec<usize> = items.iter().map(|i| i.index).collect();
    assert_eq!(indices, vec![0, 1, 2, 3]);
    assert_eq!(items[1].label, "b.txt");
    assert!(matches!(items[1].outcome, Err(AnalysisError::NotAPdf { .. })));
    assert!(items[0].succeeded() && items[2].succeeded() && items[3].succeeded());

    assert_eq!(generator.calls(), 3);
    assert_eq!(progress.starts.load(Ordering::SeqCst), 4);
    assert_eq!(progress.completes.load(Ordering::SeqCst), 3);
    assert_eq!(progress.errors.load(Ordering::SeqCst), 1);
    assert_eq!(progress.batch_successes.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn stream_yields_one_item_per_job() {
    let generator = ScriptedGenerator::reply(RESUME_REPLY);
    let analyzer = analyzer(&generator);
    let jobs = (0..5)
        .map(|n| BatchJob::from_bytes(format!("doc-{n}"), PDF.to_vec()))
        .collect();

    let mut indices: Vec<usize> = analyze_stream(&analyzer, jobs)
        .map(|item| item.index)
        .collect()
        .await;
    indices.sort();
    assert_eq!(indices, vec![0, 1, 2, 3, 4]);
}

#[test]
fn empty_batch_completes() {
    let generator = ScriptedGenerator::reply(RESUME_REPLY);
    let items = tokio_test::block_on(analyze_batch(&analyzer(&generator), Vec::new()));
    assert!(items.is_empty());
}

// ── Tree contract ────────────────────────────────────────────────────────────

#[tokio::test]
async fn exported_tree_round_trips() {
    let generator = ScriptedGenerator::reply(RESUME_REPLY);
    let result = analyzer(&generator).analyze(PDF, None, None).await.unwrap();
    let tree = result.document_tree.unwrap();

    let exported = export_tree_as_json(&tree);
    let reparsed = parse_tree_json(&exported).unwrap();
    assert_eq!(export_tree_as_json(&reparsed), exported);
    assert_eq!(
        find_elements_by_type(&reparsed, NodeType::ListItem)[0].text,
        "Rust"
    );
}
