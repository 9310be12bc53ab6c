//! CLI binary for edgequake-doctree.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `AnalysisConfig`, runs a batch over the inputs and prints each result in
//! the requested format.

use anyhow::{Context, Result};
use clap::Parser;
use edgequake_doctree::tree::{tree_depth, type_histogram};
use edgequake_doctree::{
    analyze_batch, export_tree_as_json, extract_text_from_tree, find_elements_by_type,
    print_document_tree, AnalysisConfig, AnalysisProgressCallback, AnalysisResult, AnalysisStats,
    BatchItem,
    BatchJob, DocumentAnalyzer, NodeType, PdfInput, ProgressCallback,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress: one bar for the batch plus a log line per document.
/// Documents may finish out of order.
struct CliProgressCallback {
    bar: ProgressBar,
    labels: Vec<String>,
    start_times: Mutex<HashMap<usize, Instant>>,
    errors: AtomicUsize,
}

impl CliProgressCallback {
    fn new(labels: Vec<String>) -> Arc<Self> {
        let bar = ProgressBar::new(labels.len() as u64);
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} documents  \
             ⏱ {elapsed_precise}  {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);
        bar.set_style(style);
        bar.set_prefix("Analysing");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            labels,
            start_times: Mutex::new(HashMap::new()),
            errors: AtomicUsize::new(0),
        })
    }

    fn label(&self, index: usize) -> &str {
        self.labels.get(index).map(String::as_str).unwrap_or("?")
    }

    fn elapsed_secs(&self, index: usize) -> f64 {
        self.start_times
            .lock()
            .ok()
            .and_then(|mut m| m.remove(&index))
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }
}

impl AnalysisProgressCallback for CliProgressCallback {
    fn on_document_start(&self, index: usize, _total: usize) {
        if let Ok(mut m) = self.start_times.lock() {
            m.insert(index, Instant::now());
        }
        self.bar.set_message(self.label(index).to_string());
    }

    fn on_document_complete(&self, index: usize, _total: usize, node_count: usize) {
        let secs = self.elapsed_secs(index);
        self.bar.println(format!(
            "  {} {:<32}  {}  {}",
            green("✓"),
            self.label(index),
            dim(&format!("{node_count:>5} nodes")),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_document_error(&self, index: usize, _total: usize, error: &str) {
        let secs = self.elapsed_secs(index);
        self.errors.fetch_add(1, Ordering::SeqCst);

        let msg = match error.char_indices().nth(79) {
            Some((cut, _)) => format!("{}\u{2026}", &error[..cut]),
            None => error.to_string(),
        };
        let msg = msg.lines().next().unwrap_or_default().to_string();

        self.bar.println(format!(
            "  {} {:<32}  {}  {}",
            red("✗"),
            self.label(index),
            red(&msg),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_batch_complete(&self, total: usize, success_count: usize) {
        let failed = total.saturating_sub(success_count);
        self.bar.finish_and_clear();
        if failed == 0 {
            eprintln!(
                "{} {} document(s) analysed",
                green("✔"),
                bold(&success_count.to_string())
            );
        } else {
            eprintln!(
                "{} {}/{} document(s) analysed  ({} failed)",
                if failed == total { red("✘") } else { cyan("⚠") },
                bold(&success_count.to_string()),
                total,
                red(&failed.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Print the layout tree
  doctree resume.pdf

  # Canonical JSON tree to a file
  doctree resume.pdf --format json -o resume.tree.json

  # Plain text in reading order
  doctree report.pdf --format text

  # Extract fields against a schema; full result as JSON
  doctree invoice.pdf --schema invoice.schema.json --format result

  # Only the tables
  doctree report.pdf --find table

  # Attach the PDF itself instead of rendered pages (Gemini)
  doctree --provider gemini --model gemini-2.0-flash --inline-pdf paper.pdf

  # Several documents, four at a time
  doctree a.pdf b.pdf https://example.com/c.pdf --concurrency 4

OUTPUT FORMATS:
  tree      indented outline, one node per line (default)
  json      canonical document-tree JSON
  text      text content in reading order, list items bulleted
  elements  headers / paragraphs / lists / tables / sections as JSON
  result    the complete AnalysisResult as JSON

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY          OpenAI API key
  ANTHROPIC_API_KEY       Anthropic API key
  GEMINI_API_KEY          Google Gemini API key
  EDGEQUAKE_LLM_PROVIDER  Provider used when --provider is not given
  EDGEQUAKE_MODEL         Model used together with EDGEQUAKE_LLM_PROVIDER
  DOCTREE_*               Every flag, e.g. DOCTREE_FORMAT=json
"#;

/// Analyse PDF layout into a document tree using Vision LLMs.
#[derive(Parser, Debug)]
#[command(
    name = "doctree",
    version,
    about = "Analyse PDF layout into a typed document tree using Vision LLMs",
    long_about = "Send PDF documents (local files or URLs) to a multimodal model, parse its \
layout description into a document tree of sections, headers, paragraphs, lists and tables, \
and print it as an outline, JSON or plain text. Optionally extract fields against a JSON schema.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Local PDF file paths or HTTP/HTTPS URLs.
    #[arg(required = true)]
    inputs: Vec<String>,

    /// JSON file describing the fields to extract.
    #[arg(long, env = "DOCTREE_SCHEMA")]
    schema: Option<PathBuf>,

    /// Free-text extraction instructions.
    #[arg(long, env = "DOCTREE_INSTRUCTIONS", conflicts_with = "instructions_file")]
    instructions: Option<String>,

    /// Read extraction instructions from a file.
    #[arg(long, env = "DOCTREE_INSTRUCTIONS_FILE")]
    instructions_file: Option<PathBuf>,

    /// Output format.
    #[arg(long, env = "DOCTREE_FORMAT", value_enum, default_value = "tree")]
    format: FormatArg,

    /// Print only nodes of this type (e.g. table, header, listItem).
    #[arg(long, env = "DOCTREE_FIND")]
    find: Option<String>,

    /// LLM model ID (e.g. gpt-4.1-nano, gemini-2.0-flash).
    #[arg(long, env = "DOCTREE_MODEL")]
    model: Option<String>,

    /// LLM provider: openai, anthropic, gemini, ollama, azure.
    #[arg(long, env = "DOCTREE_PROVIDER")]
    provider: Option<String>,

    /// Attach the PDF itself instead of rendered page images.
    #[arg(long, env = "DOCTREE_INLINE_PDF")]
    inline_pdf: bool,

    /// Rendering DPI (72–400).
    #[arg(long, env = "DOCTREE_DPI", default_value_t = 150,
          value_parser = clap::value_parser!(u32).range(72..=400))]
    dpi: u32,

    /// PDF user password for encrypted documents.
    #[arg(long, env = "DOCTREE_PASSWORD")]
    password: Option<String>,

    /// Largest accepted PDF in bytes.
    #[arg(long, env = "DOCTREE_MAX_BYTES", default_value_t = edgequake_doctree::config::DEFAULT_MAX_PDF_BYTES)]
    max_bytes: u64,

    /// LLM temperature (0.0–2.0).
    #[arg(long, env = "DOCTREE_TEMPERATURE", default_value_t = 0.1)]
    temperature: f32,

    /// Max LLM output tokens.
    #[arg(long, env = "DOCTREE_MAX_TOKENS", default_value_t = 8192)]
    max_tokens: usize,

    /// Model call timeout in seconds.
    #[arg(long, env = "DOCTREE_API_TIMEOUT", default_value_t = 120)]
    api_timeout: u64,

    /// HTTP download timeout in seconds.
    #[arg(long, env = "DOCTREE_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// Documents analysed at once.
    #[arg(short, long, env = "DOCTREE_CONCURRENCY", default_value_t = 4)]
    concurrency: usize,

    /// Do not reuse results for repeated inputs.
    #[arg(long, env = "DOCTREE_NO_CACHE")]
    no_cache: bool,

    /// Disable progress bar.
    #[arg(long, env = "DOCTREE_NO_PROGRESS")]
    no_progress: bool,

    /// Write output to this file instead of stdout.
    #[arg(short, long, env = "DOCTREE_OUTPUT")]
    output: Option<PathBuf>,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "DOCTREE_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "DOCTREE_QUIET")]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum FormatArg {
    Tree,
    Json,
    Text,
    Elements,
    Result,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar provides the feedback that matters; library INFO logs
    // would interleave with it.
    let show_progress = !cli.quiet && !cli.no_progress;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let find = cli.find.as_deref().map(parse_node_type).transpose()?;
    let schema = load_schema(&cli).await?;
    let instructions = load_instructions(&cli).await?;

    // ── Build jobs and config ────────────────────────────────────────────
    let jobs: Vec<BatchJob> = cli
        .inputs
        .iter()
        .map(|input| {
            let mut job = BatchJob::from_location(input.as_str());
            if let Some(ref s) = schema {
                job = job.with_schema(s.clone());
            }
            if let Some(ref i) = instructions {
                job = job.with_instructions(i.clone());
            }
            job
        })
        .collect();

    let progress_cb: Option<ProgressCallback> = if show_progress {
        let labels = jobs.iter().map(|j| j.label.clone()).collect();
        Some(CliProgressCallback::new(labels) as Arc<dyn AnalysisProgressCallback>)
    } else {
        None
    };

    let config = build_config(&cli, progress_cb)?;
    let mut analyzer =
        DocumentAnalyzer::from_config(config).context("Failed to set up the model provider")?;
    if !cli.no_cache {
        analyzer = analyzer.with_memory_cache();
    }

    // ── Run ──────────────────────────────────────────────────────────────
    let items = analyze_batch(&analyzer, jobs).await;
    let failures = items.iter().filter(|i| !i.succeeded()).count();

    let rendered = render_items(&items, cli.format, find)?;
    match cli.output {
        Some(ref path) => tokio::fs::write(path, rendered.as_bytes())
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?,
        None => {
            let stdout = io::stdout();
            let mut handle = stdout.lock();
            handle
                .write_all(rendered.as_bytes())
                .context("Failed to write to stdout")?;
        }
    }

    if !cli.quiet {
        for item in &items {
            print_summary(item, show_progress);
        }
    }

    if failures > 0 {
        anyhow::bail!("{failures} of {} document(s) failed", items.len());
    }
    Ok(())
}

/// Map CLI args to `AnalysisConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<AnalysisConfig> {
    let mut builder = AnalysisConfig::builder()
        .pdf_input(if cli.inline_pdf {
            PdfInput::Inline
        } else {
            PdfInput::Rendered
        })
        .dpi(cli.dpi)
        .max_pdf_bytes(cli.max_bytes)
        .temperature(cli.temperature)
        .max_output_tokens(cli.max_tokens)
        .api_timeout_secs(cli.api_timeout)
        .download_timeout_secs(cli.download_timeout)
        .concurrency(cli.concurrency);

    if let Some(ref model) = cli.model {
        builder = builder.model(model.clone());
    }
    if let Some(ref provider) = cli.provider {
        builder = builder.provider_name(provider.clone());
    }
    if let Some(ref password) = cli.password {
        builder = builder.password(password.clone());
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

async fn load_schema(cli: &Cli) -> Result<Option<serde_json::Value>> {
    let Some(ref path) = cli.schema else {
        return Ok(None);
    };
    let text = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read schema from {:?}", path))?;
    let value = serde_json::from_str(&text)
        .with_context(|| format!("Schema file {:?} is not valid JSON", path))?;
    Ok(Some(value))
}

async fn load_instructions(cli: &Cli) -> Result<Option<String>> {
    if let Some(ref path) = cli.instructions_file {
        let text = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read instructions from {:?}", path))?;
        return Ok(Some(text));
    }
    Ok(cli.instructions.clone())
}

/// `--find` must name a real type; `from_label` alone would fold typos into `other`.
fn parse_node_type(label: &str) -> Result<NodeType> {
    let node_type = NodeType::from_label(label);
    if node_type == NodeType::Other && !label.trim().eq_ignore_ascii_case("other") {
        let known: Vec<&str> = NodeType::ALL.iter().map(|t| t.as_str()).collect();
        anyhow::bail!("Unknown node type '{}'. Expected one of: {}", label, known.join(", "));
    }
    Ok(node_type)
}

fn render_items(items: &[BatchItem], format: FormatArg, find: Option<NodeType>) -> Result<String> {
    if format == FormatArg::Result {
        let results: Vec<&AnalysisResult> =
            items.iter().filter_map(|i| i.outcome.as_ref().ok()).collect();
        let json = if results.len() == 1 && items.len() == 1 {
            serde_json::to_string_pretty(results[0])
        } else {
            serde_json::to_string_pretty(&results)
        }
        .context("Failed to serialise result")?;
        return Ok(format!("{json}\n"));
    }

    let multiple = items.len() > 1;
    let mut out = String::new();
    for item in items {
        let Ok(result) = &item.outcome else { continue };
        let Some(tree) = &result.document_tree else { continue };
        if multiple {
            out.push_str(&format!("==> {} <==\n", item.label));
        }
        let body = match (format, find) {
            (FormatArg::Tree, Some(t)) => find_elements_by_type(tree, t)
                .into_iter()
                .map(print_document_tree)
                .collect::<String>(),
            (FormatArg::Tree, None) => print_document_tree(tree),
            (FormatArg::Json, Some(t)) => serde_json::to_string_pretty(&find_elements_by_type(tree, t))
                .context("Failed to serialise nodes")?,
            (FormatArg::Json, None) => export_tree_as_json(tree),
            (FormatArg::Text, Some(t)) => find_elements_by_type(tree, t)
                .into_iter()
                .map(extract_text_from_tree)
                .collect::<Vec<_>>()
                .join("\n"),
            (FormatArg::Text, None) => extract_text_from_tree(tree),
            (FormatArg::Elements, _) => serde_json::to_string_pretty(&result.extracted_elements)
                .context("Failed to serialise elements")?,
            (FormatArg::Result, _) => unreachable!("handled above"),
        };
        out.push_str(&body);
        if !out.ends_with('\n') {
            out.push('\n');
        }
    }
    Ok(out)
}

fn print_summary(item: &BatchItem, show_progress: bool) {
    match &item.outcome {
        Err(e) => {
            if !show_progress {
                eprintln!("{} {}: {}", red("✗"), item.label, e);
            }
        }
        Ok(result) if !result.success => {
            if !show_progress {
                eprintln!(
                    "{} {}: {}",
                    red("✗"),
                    item.label,
                    result.error.as_deref().unwrap_or("generation failed")
                );
            }
        }
        Ok(result) => {
            let Some(tree) = &result.document_tree else { return };
            let histogram = type_histogram(tree)
                .into_iter()
                .map(|(t, n)| format!("{t}={n}"))
                .collect::<Vec<_>>()
                .join(" ");
            eprintln!(
                "   {}  {} nodes, depth {}  {}",
                bold(&item.label),
                result.node_count(),
                tree_depth(tree),
                dim(&histogram),
            );
            if result.degraded {
                eprintln!(
                    "   {} no document tree in the model reply; kept raw text",
                    cyan("⚠")
                );
            }
            eprintln!("   {}", usage_line(&result.stats));
        }
    }
}

fn usage_line(stats: &AnalysisStats) -> String {
    format!(
        "{} tokens in  /  {} tokens out  /  {}ms{}",
        dim(&stats.input_tokens.to_string()),
        dim(&stats.output_tokens.to_string()),
        stats.duration_ms,
        if stats.cache_hit { " (cached)" } else { "" },
    )
}
