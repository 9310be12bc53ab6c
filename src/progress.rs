//! Progress-callback trait for analysis events.
//!
//! Inject an [`Arc<dyn AnalysisProgressCallback>`] via
//! [`crate::config::AnalysisConfigBuilder::progress_callback`] to receive
//! events as the analyzer works through a document or a batch.
//!
//! # Why callbacks instead of channels?
//!
//! Callers can forward events to a broadcast channel, a WebSocket or a
//! terminal progress bar without the library knowing how the host
//! application communicates. The trait is `Send + Sync` because batch
//! analysis runs several documents concurrently.
//!
//! # Example
//!
//! ```rust
//! use edgequake_doctree::{AnalysisProgressCallback, AnalysisConfig};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     completed: Arc<AtomicUsize>,
//! }
//!
//! impl AnalysisProgressCallback for CountingCallback {
//!     fn on_document_complete(&self, index: usize, total: usize, node_count: usize) {
//!         self.completed.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("Document {}/{} done ({} nodes)", index + 1, total, node_count);
//!     }
//! }
//!
//! let counter = Arc::new(CountingCallback {
//!     completed: Arc::new(AtomicUsize::new(0)),
//! });
//!
//! let config = AnalysisConfig::builder()
//!     .progress_callback(counter as Arc<dyn AnalysisProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by the analyzer as it processes documents.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. In batch mode, per-document methods may be called
/// concurrently from different tasks.
pub trait AnalysisProgressCallback: Send + Sync {
    /// Called once before a batch starts.
    fn on_batch_start(&self, total: usize) {
        let _ = total;
    }

    /// Called just before the model request is sent for a document.
    ///
    /// # Arguments
    /// * `index`: 0-based position of the document in the batch
    /// * `total`: documents in the batch (1 for a single analysis)
    fn on_document_start(&self, index: usize, total: usize) {
        let _ = (index, total);
    }

    /// Called when a document was analysed successfully.
    ///
    /// `node_count` is the element count of the resulting tree.
    fn on_document_complete(&self, index: usize, total: usize, node_count: usize) {
        let _ = (index, total, node_count);
    }

    /// Called when a document failed, either a precondition or generation.
    fn on_document_error(&self, index: usize, total: usize, error: &str) {
        let _ = (index, total, error);
    }

    /// Called once after every document in a batch has been attempted.
    fn on_batch_complete(&self, total: usize, success_count: usize) {
        let _ = (total, success_count);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl AnalysisProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::AnalysisConfig`].
pub type ProgressCallback = Arc<dyn AnalysisProgressCallback>;
