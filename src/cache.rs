//! Response cache keyed by a fingerprint of everything that shapes a result.
//!
//! Analysing the same PDF with the same prompt, sampling options, input mode
//! and model gives the same kind of answer, and the model call dominates both cost and
//! latency. The analyzer consults an injected [`ResponseCache`] before calling
//! the model and stores successful results after. There is no global cache.

use crate::generation::GenerationOptions;
use crate::output::AnalysisResult;
use crate::prompts::Prompt;
use sha2::{Digest, Sha256};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::debug;

/// SHA-256 (hex) over the inputs that determine an analysis result.
///
/// The prompt carries the system prompt, schema and instructions; the
/// options carry temperature and output budget; `input` names how the PDF is
/// attached (see [`crate::AnalysisConfig::input_signature`]).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn compute(
        pdf: &[u8],
        prompt: &Prompt,
        options: &GenerationOptions,
        input: &str,
        model_tag: &str,
    ) -> Self {
        let sampling = format!(
            "temperature={}/max_tokens={}",
            options.temperature.to_bits(),
            options.max_output_tokens
        );
        let mut hasher = Sha256::new();
        // Length-prefix each field so boundaries cannot shift between them.
        for part in [
            pdf,
            prompt.system.as_bytes(),
            prompt.user.as_bytes(),
            sampling.as_bytes(),
            input.as_bytes(),
            model_tag.as_bytes(),
        ] {
            hasher.update((part.len() as u64).to_le_bytes());
            hasher.update(part);
        }
        Self(hex::encode(hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Storage for analysis results.
pub trait ResponseCache: Send + Sync {
    /// A live entry for `key`, if any.
    fn get(&self, key: &Fingerprint) -> Option<AnalysisResult>;

    /// Store `result` under `key` for `ttl`.
    fn put(&self, key: Fingerprint, result: AnalysisResult, ttl: Duration);
}

/// A cached value with expiration time.
struct CacheEntry {
    value: AnalysisResult,
    expires_at: Instant,
}

impl CacheEntry {
    fn new(value: AnalysisResult, ttl: Duration) -> Self {
        Self {
            value,
            expires_at: Instant::now() + ttl,
        }
    }

    fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }
}

#[derive(Default)]
struct Inner {
    entries: HashMap<Fingerprint, CacheEntry>,
    /// Insertion order, oldest first.
    order: VecDeque<Fingerprint>,
}

impl Inner {
    fn remove(&mut self, key: &Fingerprint) {
        self.entries.remove(key);
        self.order.retain(|k| k != key);
    }
}

/// Bounded in-memory cache with per-entry TTL.
///
/// When full, the least recently inserted entry is evicted. Re-inserting a
/// key counts as a fresh insertion. Expired entries are dropped when read.
pub struct MemoryCache {
    capacity: usize,
    inner: Mutex<Inner>,
}

impl MemoryCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            inner: Mutex::new(Inner::default()),
        }
    }

    /// Entries currently stored, expired or not.
    pub fn len(&self) -> usize {
        self.inner.lock().map(|g| g.entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ResponseCache for MemoryCache {
    fn get(&self, key: &Fingerprint) -> Option<AnalysisResult> {
        let mut guard = self.inner.lock().ok()?;
        match guard.entries.get(key) {
            Some(entry) if entry.is_expired() => {
                debug!("Cache entry {} expired", key);
                guard.remove(key);
                None
            }
            Some(entry) => Some(entry.value.clone()),
            None => None,
        }
    }

    fn put(&self, key: Fingerprint, result: AnalysisResult, ttl: Duration) {
        if self.capacity == 0 {
            return;
        }
        let Ok(mut guard) = self.inner.lock() else {
            return;
        };
        guard.remove(&key);
        while guard.entries.len() >= self.capacity {
            match guard.order.pop_front() {
                Some(oldest) => {
                    debug!("Evicting cache entry {}", oldest);
                    guard.entries.remove(&oldest);
                }
                None => break,
            }
        }
        guard.order.push_back(key.clone());
        guard.entries.insert(key, CacheEntry::new(result, ttl));
    }
}
