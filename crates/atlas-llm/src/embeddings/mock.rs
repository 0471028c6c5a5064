//! Mock embedding provider for testing
//!
//! Produces deterministic bag-of-words vectors: each word hashes to a
//! dimension bucket, so texts sharing vocabulary really are more similar
//! under cosine distance. That makes retrieval tests meaningful without a
//! model. Also records calls and supports scripted failures.

use async_trait::async_trait;
use atlas_core::{AtlasError, AtlasResult, EmbeddingProvider, EmbeddingResponse};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

/// Deterministic, vocabulary-sensitive mock embeddings.
pub struct MockEmbeddingProvider {
    dimensions: usize,
    calls: Mutex<Vec<String>>,
    fail_all: AtomicBool,
    fail_next: AtomicUsize,
}

impl MockEmbeddingProvider {
    pub fn with_dimensions(dimensions: usize) -> Self {
        Self {
            dimensions,
            calls: Mutex::new(Vec::new()),
            fail_all: AtomicBool::new(false),
            fail_next: AtomicUsize::new(0),
        }
    }

    /// All subsequent `embed` calls fail with a transient error.
    pub fn fail_all(&self, fail: bool) {
        self.fail_all.store(fail, Ordering::SeqCst);
    }

    /// The next `n` `embed` calls fail with a transient error, then calls
    /// succeed again.
    pub fn fail_next(&self, n: usize) {
        self.fail_next.store(n, Ordering::SeqCst);
    }

    /// Texts passed to `embed`, in call order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    fn vectorize(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimensions];
        for word in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            let bucket = fnv1a(&word.to_lowercase()) as usize % self.dimensions;
            vector[bucket] += 1.0;
        }
        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }
        vector
    }
}

#[async_trait]
impl EmbeddingProvider for MockEmbeddingProvider {
    async fn embed(&self, text: &str) -> AtlasResult<EmbeddingResponse> {
        self.calls.lock().unwrap().push(text.to_string());
        if self.fail_all.load(Ordering::SeqCst) {
            return Err(AtlasError::unavailable("mock-embeddings", "scripted failure", 1));
        }
        if self
            .fail_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(AtlasError::unavailable("mock-embeddings", "scripted failure", 1));
        }
        Ok(EmbeddingResponse {
            embedding: self.vectorize(text),
            model: "mock".to_string(),
        })
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn provider_name(&self) -> &str {
        "mock"
    }
}

fn fnv1a(s: &str) -> u64 {
    let mut hash: u64 = 0xcbf29ce484222325;
    for byte in s.bytes() {
        hash ^= byte as u64;
        hash = hash.wrapping_mul(0x100000001b3);
    }
    hash
}
