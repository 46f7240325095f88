//! Fakes shared by unit tests.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use sha2::{Digest, Sha256};

use crate::embeddings::{Embedder, GeneratedEmbedding};
use crate::error::{Result, SemSearchError};

/// Deterministic embedder: the same text always yields the same vector.
pub(crate) struct FakeEmbedder {
    model: String,
    width: usize,
    calls: AtomicUsize,
    failing: AtomicBool,
}

impl FakeEmbedder {
    pub(crate) fn new(model: &str, width: usize) -> Self {
        Self {
            model: model.to_string(),
            width,
            calls: AtomicUsize::new(0),
            failing: AtomicBool::new(false),
        }
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub(crate) fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub(crate) fn vector_for(&self, text: &str) -> Vec<f32> {
        let digest = Sha256::digest(text.as_bytes());
        (0..self.width)
            .map(|i| {
                let byte = digest[i % digest.len()] as f32 / 255.0 - 0.5;
                byte * (1.0 + (i / digest.len()) as f32 * 0.01)
            })
            .collect()
    }
}

impl Embedder for FakeEmbedder {
    fn model(&self) -> &str {
        &self.model
    }

    async fn generate(&self, text: &str) -> Result<GeneratedEmbedding> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(SemSearchError::Embedding(
                "Connection error while generating embedding: connection refused".into(),
            ));
        }
        Ok(GeneratedEmbedding {
            vector: self.vector_for(text),
            original_dimension: self.width,
        })
    }
}
