pub mod fingerprint;
pub mod normalize;
pub mod provider;
pub mod store;

use serde::{Serialize, Serializer};

use crate::error::{Result, SemSearchError};

pub use fingerprint::ContentFingerprint;
pub use provider::{Embedder, EmbeddingGenerator, GeneratedEmbedding};
pub use store::{EmbeddingRecord, EmbeddingStore};

/// Width of every stored vector and every search key
pub const TARGET_DIMENSION: usize = 2000;
/// Width raw vectors are padded to before reduction; must cover every supported model
pub const SOURCE_WIDTH: usize = 5500;

/// A vector that is exactly [`TARGET_DIMENSION`] wide.
///
/// Only [`normalize::validate_to_width`] and [`EmbeddingVector::new`] produce one,
/// so holding an `EmbeddingVector` means the width invariant has been checked.
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddingVector(Vec<f32>);

impl EmbeddingVector {
    pub fn new(values: Vec<f32>) -> Result<Self> {
        if values.len() != TARGET_DIMENSION {
            return Err(SemSearchError::Normalize(format!(
                "expected {} dimensions, got {}",
                TARGET_DIMENSION,
                values.len()
            )));
        }
        Ok(Self(values))
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    pub fn into_inner(self) -> Vec<f32> {
        self.0
    }
}

impl Serialize for EmbeddingVector {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.0.serialize(serializer)
    }
}

/// Euclidean (L2) distance, accumulated in f64
pub fn l2_distance(a: &[f32], b: &[f32]) -> f64 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| {
            let d = f64::from(*x) - f64::from(*y);
            d * d
        })
        .sum::<f64>()
        .sqrt()
}
