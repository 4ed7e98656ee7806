use serde::{Deserialize, Serialize};

use crate::error::{KagamiError, Result};

/// A fixed-length feature vector describing one image.
///
/// Always non-empty and finite. The extractor hands these out
/// L2-normalised, but an `Embedding` built by hand need not be.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<f32>", into = "Vec<f32>")]
pub struct Embedding(Vec<f32>);

impl Embedding {
    /// Wraps a raw vector, rejecting empty or non-finite input.
    pub fn new(values: Vec<f32>) -> Result<Self> {
        if values.is_empty() {
            return Err(KagamiError::InvalidEmbedding("vector is empty".into()));
        }
        if let Some(pos) = values.iter().position(|v| !v.is_finite()) {
            return Err(KagamiError::InvalidEmbedding(format!(
                "component {pos} is not finite"
            )));
        }
        Ok(Self(values))
    }

    /// Wraps a raw vector and scales it to unit length.
    ///
    /// A zero vector is kept as-is; cosine similarity against it is 0.
    pub fn normalized(values: Vec<f32>) -> Result<Self> {
        let mut embedding = Self::new(values)?;
        let norm = embedding.norm();
        if norm > 0.0 {
            embedding.0.iter_mut().for_each(|v| *v /= norm);
        }
        Ok(embedding)
    }

    /// Number of components.
    #[must_use]
    pub fn dimension(&self) -> usize {
        self.0.len()
    }

    /// Euclidean length.
    #[must_use]
    pub fn norm(&self) -> f32 {
        self.0.iter().map(|v| v * v).sum::<f32>().sqrt()
    }

    /// Cosine similarity in `[-1.0, 1.0]`; 0.0 when either side has zero length
    /// or the dimensions differ.
    #[must_use]
    pub fn cosine_similarity(&self, other: &Self) -> f32 {
        cosine_similarity(&self.0, &other.0)
    }

    #[must_use]
    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    #[must_use]
    pub fn into_vec(self) -> Vec<f32> {
        self.0
    }
}

impl AsRef<[f32]> for Embedding {
    fn as_ref(&self) -> &[f32] {
        &self.0
    }
}

impl TryFrom<Vec<f32>> for Embedding {
    type Error = KagamiError;

    fn try_from(values: Vec<f32>) -> Result<Self> {
        Self::new(values)
    }
}

impl From<Embedding> for Vec<f32> {
    fn from(embedding: Embedding) -> Self {
        embedding.0
    }
}

/// Cosine similarity between two raw vectors.
#[must_use]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot / (norm_a * norm_b)
}
