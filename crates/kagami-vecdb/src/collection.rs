use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Result, VecDbError};

/// Similarity metric a collection is indexed with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum MetricType {
    /// Cosine similarity, higher is closer.
    #[default]
    #[serde(rename = "COSINE")]
    Cosine,
    /// Euclidean distance, lower is closer.
    #[serde(rename = "L2")]
    L2,
    /// Inner product, higher is closer.
    #[serde(rename = "IP")]
    InnerProduct,
}

impl MetricType {
    /// Wire name used by Milvus.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Cosine => "COSINE",
            Self::L2 => "L2",
            Self::InnerProduct => "IP",
        }
    }

    /// Whether larger scores mean closer matches.
    #[must_use]
    pub fn higher_is_closer(self) -> bool {
        !matches!(self, Self::L2)
    }
}

impl fmt::Display for MetricType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Default collection name.
pub const DEFAULT_COLLECTION: &str = "image_embeddings";

/// Default vector field name.
pub const DEFAULT_VECTOR_FIELD: &str = "vector";

/// Default embedding dimensionality (ResNet-18/34 pooled features).
pub const DEFAULT_DIMENSION: usize = 512;

/// Schema of a vector collection: one auto-id primary key, one float
/// vector field, and optionally arbitrary dynamic fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionSpec {
    pub name: String,
    pub vector_field: String,
    pub dimension: usize,
    pub metric: MetricType,
    /// Let the server generate primary keys.
    pub auto_id: bool,
    /// Accept fields that are not declared in the schema (e.g. `filename`).
    pub dynamic_fields: bool,
}

impl Default for CollectionSpec {
    fn default() -> Self {
        Self {
            name: DEFAULT_COLLECTION.to_string(),
            vector_field: DEFAULT_VECTOR_FIELD.to_string(),
            dimension: DEFAULT_DIMENSION,
            metric: MetricType::Cosine,
            auto_id: true,
            dynamic_fields: true,
        }
    }
}

impl CollectionSpec {
    pub fn new(name: impl Into<String>, dimension: usize) -> Self {
        Self {
            name: name.into(),
            dimension,
            ..Self::default()
        }
    }

    pub fn with_vector_field(mut self, field: impl Into<String>) -> Self {
        self.vector_field = field.into();
        self
    }

    pub fn with_metric(mut self, metric: MetricType) -> Self {
        self.metric = metric;
        self
    }

    pub fn with_dynamic_fields(mut self, enabled: bool) -> Self {
        self.dynamic_fields = enabled;
        self
    }

    /// Rejects an empty name, an empty vector field, or zero dimension.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(VecDbError::InvalidCollection("name is empty".into()));
        }
        if self.vector_field.trim().is_empty() {
            return Err(VecDbError::InvalidCollection(
                "vector field name is empty".into(),
            ));
        }
        if self.dimension == 0 {
            return Err(VecDbError::InvalidCollection(
                "dimension must be positive".into(),
            ));
        }
        Ok(())
    }

    /// Checks a vector's length against the collection's dimension.
    pub fn check_dimension(&self, vector: &[f32]) -> Result<()> {
        if vector.len() != self.dimension {
            return Err(VecDbError::DimensionMismatch {
                expected: self.dimension,
                actual: vector.len(),
            });
        }
        Ok(())
    }
}
