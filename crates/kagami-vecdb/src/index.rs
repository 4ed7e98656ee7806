//! The `VectorIndex` abstraction and the records that flow through it.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::collection::{CollectionSpec, MetricType};
use crate::error::{Result, VecDbError};

/// Largest top-k a search may ask for (Milvus' `topk` ceiling).
pub const MAX_LIMIT: usize = 16384;

/// A record to insert: one vector plus any scalar fields.
///
/// The primary key is left to the index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub vector: Vec<f32>,
    pub fields: Map<String, Value>,
}

impl Record {
    pub fn new(vector: Vec<f32>) -> Self {
        Self {
            vector,
            fields: Map::new(),
        }
    }

    /// Attach a scalar field.
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }
}

/// One top-k search request.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchRequest {
    pub vector: Vec<f32>,
    pub limit: usize,
    /// Scalar fields to return with each hit.
    pub output_fields: Vec<String>,
    pub metric: MetricType,
}

impl SearchRequest {
    pub fn new(vector: Vec<f32>, limit: usize) -> Self {
        Self {
            vector,
            limit,
            output_fields: Vec::new(),
            metric: MetricType::Cosine,
        }
    }

    pub fn with_output_field(mut self, field: impl Into<String>) -> Self {
        self.output_fields.push(field.into());
        self
    }

    pub fn with_metric(mut self, metric: MetricType) -> Self {
        self.metric = metric;
        self
    }

    /// Checks the limit range and the vector length against `spec`.
    pub fn validate(&self, spec: &CollectionSpec) -> Result<()> {
        if self.limit == 0 || self.limit > MAX_LIMIT {
            return Err(VecDbError::InvalidLimit(self.limit));
        }
        spec.check_dimension(&self.vector)
    }
}

/// A search match, best first within a result list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hit {
    /// Primary key as assigned by the index.
    pub id: String,
    /// Similarity (cosine, IP) or distance (L2) reported by the index.
    pub score: f32,
    /// Requested output fields.
    pub fields: Map<String, Value>,
}

impl Hit {
    /// A string-valued output field, if present.
    #[must_use]
    pub fn field_str(&self, name: &str) -> Option<&str> {
        self.fields.get(name).and_then(Value::as_str)
    }
}

/// A store of vectors that supports collection setup, insert, and top-k search.
pub trait VectorIndex {
    /// Creates the collection if it does not exist; an existing collection is
    /// left untouched. Returns `true` when a collection was created.
    fn ensure_collection(&self, spec: &CollectionSpec) -> Result<bool>;

    /// Inserts `records`, returning how many were stored.
    fn insert(&self, spec: &CollectionSpec, records: &[Record]) -> Result<usize>;

    /// Returns at most `request.limit` hits, closest first.
    fn search(&self, spec: &CollectionSpec, request: &SearchRequest) -> Result<Vec<Hit>>;
}

impl<T: VectorIndex + ?Sized> VectorIndex for &T {
    fn ensure_collection(&self, spec: &CollectionSpec) -> Result<bool> {
        (**self).ensure_collection(spec)
    }

    fn insert(&self, spec: &CollectionSpec, records: &[Record]) -> Result<usize> {
        (**self).insert(spec, records)
    }

    fn search(&self, spec: &CollectionSpec, request: &SearchRequest) -> Result<Vec<Hit>> {
        (**self).search(spec, request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_fields() {
        let r = Record::new(vec![1.0, 2.0]).with_field("filename", "db_images/a.jpg");
        assert_eq!(r.fields["filename"], "db_images/a.jpg");
    }

    #[test]
    fn request_limits() {
        let spec = CollectionSpec::new("c", 2);
        assert!(SearchRequest::new(vec![0.0, 1.0], 2).validate(&spec).is_ok());
        assert!(matches!(
            SearchRequest::new(vec![0.0, 1.0], 0).validate(&spec),
            Err(VecDbError::InvalidLimit(0))
        ));
        assert!(
            SearchRequest::new(vec![0.0, 1.0], MAX_LIMIT + 1)
                .validate(&spec)
                .is_err()
        );
        assert!(matches!(
            SearchRequest::new(vec![0.0], 1).validate(&spec),
            Err(VecDbError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn hit_field_lookup() {
        let mut fields = Map::new();
        fields.insert("filename".into(), Value::from("x.png"));
        fields.insert("width".into(), Value::from(10));
        let hit = Hit {
            id: "1".into(),
            score: 0.5,
            fields,
        };
        assert_eq!(hit.field_str("filename"), Some("x.png"));
        assert_eq!(hit.field_str("width"), None);
        assert_eq!(hit.field_str("missing"), None);
    }
}
