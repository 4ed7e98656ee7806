//! In-memory index for tests and offline runs.
//!
//! Brute-force scan over every stored vector. Not meant for large
//! catalogs, but it honours the same contract as the Milvus client.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde_json::Map;
use tracing::debug;

use crate::collection::{CollectionSpec, MetricType};
use crate::error::{Result, VecDbError};
use crate::index::{Hit, Record, SearchRequest, VectorIndex};

struct StoredRecord {
    id: u64,
    record: Record,
}

struct Collection {
    spec: CollectionSpec,
    records: Vec<StoredRecord>,
    next_id: u64,
}

/// Brute-force vector index held in process memory.
#[derive(Default)]
pub struct MemoryIndex {
    collections: Mutex<HashMap<String, Collection>>,
}

impl MemoryIndex {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records stored in `collection`, or `None` if it does not exist.
    pub fn len(&self, collection: &str) -> Option<usize> {
        self.lock().get(collection).map(|c| c.records.len())
    }

    /// Schema `collection` was created with.
    pub fn spec(&self, collection: &str) -> Option<CollectionSpec> {
        self.lock().get(collection).map(|c| c.spec.clone())
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Collection>> {
        self.collections
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

/// Score of `candidate` against `query` under `metric`.
fn score(metric: MetricType, query: &[f32], candidate: &[f32]) -> f32 {
    match metric {
        MetricType::Cosine => cosine_similarity(query, candidate),
        MetricType::InnerProduct => query.iter().zip(candidate).map(|(a, b)| a * b).sum(),
        MetricType::L2 => query
            .iter()
            .zip(candidate)
            .map(|(a, b)| (a - b) * (a - b))
            .sum(),
    }
}

/// Same contract as `kagami_core::cosine_similarity`: 0.0 on a length
/// mismatch or a zero-norm side. Keep the two in step.
fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

impl VectorIndex for MemoryIndex {
    fn ensure_collection(&self, spec: &CollectionSpec) -> Result<bool> {
        spec.validate()?;
        let mut collections = self.lock();
        if collections.contains_key(&spec.name) {
            debug!(collection = %spec.name, "collection already exists");
            return Ok(false);
        }
        collections.insert(
            spec.name.clone(),
            Collection {
                spec: spec.clone(),
                records: Vec::new(),
                next_id: 1,
            },
        );
        debug!(collection = %spec.name, dimension = spec.dimension, "created collection");
        Ok(true)
    }

    fn insert(&self, spec: &CollectionSpec, records: &[Record]) -> Result<usize> {
        let mut collections = self.lock();
        let collection = collections
            .get_mut(&spec.name)
            .ok_or_else(|| VecDbError::CollectionNotFound(spec.name.clone()))?;

        for record in records {
            collection.spec.check_dimension(&record.vector)?;
            if !collection.spec.dynamic_fields && !record.fields.is_empty() {
                return Err(VecDbError::InvalidCollection(format!(
                    "collection {:?} does not accept dynamic fields",
                    spec.name
                )));
            }
        }

        for record in records {
            let id = collection.next_id;
            collection.next_id += 1;
            collection.records.push(StoredRecord {
                id,
                record: record.clone(),
            });
        }
        debug!(collection = %spec.name, count = records.len(), "inserted records");
        Ok(records.len())
    }

    fn search(&self, spec: &CollectionSpec, request: &SearchRequest) -> Result<Vec<Hit>> {
        let collections = self.lock();
        let collection = collections
            .get(&spec.name)
            .ok_or_else(|| VecDbError::CollectionNotFound(spec.name.clone()))?;
        request.validate(&collection.spec)?;

        let metric = request.metric;
        let mut scored: Vec<(f32, &StoredRecord)> = collection
            .records
            .iter()
            .map(|stored| (score(metric, &request.vector, &stored.record.vector), stored))
            .collect();

        // Stable sort keeps insertion order among equal scores.
        scored.sort_by(|a, b| {
            let ord = a.0.partial_cmp(&b.0).unwrap_or(Ordering::Equal);
            if metric.higher_is_closer() { ord.reverse() } else { ord }
        });

        let hits = scored
            .into_iter()
            .take(request.limit)
            .map(|(score, stored)| {
                let fields: Map<_, _> = request
                    .output_fields
                    .iter()
                    .filter_map(|name| {
                        stored
                            .record
                            .fields
                            .get(name)
                            .map(|value| (name.clone(), value.clone()))
                    })
                    .collect();
                Hit {
                    id: stored.id.to_string(),
                    score,
                    fields,
                }
            })
            .collect();

        Ok(hits)
    }
}
