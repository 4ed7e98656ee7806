//! Pipeline configuration.
//!
//! Defaults reproduce the stock setup: a 512-d cosine collection named
//! `image_embeddings`, ResNet-34 features, top-2 search, results written
//! to the working directory.

use std::path::PathBuf;

use kagami_core::{Backbone, WeightSource};
use kagami_vecdb::{CollectionSpec, MAX_LIMIT};

use crate::error::{PipelineError, Result};

/// Default query image.
pub const DEFAULT_QUERY_IMAGE: &str = "./query_images/0.jpg";

/// Default directory scanned by ingest.
pub const DEFAULT_DB_IMAGES: &str = "./db_images";

/// Default number of matches returned.
pub const DEFAULT_LIMIT: usize = 2;

/// Default number of records sent per insert call.
pub const DEFAULT_BATCH_SIZE: usize = 64;

/// Scalar field that stores each image's path.
pub const FILENAME_FIELD: &str = "filename";

/// Configuration for the search pipeline.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Collection schema; its dimension must match the embedder.
    pub collection: CollectionSpec,
    pub backbone: Backbone,
    pub weights: WeightSource,
    /// Top-k.
    pub limit: usize,
    /// Field holding the image path in each record.
    pub filename_field: String,
    pub batch_size: usize,
    /// Where matched images are written.
    pub output_dir: PathBuf,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        let backbone = Backbone::default();
        Self {
            collection: CollectionSpec::default(),
            backbone,
            weights: WeightSource::default(),
            limit: DEFAULT_LIMIT,
            filename_field: FILENAME_FIELD.to_string(),
            batch_size: DEFAULT_BATCH_SIZE,
            output_dir: PathBuf::from("."),
        }
    }
}

impl PipelineConfig {
    /// Create a new pipeline configuration with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Use another collection name, keeping the rest of the schema.
    pub fn with_collection_name(mut self, name: impl Into<String>) -> Self {
        self.collection.name = name.into();
        self
    }

    /// Replace the whole collection schema.
    pub fn with_collection(mut self, collection: CollectionSpec) -> Self {
        self.collection = collection;
        self
    }

    /// Set the backbone; the collection dimension follows it.
    pub fn with_backbone(mut self, backbone: Backbone) -> Self {
        self.backbone = backbone;
        self.collection.dimension = backbone.embedding_dim();
        self
    }

    pub fn with_weights(mut self, weights: WeightSource) -> Self {
        self.weights = weights;
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    /// Checks the collection schema, the limit range, and the batch size.
    pub fn validate(&self) -> Result<()> {
        self.collection.validate()?;
        if self.limit == 0 || self.limit > MAX_LIMIT {
            return Err(PipelineError::Config(format!(
                "limit must be between 1 and {MAX_LIMIT}, got {}",
                self.limit
            )));
        }
        if self.batch_size == 0 {
            return Err(PipelineError::Config("batch size must be positive".into()));
        }
        if self.filename_field.trim().is_empty() {
            return Err(PipelineError::Config("filename field is empty".into()));
        }
        Ok(())
    }
}
