//! # Kagami
//!
//! Reverse image search: embed a query image with a pretrained ResNet,
//! look up its nearest neighbours by cosine similarity in a vector
//! collection, and save the matched images.
//!
//! ```rust,no_run
//! use std::path::Path;
//! use kagami::{Pipeline, PipelineConfig};
//! use kagami_core::FeatureExtractor;
//! use kagami_vecdb::{MilvusClient, MilvusConfig};
//!
//! let config = PipelineConfig::default();
//! let extractor = FeatureExtractor::new(config.backbone, &config.weights).unwrap();
//! let index = MilvusClient::new(MilvusConfig::default()).unwrap();
//!
//! let pipeline = Pipeline::new(extractor, index, config).unwrap();
//! let report = pipeline.run(Path::new("query_images/0.jpg")).unwrap();
//! assert!(report.saved.len() <= 2);
//! ```

pub mod config;
pub mod error;
pub mod pipeline;

pub use config::PipelineConfig;
pub use error::{PipelineError, Result};
pub use pipeline::{is_image_path, IngestReport, Match, Pipeline, RunReport};

pub use kagami_core;
pub use kagami_vecdb;
