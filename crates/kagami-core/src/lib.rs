//! # Kagami Core
//!
//! Image embedding for reverse image search. Decodes and preprocesses
//! images, runs a pretrained ResNet through candle, and returns
//! L2-normalised feature vectors ready for cosine search.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::path::Path;
//! use kagami_core::{Backbone, FeatureExtractor, WeightSource};
//!
//! let extractor = FeatureExtractor::new(Backbone::ResNet34, &WeightSource::default()).unwrap();
//! let embedding = extractor.extract_path(Path::new("query_images/0.jpg")).unwrap();
//!
//! assert_eq!(embedding.dimension(), 512);
//! ```
pub mod error;
pub mod extractor;
pub mod types;

// Re-export primary API
pub use error::{KagamiError, Result};
pub use extractor::{
    default_cache_dir, load_image, preprocess, FeatureExtractor, ImageEmbedder, WeightSource,
};
pub use types::{cosine_similarity, Backbone, Embedding};
