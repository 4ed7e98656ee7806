//! # Kagami VecDB
//!
//! Access to the vector collection that backs the image catalog.
//! [`MilvusClient`] talks to a Milvus server over its REST API;
//! [`MemoryIndex`] keeps everything in process for tests and offline runs.
//! Both implement [`VectorIndex`].

pub mod collection;
pub mod error;
pub mod index;
pub mod memory;
pub mod milvus;

pub use collection::{CollectionSpec, MetricType};
pub use error::{Result, VecDbError};
pub use index::{Hit, Record, SearchRequest, VectorIndex, MAX_LIMIT};
pub use memory::MemoryIndex;
pub use milvus::{MilvusClient, MilvusConfig};
