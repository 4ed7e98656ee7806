pub mod backbone;
pub mod embedding;

pub use backbone::Backbone;
pub use embedding::{cosine_similarity, Embedding};
