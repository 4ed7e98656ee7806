pub mod model;
pub mod preprocess;
pub mod resnet;

use std::path::Path;

use image::DynamicImage;

use crate::error::Result;
use crate::types::Embedding;

pub use preprocess::{load_image, preprocess, IMAGENET_MEAN, IMAGENET_STD, IMAGE_SIZE};
pub use resnet::{default_cache_dir, FeatureExtractor, WeightSource};

/// Anything that can turn an image into a fixed-length embedding.
pub trait ImageEmbedder {
    /// Length of every embedding this embedder returns.
    fn dimension(&self) -> usize;

    /// Embeds a decoded image.
    fn embed_image(&self, image: &DynamicImage) -> Result<Embedding>;

    /// Decodes `path` and embeds it.
    fn embed_path(&self, path: &Path) -> Result<Embedding> {
        let image = load_image(path)?;
        self.embed_image(&image)
    }
}

impl<T: ImageEmbedder + ?Sized> ImageEmbedder for &T {
    fn dimension(&self) -> usize {
        (**self).dimension()
    }

    fn embed_image(&self, image: &DynamicImage) -> Result<Embedding> {
        (**self).embed_image(image)
    }

    fn embed_path(&self, path: &Path) -> Result<Embedding> {
        (**self).embed_path(path)
    }
}
