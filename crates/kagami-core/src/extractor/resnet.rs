//! # ResNet Feature Extractor
//!
//! Runs a pretrained `timm` ResNet through candle and returns the pooled
//! features as an L2-normalised [`Embedding`].

use std::path::{Path, PathBuf};

use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use hf_hub::api::sync::ApiBuilder;
use image::DynamicImage;
use tracing::{debug, info};

use crate::error::{KagamiError, Result};
use crate::extractor::model::ResNetFeatures;
use crate::extractor::preprocess::{preprocess, IMAGE_SIZE};
use crate::extractor::ImageEmbedder;
use crate::types::{Backbone, Embedding};

/// Weights file name inside the hub repositories.
const WEIGHTS_FILE: &str = "model.safetensors";

/// Default directory for downloaded weights.
pub fn default_cache_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("kagami")
        .join("models")
}

/// Where the extractor gets its weights from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WeightSource {
    /// Download (or reuse a cached copy of) the backbone's hub repository.
    Hub {
        /// Cache directory; `None` uses [`default_cache_dir`].
        cache_dir: Option<PathBuf>,
    },
    /// A local `.safetensors` file in `timm` layout.
    Local(PathBuf),
}

impl Default for WeightSource {
    fn default() -> Self {
        Self::Hub { cache_dir: None }
    }
}

impl WeightSource {
    /// Resolves the source to a file on disk, downloading if needed.
    pub fn resolve(&self, backbone: Backbone) -> Result<PathBuf> {
        match self {
            Self::Local(path) => {
                if path.exists() {
                    Ok(path.clone())
                } else {
                    Err(KagamiError::ModelLoadError(format!(
                        "weights not found at {}",
                        path.display()
                    )))
                }
            }
            Self::Hub { cache_dir } => {
                let cache_dir = cache_dir.clone().unwrap_or_else(default_cache_dir);
                info!(repo = backbone.hub_repo(), cache = %cache_dir.display(), "fetching weights");
                let api = ApiBuilder::new()
                    .with_cache_dir(cache_dir)
                    .build()
                    .map_err(|e| {
                        KagamiError::ModelLoadError(format!("failed to create hub client: {e}"))
                    })?;
                api.model(backbone.hub_repo().to_string())
                    .get(WEIGHTS_FILE)
                    .map_err(|e| {
                        KagamiError::ModelLoadError(format!(
                            "failed to download {}: {e}",
                            backbone.hub_repo()
                        ))
                    })
            }
        }
    }
}

/// Pretrained CNN that maps images to fixed-length embeddings.
pub struct FeatureExtractor {
    model: ResNetFeatures,
    device: Device,
}

impl FeatureExtractor {
    /// Loads `backbone` from `source` onto CUDA when available, CPU otherwise.
    pub fn new(backbone: Backbone, source: &WeightSource) -> Result<Self> {
        let device = Device::cuda_if_available(0).unwrap_or(Device::Cpu);
        Self::with_device(backbone, source, device)
    }

    /// Loads `backbone` from `source` onto a specific device.
    pub fn with_device(backbone: Backbone, source: &WeightSource, device: Device) -> Result<Self> {
        let weights = source.resolve(backbone)?;
        info!(%backbone, weights = %weights.display(), device = ?device, "loading feature extractor");

        let vb = unsafe { VarBuilder::from_mmaped_safetensors(&[weights], DType::F32, &device) }
            .map_err(|e| KagamiError::ModelLoadError(e.to_string()))?;
        let model = ResNetFeatures::load(vb, backbone)
            .map_err(|e| KagamiError::ModelLoadError(e.to_string()))?;

        Ok(Self { model, device })
    }

    #[cfg(test)]
    fn from_model(model: ResNetFeatures, device: Device) -> Self {
        Self { model, device }
    }

    pub fn backbone(&self) -> Backbone {
        self.model.backbone()
    }

    /// Embeds an already decoded image.
    pub fn extract(&self, image: &DynamicImage) -> Result<Embedding> {
        let pixels = preprocess(image);
        let input = Tensor::from_vec(pixels, (1, 3, IMAGE_SIZE, IMAGE_SIZE), &self.device)?;

        let features = self.model.forward(&input)?;
        let values: Vec<f32> = features
            .squeeze(0)?
            .to_dtype(DType::F32)?
            .to_vec1()?;

        let expected = self.backbone().embedding_dim();
        if values.len() != expected {
            return Err(KagamiError::DimensionMismatch {
                expected,
                actual: values.len(),
            });
        }

        Embedding::normalized(values)
    }

    /// Decodes and embeds an image file.
    pub fn extract_path(&self, path: &Path) -> Result<Embedding> {
        debug!(path = %path.display(), "extracting embedding");
        self.embed_path(path)
    }
}

impl ImageEmbedder for FeatureExtractor {
    fn dimension(&self) -> usize {
        self.backbone().embedding_dim()
    }

    fn embed_image(&self, image: &DynamicImage) -> Result<Embedding> {
        self.extract(image)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_source_must_exist() {
        let source = WeightSource::Local(PathBuf::from("models/missing.safetensors"));
        let err = source.resolve(Backbone::ResNet34).unwrap_err();
        assert!(matches!(err, KagamiError::ModelLoadError(_)));
        assert!(err.to_string().contains("missing.safetensors"));
    }

    #[test]
    fn local_source_resolves_to_itself() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("resnet34.safetensors");
        std::fs::write(&path, b"not really weights").unwrap();

        let source = WeightSource::Local(path.clone());
        assert_eq!(source.resolve(Backbone::ResNet34).unwrap(), path);
    }

    #[test]
    fn garbage_weights_fail_to_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.safetensors");
        std::fs::write(&path, b"not really weights").unwrap();

        let result = FeatureExtractor::with_device(
            Backbone::ResNet18,
            &WeightSource::Local(path),
            Device::Cpu,
        );
        assert!(matches!(result, Err(KagamiError::ModelLoadError(_))));
    }

    #[test]
    fn extract_returns_backbone_sized_embedding() {
        let vb = VarBuilder::zeros(DType::F32, &Device::Cpu);
        let model = ResNetFeatures::load(vb, Backbone::ResNet18).unwrap();
        let extractor = FeatureExtractor::from_model(model, Device::Cpu);

        let image = DynamicImage::new_rgb8(320, 200);
        let embedding = extractor.extract(&image).unwrap();

        assert_eq!(embedding.dimension(), 512);
        assert_eq!(extractor.dimension(), 512);
        assert!(embedding.as_slice().iter().all(|v| v.is_finite()));
    }

    #[test]
    fn default_source_is_hub() {
        assert_eq!(WeightSource::default(), WeightSource::Hub { cache_dir: None });
        assert!(default_cache_dir().to_string_lossy().contains("kagami"));
    }
}
