use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::KagamiError;

/// Pretrained convolutional network used as a feature extractor.
///
/// The classification head is dropped; the embedding is the globally
/// average-pooled output of the last stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backbone {
    /// ResNet-18, 512-d features.
    ResNet18,
    /// ResNet-34, 512-d features.
    #[default]
    ResNet34,
    /// ResNet-50 (bottleneck blocks), 2048-d features.
    ResNet50,
}

impl Backbone {
    /// Length of the feature vector this backbone produces.
    #[must_use]
    pub fn embedding_dim(self) -> usize {
        match self {
            Self::ResNet18 | Self::ResNet34 => 512,
            Self::ResNet50 => 2048,
        }
    }

    /// Hugging Face hub repository holding the `timm` weights.
    #[must_use]
    pub fn hub_repo(self) -> &'static str {
        match self {
            Self::ResNet18 => "timm/resnet18.a1_in1k",
            Self::ResNet34 => "timm/resnet34.a1_in1k",
            Self::ResNet50 => "timm/resnet50.a1_in1k",
        }
    }

    /// Lowercase identifier, as accepted by [`FromStr`].
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ResNet18 => "resnet18",
            Self::ResNet34 => "resnet34",
            Self::ResNet50 => "resnet50",
        }
    }
}

impl fmt::Display for Backbone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Backbone {
    type Err = KagamiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace(['-', '_'], "").as_str() {
            "resnet18" => Ok(Self::ResNet18),
            "resnet34" => Ok(Self::ResNet34),
            "resnet50" => Ok(Self::ResNet50),
            _ => Err(KagamiError::UnknownBackbone(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_resnet34() {
        assert_eq!(Backbone::default(), Backbone::ResNet34);
        assert_eq!(Backbone::default().embedding_dim(), 512);
    }

    #[test]
    fn dims() {
        assert_eq!(Backbone::ResNet18.embedding_dim(), 512);
        assert_eq!(Backbone::ResNet50.embedding_dim(), 2048);
    }

    #[test]
    fn parse_names() {
        assert_eq!("resnet34".parse::<Backbone>().unwrap(), Backbone::ResNet34);
        assert_eq!("ResNet-50".parse::<Backbone>().unwrap(), Backbone::ResNet50);
        assert_eq!("resnet_18".parse::<Backbone>().unwrap(), Backbone::ResNet18);
        assert!(matches!(
            "vit".parse::<Backbone>(),
            Err(KagamiError::UnknownBackbone(_))
        ));
    }

    #[test]
    fn display_roundtrips_through_parse() {
        for b in [Backbone::ResNet18, Backbone::ResNet34, Backbone::ResNet50] {
            assert_eq!(b.to_string().parse::<Backbone>().unwrap(), b);
        }
    }

    #[test]
    fn hub_repo_matches_name() {
        assert!(Backbone::ResNet34.hub_repo().contains("resnet34"));
    }
}
