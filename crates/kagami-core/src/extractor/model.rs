use candle_core::{Result, Tensor};
use candle_nn::{Func, Module, VarBuilder};
use candle_transformers::models::resnet;

use crate::types::Backbone;

/// A ResNet with its classifier removed: `[batch, 3, 224, 224]` in,
/// `[batch, embedding_dim]` out (global average pool of the last stage).
pub struct ResNetFeatures {
    backbone: Backbone,
    net: Func<'static>,
}

impl ResNetFeatures {
    /// Build the network from `timm`-layout weights (`conv1`, `bn1`, `layer1..4`).
    pub fn load(vb: VarBuilder<'static>, backbone: Backbone) -> Result<Self> {
        let net = match backbone {
            Backbone::ResNet18 => resnet::resnet18_no_final_layer(vb)?,
            Backbone::ResNet34 => resnet::resnet34_no_final_layer(vb)?,
            Backbone::ResNet50 => resnet::resnet50_no_final_layer(vb)?,
        };
        Ok(Self { backbone, net })
    }

    pub fn backbone(&self) -> Backbone {
        self.backbone
    }

    pub fn forward(&self, pixels: &Tensor) -> Result<Tensor> {
        self.net.forward(pixels)
    }
}
