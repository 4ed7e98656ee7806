//! ImageNet-style preprocessing for the ResNet backbones.

use std::path::Path;

use image::DynamicImage;
use image::imageops::FilterType;

use crate::error::{KagamiError, Result};

/// Side length of the square network input.
pub const IMAGE_SIZE: usize = 224;

/// Per-channel RGB mean of the ImageNet training set.
pub const IMAGENET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];

/// Per-channel RGB standard deviation of the ImageNet training set.
pub const IMAGENET_STD: [f32; 3] = [0.229, 0.224, 0.225];

/// Decodes an image file, mapping every failure (missing file included)
/// to [`KagamiError::ImageDecode`].
pub fn load_image(path: &Path) -> Result<DynamicImage> {
    image::open(path).map_err(|e| KagamiError::ImageDecode {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

/// Converts an image into a normalised `3 x 224 x 224` CHW buffer.
///
/// The image is scaled so that it covers the square, centre-cropped,
/// converted to RGB, mapped to `[0, 1]` and standardised per channel.
#[must_use]
pub fn preprocess(image: &DynamicImage) -> Vec<f32> {
    let side = IMAGE_SIZE as u32;
    let rgb = image
        .resize_to_fill(side, side, FilterType::Triangle)
        .to_rgb8();

    let plane = IMAGE_SIZE * IMAGE_SIZE;
    let mut chw = vec![0.0f32; 3 * plane];
    for (x, y, pixel) in rgb.enumerate_pixels() {
        let idx = y as usize * IMAGE_SIZE + x as usize;
        for c in 0..3 {
            let value = f32::from(pixel[c]) / 255.0;
            chw[c * plane + idx] = (value - IMAGENET_MEAN[c]) / IMAGENET_STD[c];
        }
    }
    chw
}
