use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while turning images into embeddings.
#[derive(Debug, Error)]
pub enum KagamiError {
    /// The image file could not be read or decoded.
    #[error("failed to decode image {path:?}: {reason}")]
    ImageDecode {
        /// The file that failed to decode.
        path: PathBuf,
        /// Decoder message.
        reason: String,
    },

    /// Filesystem error outside of image decoding.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// The model weights could not be located, downloaded, or loaded.
    #[error("failed to load model: {0}")]
    ModelLoadError(String),

    /// Candle ML framework error.
    #[error("ML inference error: {0}")]
    CandleError(String),

    /// An embedding was empty or contained NaN/infinite components.
    #[error("invalid embedding: {0}")]
    InvalidEmbedding(String),

    /// The model produced a vector of unexpected length.
    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Length the backbone is documented to produce.
        expected: usize,
        /// Length actually produced.
        actual: usize,
    },

    /// A backbone name that is not one of the supported ResNets.
    #[error("unknown backbone {0:?} (expected resnet18, resnet34 or resnet50)")]
    UnknownBackbone(String),
}

impl From<candle_core::Error> for KagamiError {
    fn from(err: candle_core::Error) -> Self {
        Self::CandleError(err.to_string())
    }
}

/// Result type alias for Kagami core operations.
pub type Result<T> = std::result::Result<T, KagamiError>;
