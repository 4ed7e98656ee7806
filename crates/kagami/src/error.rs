use std::path::PathBuf;

use kagami_core::KagamiError;
use kagami_vecdb::VecDbError;
use thiserror::Error;

/// Errors surfaced by the search pipeline.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Embedding failed.
    #[error(transparent)]
    Core(#[from] KagamiError),

    /// The vector index rejected a request or could not be reached.
    #[error(transparent)]
    VecDb(#[from] VecDbError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Directory traversal failed during ingest.
    #[error("failed to walk directory: {0}")]
    Walk(#[from] walkdir::Error),

    /// A matched image could not be written out.
    #[error("failed to save {path:?}: {source}")]
    ImageSave {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    /// A search hit came back without the requested output field.
    #[error("hit {id} has no {field:?} field")]
    MissingField { id: String, field: String },

    /// Inconsistent pipeline configuration.
    #[error("invalid configuration: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrapped_errors_keep_their_message() {
        let err: PipelineError = KagamiError::UnknownBackbone("vgg".into()).into();
        assert!(err.to_string().contains("vgg"));

        let err: PipelineError = VecDbError::InvalidLimit(0).into();
        assert!(err.to_string().starts_with("invalid search limit 0"));
    }

    #[test]
    fn missing_field_message() {
        let err = PipelineError::MissingField {
            id: "42".into(),
            field: "filename".into(),
        };
        assert_eq!(err.to_string(), "hit 42 has no \"filename\" field");
    }
}
