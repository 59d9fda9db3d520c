use std::path::PathBuf;
use thiserror::Error;

/// The main error type for datalens operations.
#[derive(Debug, Error)]
pub enum DatalensError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse dataset JSON from {path}: {source}")]
    JsonParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Image not found: {id}")]
    ImageNotFound { id: String },

    #[error("Image {id} declares no file name or assets")]
    ImageUnresolved { id: String },

    #[error("Failed to decode image {target}: {source}")]
    ImageDecode {
        target: String,
        #[source]
        source: image::ImageError,
    },

    #[error("Invalid dataset identifier '{identifier}': {message}")]
    InvalidIdentifier { identifier: String, message: String },

    #[error("Unsupported dataset source: {0}")]
    UnsupportedSource(String),

    #[error("Hugging Face API error for '{repo_id}': {message}")]
    HfApiError { repo_id: String, message: String },

    #[error("Failed to read Hugging Face parquet data from {path}: {message}")]
    HfParquetParse { path: PathBuf, message: String },

    #[error("No dataset is active")]
    NoActiveDataset,

    #[error("No transform has been set")]
    TransformNotSet,
}
