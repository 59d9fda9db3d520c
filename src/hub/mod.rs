//! Hugging Face Hub datasets.
//!
//! This module owns the hub identifier format, the [`RowSource`] seam that
//! hides how rows are obtained, and the schema normalization that turns hub
//! rows into a [`crate::dataset::Dataset`]. Network clients live behind the
//! `hf-remote` / `hf-parquet` features.

mod dataset;
pub mod features;
pub mod normalize;
#[cfg(all(feature = "hf-remote", feature = "hf-parquet"))]
pub mod parquet;
#[cfg(feature = "hf-remote")]
pub mod remote;

use std::fmt;

use image::DynamicImage;
use serde_json::Value;

use crate::error::DatalensError;

pub use dataset::HuggingFaceDataset;
pub use normalize::{normalize_rows, CategoryRef, HubRow};

/// Streaming sources only materialize this many leading rows.
pub const HF_ROWS_TO_TAKE_STREAMING: usize = 300;

/// Name of the column holding image payloads.
pub const IMAGE_COLUMN: &str = "image";

/// How a hub dataset is loaded.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LoadMode {
    /// Rows are streamed; only a bounded prefix is kept, images inline.
    Streaming,
    /// The split is downloaded and images are fetched lazily by row.
    Download,
}

impl LoadMode {
    pub fn as_str(self) -> &'static str {
        match self {
            LoadMode::Streaming => "streaming",
            LoadMode::Download => "download",
        }
    }
}

/// A fully-qualified hub dataset reference: `repo@config@split@mode`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct HubIdentifier {
    pub repo: String,
    pub config: String,
    pub split: String,
    pub mode: LoadMode,
}

impl HubIdentifier {
    /// Parses a four-field `repo@config@split@{streaming|download}` identifier.
    pub fn parse(identifier: &str) -> Result<Self, DatalensError> {
        let invalid = |message: &str| DatalensError::InvalidIdentifier {
            identifier: identifier.to_string(),
            message: message.to_string(),
        };

        let fields: Vec<&str> = identifier.split('@').collect();
        let [repo, config, split, mode] = fields.as_slice() else {
            return Err(invalid(
                "expected 'repo@config@split@streaming' or 'repo@config@split@download'",
            ));
        };

        if [repo, config, split].iter().any(|field| field.trim().is_empty()) {
            return Err(invalid("repo, config and split must be non-empty"));
        }

        let mode = match *mode {
            "streaming" => LoadMode::Streaming,
            "download" => LoadMode::Download,
            other => {
                return Err(invalid(&format!(
                    "unknown load mode '{other}' (expected 'streaming' or 'download')"
                )))
            }
        };

        Ok(Self {
            repo: repo.to_string(),
            config: config.to_string(),
            split: split.to_string(),
            mode,
        })
    }
}

impl fmt::Display for HubIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}@{}@{}@{}",
            self.repo,
            self.config,
            self.split,
            self.mode.as_str()
        )
    }
}

/// Where hub rows come from.
pub trait RowSource: Send + Sync {
    /// The HF `features` block, when the source knows it.
    fn features(&self) -> Result<Option<Value>, DatalensError>;

    /// Whether this source streams (and therefore inlines images).
    fn is_streaming(&self) -> bool;

    /// All rows to index, without the image column. Streaming sources attach
    /// each row's decoded image.
    fn rows(&self) -> Result<Vec<HubRow>, DatalensError>;

    /// Fetches the image of the row at `row_index`.
    fn fetch_image(&self, row_index: usize) -> Result<DynamicImage, DatalensError>;
}

/// Opens row sources for hub identifiers.
pub trait HubConnector: Send + Sync {
    fn connect(&self, identifier: &HubIdentifier) -> Result<Box<dyn RowSource>, DatalensError>;
}

/// Enumerates the `(config, split)` pairs of a hub repository.
pub trait HubCatalog {
    fn config_splits(&self, repo: &str) -> Result<Vec<(String, String)>, DatalensError>;
}

/// Connector used when no hub client is compiled in.
#[derive(Clone, Copy, Debug, Default)]
pub struct OfflineHub;

impl HubConnector for OfflineHub {
    fn connect(&self, identifier: &HubIdentifier) -> Result<Box<dyn RowSource>, DatalensError> {
        Err(DatalensError::UnsupportedSource(format!(
            "'{identifier}' is a Hugging Face dataset; rebuild with the 'hf' feature to load it"
        )))
    }
}

impl HubCatalog for OfflineHub {
    fn config_splits(&self, repo: &str) -> Result<Vec<(String, String)>, DatalensError> {
        Err(DatalensError::UnsupportedSource(format!(
            "cannot list configs of '{repo}' without the 'hf-remote' feature"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_four_fields() {
        let id = HubIdentifier::parse("org/ds@default@train@streaming").expect("parse");
        assert_eq!(id.repo, "org/ds");
        assert_eq!(id.config, "default");
        assert_eq!(id.split, "train");
        assert_eq!(id.mode, LoadMode::Streaming);
        assert_eq!(id.to_string(), "org/ds@default@train@streaming");
    }

    #[test]
    fn parse_download_mode() {
        let id = HubIdentifier::parse("cppe-5@default@test@download").expect("parse");
        assert_eq!(id.mode, LoadMode::Download);
    }

    #[test]
    fn wrong_field_count_is_error() {
        for input in ["org/ds", "org/ds@default@train", "a@b@c@streaming@extra"] {
            let err = HubIdentifier::parse(input).expect_err("should fail");
            assert!(matches!(err, DatalensError::InvalidIdentifier { .. }), "{input}");
        }
    }

    #[test]
    fn unknown_mode_is_error() {
        match HubIdentifier::parse("a@b@c@lazy").expect_err("should fail") {
            DatalensError::InvalidIdentifier { message, .. } => {
                assert!(message.contains("unknown load mode 'lazy'"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn empty_fields_are_error() {
        assert!(HubIdentifier::parse("a@@c@download").is_err());
    }

    #[test]
    fn offline_hub_refuses() {
        let id = HubIdentifier::parse("a@b@c@download").expect("parse");
        assert!(matches!(
            OfflineHub.connect(&id),
            Err(DatalensError::UnsupportedSource(_))
        ));
    }
}
