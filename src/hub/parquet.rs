//! Materialized hub datasets backed by the Hub's parquet conversion.
//!
//! Every public dataset has a `refs/convert/parquet` revision holding one or
//! more parquet shards per `config/split`. We download those shards, scan
//! their rows without touching the image column, and read `image.bytes` for a
//! single row only when that image is requested.

use std::fs::File;
use std::path::{Path, PathBuf};

use hf_hub::api::sync::ApiBuilder;
use hf_hub::{Repo, RepoType};
use image::DynamicImage;
use parquet::file::reader::{FileReader, RowGroupReader, SerializedFileReader};
use parquet::errors::ParquetError;
use parquet::record::{Field, Row};
use parquet::schema::types::Type;
use serde_json::{Map, Value};

use super::{HubIdentifier, HubRow, RowSource, IMAGE_COLUMN};
use crate::error::DatalensError;

/// Revision holding the Hub's automatic parquet export.
pub const PARQUET_REVISION: &str = "refs/convert/parquet";

/// Key of the parquet key-value metadata entry holding HF dataset info.
const HF_METADATA_KEY: &str = "huggingface";

#[derive(Clone, Debug)]
struct Shard {
    path: PathBuf,
    rows: usize,
}

/// A downloaded split read from local parquet shards.
#[derive(Debug)]
pub struct ParquetRowSource {
    shards: Vec<Shard>,
}

impl ParquetRowSource {
    /// Downloads the parquet shards of `identifier`'s config and split.
    pub fn open(identifier: &HubIdentifier, token: Option<String>) -> Result<Self, DatalensError> {
        let api_error = |message: String| DatalensError::HfApiError {
            repo_id: identifier.repo.clone(),
            message,
        };

        let mut builder = ApiBuilder::new().with_progress(false);
        if token.is_some() {
            builder = builder.with_token(token);
        }
        let api = builder.build().map_err(|source| api_error(source.to_string()))?;

        let repo = api.repo(Repo::with_revision(
            identifier.repo.clone(),
            RepoType::Dataset,
            PARQUET_REVISION.to_string(),
        ));
        let info = repo.info().map_err(|source| api_error(source.to_string()))?;
        let siblings: Vec<String> = info
            .siblings
            .iter()
            .map(|sibling| sibling.rfilename.clone())
            .collect();

        let selected = select_parquet_shards(&siblings, &identifier.config, &identifier.split);
        if selected.is_empty() {
            return Err(api_error(format!(
                "no parquet shards for config '{}' split '{}'",
                identifier.config, identifier.split
            )));
        }

        let mut paths = Vec::with_capacity(selected.len());
        for remote in &selected {
            tracing::debug!(shard = %remote, dataset = %identifier, "downloading parquet shard");
            let local = repo
                .download(remote)
                .map_err(|source| api_error(format!("failed downloading '{remote}': {source}")))?;
            paths.push(local);
        }

        Self::from_paths(paths)
    }

    /// Reads already-local parquet shards, in order.
    pub fn from_paths(paths: Vec<PathBuf>) -> Result<Self, DatalensError> {
        let shards = paths
            .into_iter()
            .map(|path| {
                let reader = open_reader(&path)?;
                let rows = reader.metadata().file_metadata().num_rows().max(0) as usize;
                Ok(Shard { path, rows })
            })
            .collect::<Result<Vec<_>, DatalensError>>()?;
        Ok(Self { shards })
    }

    /// Maps a global row index to its shard and the index within it.
    fn locate(&self, row_index: usize) -> Option<(&Shard, usize)> {
        let mut local = row_index;
        for shard in &self.shards {
            if local < shard.rows {
                return Some((shard, local));
            }
            local -= shard.rows;
        }
        None
    }
}

impl RowSource for ParquetRowSource {
    fn features(&self) -> Result<Option<Value>, DatalensError> {
        let Some(first) = self.shards.first() else {
            return Ok(None);
        };
        let reader = open_reader(&first.path)?;
        let metadata = reader.metadata().file_metadata().key_value_metadata();

        let info = metadata
            .and_then(|entries| entries.iter().find(|entry| entry.key == HF_METADATA_KEY))
            .and_then(|entry| entry.value.as_deref())
            .and_then(|text| serde_json::from_str::<Value>(text).ok());

        Ok(info.and_then(|info| {
            info.get("info")
                .and_then(|inner| inner.get("features"))
                .or_else(|| info.get("features"))
                .cloned()
        }))
    }

    fn is_streaming(&self) -> bool {
        false
    }

    fn rows(&self) -> Result<Vec<HubRow>, DatalensError> {
        let mut rows = Vec::new();
        for shard in &self.shards {
            let reader = open_reader(&shard.path)?;
            let root = reader.metadata().file_metadata().schema_descr().root_schema();
            if root.get_fields().iter().all(|field| field.name() == IMAGE_COLUMN) {
                rows.extend((0..shard.rows).map(|_| HubRow::default()));
                continue;
            }

            let projection =
                projection_without_image(root).map_err(|source| parse_error(&shard.path, source))?;
            let iter = reader
                .get_row_iter(projection)
                .map_err(|source| parse_error(&shard.path, source))?;
            for row in iter {
                let row = row.map_err(|source| parse_error(&shard.path, source))?;
                rows.push(HubRow::new(row_fields(&row)));
            }
        }
        Ok(rows)
    }

    fn fetch_image(&self, row_index: usize) -> Result<DynamicImage, DatalensError> {
        let not_found = || DatalensError::ImageNotFound {
            id: format!("row {row_index}"),
        };
        let (shard, local) = self.locate(row_index).ok_or_else(not_found)?;
        let reader = open_reader(&shard.path)?;
        let metadata = reader.metadata();

        let mut remaining = local;
        for group_idx in 0..metadata.num_row_groups() {
            let group_rows = metadata.row_group(group_idx).num_rows().max(0) as usize;
            if remaining >= group_rows {
                remaining -= group_rows;
                continue;
            }

            let group = reader
                .get_row_group(group_idx)
                .map_err(|source| parse_error(&shard.path, source))?;
            let row = group
                .get_row_iter(None)
                .map_err(|source| parse_error(&shard.path, source))?
                .nth(remaining)
                .ok_or_else(not_found)?
                .map_err(|source| parse_error(&shard.path, source))?;

            let bytes = image_bytes(&row).ok_or_else(|| DatalensError::HfParquetParse {
                path: shard.path.clone(),
                message: format!("row {row_index} has no '{IMAGE_COLUMN}.bytes' payload"),
            })?;
            return image::load_from_memory(bytes).map_err(|source| DatalensError::ImageDecode {
                target: format!("{} row {row_index}", shard.path.display()),
                source,
            });
        }

        Err(not_found())
    }
}

fn open_reader(path: &Path) -> Result<SerializedFileReader<File>, DatalensError> {
    let file = File::open(path).map_err(DatalensError::Io)?;
    SerializedFileReader::new(file).map_err(|source| parse_error(path, source))
}

fn parse_error(path: &Path, source: impl ToString) -> DatalensError {
    DatalensError::HfParquetParse {
        path: path.to_path_buf(),
        message: source.to_string(),
    }
}

/// The file schema minus the image column, so the row pass never reads or
/// decompresses image payloads. `None` when there is no image column.
fn projection_without_image(root: &Type) -> Result<Option<Type>, ParquetError> {
    if !root.get_fields().iter().any(|field| field.name() == IMAGE_COLUMN) {
        return Ok(None);
    }
    let fields = root
        .get_fields()
        .iter()
        .filter(|field| field.name() != IMAGE_COLUMN)
        .cloned()
        .collect();
    Type::group_type_builder(root.name())
        .with_fields(fields)
        .build()
        .map(Some)
}

fn row_fields(row: &Row) -> Map<String, Value> {
    row.get_column_iter()
        .map(|(name, field)| (name.clone(), field.to_json_value()))
        .collect()
}

fn image_bytes(row: &Row) -> Option<&[u8]> {
    let (_, image) = row
        .get_column_iter()
        .find(|(name, _)| name.as_str() == IMAGE_COLUMN)?;
    let Field::Group(image) = image else {
        return None;
    };
    image
        .get_column_iter()
        .find_map(|(name, field)| match field {
            Field::Bytes(bytes) if name == "bytes" => Some(bytes.data()),
            _ => None,
        })
}

/// Picks the shards of `config/split` from a parquet-export file listing.
///
/// Handles the current `config/split/0000.parquet` layout and the older
/// `config/<name>-split[-00000-of-00002].parquet` one.
pub fn select_parquet_shards(siblings: &[String], config: &str, split: &str) -> Vec<String> {
    let nested_prefix = format!("{config}/{split}/");
    let mut nested: Vec<String> = siblings
        .iter()
        .filter(|path| path.starts_with(&nested_prefix) && path.ends_with(".parquet"))
        .cloned()
        .collect();
    if !nested.is_empty() {
        nested.sort();
        return nested;
    }

    let flat_prefix = format!("{config}/");
    let marker = format!("-{split}");
    let mut flat: Vec<String> = siblings
        .iter()
        .filter(|path| {
            let Some(name) = path.strip_prefix(&flat_prefix) else {
                return false;
            };
            let Some(stem) = name.strip_suffix(".parquet") else {
                return false;
            };
            !stem.contains('/')
                && stem.match_indices(&marker).any(|(idx, _)| {
                    let rest = &stem[idx + marker.len()..];
                    rest.is_empty() || rest.starts_with('-')
                })
        })
        .cloned()
        .collect();
    flat.sort();
    flat
}

#[cfg(test)]
mod tests {
    use super::*;
    use parquet::schema::parser::parse_message_type;

    fn listing(paths: &[&str]) -> Vec<String> {
        paths.iter().map(|p| p.to_string()).collect()
    }

    #[test]
    fn nested_layout_is_preferred() {
        let siblings = listing(&[
            ".gitattributes",
            "default/train/0001.parquet",
            "default/train/0000.parquet",
            "default/test/0000.parquet",
            "other/train/0000.parquet",
        ]);
        assert_eq!(
            select_parquet_shards(&siblings, "default", "train"),
            vec!["default/train/0000.parquet", "default/train/0001.parquet"]
        );
    }

    #[test]
    fn flat_layout_matches_split_suffix() {
        let siblings = listing(&[
            "default/cppe-5-train.parquet",
            "default/cppe-5-test.parquet",
            "default/big-train-00000-of-00002.parquet",
            "default/big-train-00001-of-00002.parquet",
            "default/big-train_extra.parquet",
        ]);
        assert_eq!(
            select_parquet_shards(&siblings, "default", "train"),
            vec![
                "default/big-train-00000-of-00002.parquet",
                "default/big-train-00001-of-00002.parquet",
                "default/cppe-5-train.parquet",
            ]
        );
        assert_eq!(
            select_parquet_shards(&siblings, "default", "test"),
            vec!["default/cppe-5-test.parquet"]
        );
    }

    #[test]
    fn projection_drops_only_the_image_column() {
        let schema = parse_message_type(
            "message hf {
                OPTIONAL INT64 image_id;
                OPTIONAL group image {
                    OPTIONAL BYTE_ARRAY bytes;
                    OPTIONAL BYTE_ARRAY path (UTF8);
                }
                OPTIONAL INT32 width;
            }",
        )
        .expect("schema");

        let projection = projection_without_image(&schema)
            .expect("build projection")
            .expect("image column present");
        let names: Vec<&str> = projection.get_fields().iter().map(|f| f.name()).collect();
        assert_eq!(names, vec!["image_id", "width"]);
        assert_eq!(projection.name(), "hf");
    }

    #[test]
    fn schema_without_image_is_read_whole() {
        let schema = parse_message_type("message hf { OPTIONAL INT64 image_id; }").expect("schema");
        assert!(projection_without_image(&schema).expect("projection").is_none());
    }

    #[test]
    fn unknown_config_selects_nothing() {
        let siblings = listing(&["default/train/0000.parquet"]);
        assert!(select_parquet_shards(&siblings, "missing", "train").is_empty());
    }
}
