//! Hugging Face dataset viewer client.
//!
//! Streaming sources read the first rows of a split through the
//! `datasets-server` `/rows` endpoint and download each row's image right
//! away; the `/splits` endpoint enumerates `(config, split)` pairs for
//! identifier expansion.

use std::collections::BTreeSet;
use std::time::Duration;

use image::DynamicImage;
use serde_json::{Map, Value};

use super::{
    HubCatalog, HubConnector, HubIdentifier, HubRow, LoadMode, RowSource,
    HF_ROWS_TO_TAKE_STREAMING, IMAGE_COLUMN,
};
use crate::error::DatalensError;

const VIEWER_BASE: &str = "https://datasets-server.huggingface.co";

/// The viewer API serves at most this many rows per request.
const VIEWER_PAGE_SIZE: usize = 100;

/// Network-backed hub access, authenticated with `HF_TOKEN` when set.
#[derive(Clone, Debug, Default)]
pub struct RemoteHub {
    token: Option<String>,
}

impl RemoteHub {
    pub fn new(token: Option<String>) -> Self {
        Self { token }
    }

    /// Uses the `HF_TOKEN` environment variable, if present.
    pub fn from_env() -> Self {
        Self::new(std::env::var("HF_TOKEN").ok())
    }
}

impl HubConnector for RemoteHub {
    fn connect(&self, identifier: &HubIdentifier) -> Result<Box<dyn RowSource>, DatalensError> {
        match identifier.mode {
            LoadMode::Streaming => Ok(Box::new(ViewerRowSource::open(
                identifier,
                self.token.clone(),
            )?)),
            #[cfg(feature = "hf-parquet")]
            LoadMode::Download => Ok(Box::new(super::parquet::ParquetRowSource::open(
                identifier,
                self.token.clone(),
            )?)),
            #[cfg(not(feature = "hf-parquet"))]
            LoadMode::Download => Err(DatalensError::UnsupportedSource(format!(
                "'{identifier}' needs the 'hf-parquet' feature to download"
            ))),
        }
    }
}

impl HubCatalog for RemoteHub {
    fn config_splits(&self, repo: &str) -> Result<Vec<(String, String)>, DatalensError> {
        let client = ViewerClient::new(repo, self.token.clone());
        let splits = client.get("splits", &[])?;
        Ok(extract_config_splits(&splits))
    }
}

/// A streamed split: the first [`HF_ROWS_TO_TAKE_STREAMING`] rows.
pub struct ViewerRowSource {
    client: ViewerClient,
    features: Option<Value>,
    rows: Vec<Map<String, Value>>,
}

impl ViewerRowSource {
    /// Pages through `/rows` until the streaming cap or the end of the split.
    pub fn open(identifier: &HubIdentifier, token: Option<String>) -> Result<Self, DatalensError> {
        let client = ViewerClient::new(&identifier.repo, token);
        let mut features = None;
        let mut rows = Vec::new();

        while rows.len() < HF_ROWS_TO_TAKE_STREAMING {
            let offset = rows.len();
            let length = VIEWER_PAGE_SIZE.min(HF_ROWS_TO_TAKE_STREAMING - offset);
            let (offset_param, length_param) = (offset.to_string(), length.to_string());
            let page = client.get(
                "rows",
                &[
                    ("config", identifier.config.as_str()),
                    ("split", identifier.split.as_str()),
                    ("offset", offset_param.as_str()),
                    ("length", length_param.as_str()),
                ],
            )?;

            if features.is_none() {
                features = page.get("features").cloned();
            }

            let page_rows = extract_rows(&page);
            let fetched = page_rows.len();
            rows.extend(page_rows);
            tracing::debug!(offset, fetched, dataset = %identifier, "fetched viewer rows page");

            let total = page
                .get("num_rows_total")
                .and_then(Value::as_u64)
                .map(|total| total as usize);
            if fetched < length || total.is_some_and(|total| rows.len() >= total) {
                break;
            }
        }

        Ok(Self {
            client,
            features,
            rows,
        })
    }
}

impl RowSource for ViewerRowSource {
    fn features(&self) -> Result<Option<Value>, DatalensError> {
        Ok(self.features.clone())
    }

    fn is_streaming(&self) -> bool {
        true
    }

    fn rows(&self) -> Result<Vec<HubRow>, DatalensError> {
        self.rows
            .iter()
            .map(|row| {
                let mut fields = row.clone();
                let image_cell = fields.remove(IMAGE_COLUMN);
                let mut hub_row = HubRow::new(fields);
                if let Some(src) = image_cell
                    .as_ref()
                    .and_then(|cell| cell.get("src"))
                    .and_then(Value::as_str)
                {
                    hub_row = hub_row.with_image(self.client.download_image(src)?);
                }
                Ok(hub_row)
            })
            .collect()
    }

    fn fetch_image(&self, row_index: usize) -> Result<DynamicImage, DatalensError> {
        Err(DatalensError::UnsupportedSource(format!(
            "streamed dataset '{}' cannot seek back to row {row_index}",
            self.client.repo
        )))
    }
}

struct ViewerClient {
    repo: String,
    token: Option<String>,
    agent: ureq::Agent,
}

impl ViewerClient {
    fn new(repo: &str, token: Option<String>) -> Self {
        let config = ureq::Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(30)))
            .build();
        Self {
            repo: repo.to_string(),
            token,
            agent: config.into(),
        }
    }

    fn api_error(&self, message: impl ToString) -> DatalensError {
        DatalensError::HfApiError {
            repo_id: self.repo.clone(),
            message: message.to_string(),
        }
    }

    fn get(&self, endpoint: &str, params: &[(&str, &str)]) -> Result<Value, DatalensError> {
        let mut url = url::Url::parse(&format!("{VIEWER_BASE}/{endpoint}"))
            .map_err(|source| self.api_error(source))?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("dataset", &self.repo);
            for (key, value) in params {
                query.append_pair(key, value);
            }
        }

        let mut request = self.agent.get(url.as_str());
        if let Some(token) = self.token.as_deref() {
            request = request.header("Authorization", &format!("Bearer {token}"));
        }

        let mut response = request.call().map_err(|source| self.api_error(source))?;
        response
            .body_mut()
            .read_json::<Value>()
            .map_err(|source| self.api_error(source))
    }

    fn download_image(&self, src: &str) -> Result<DynamicImage, DatalensError> {
        let mut response = self
            .agent
            .get(src)
            .call()
            .map_err(|source| self.api_error(format!("failed downloading '{src}': {source}")))?;
        let bytes = response
            .body_mut()
            .read_to_vec()
            .map_err(|source| self.api_error(format!("failed reading '{src}': {source}")))?;
        image::load_from_memory(&bytes).map_err(|source| DatalensError::ImageDecode {
            target: src.to_string(),
            source,
        })
    }
}

fn extract_rows(page: &Value) -> Vec<Map<String, Value>> {
    page.get("rows")
        .and_then(Value::as_array)
        .map(|rows| {
            rows.iter()
                .filter_map(|item| item.get("row").and_then(Value::as_object).cloned())
                .collect()
        })
        .unwrap_or_default()
}

fn extract_config_splits(splits_json: &Value) -> Vec<(String, String)> {
    let mut seen = BTreeSet::new();
    let mut pairs = Vec::new();
    if let Some(items) = splits_json.get("splits").and_then(Value::as_array) {
        for item in items {
            let config = item.get("config").and_then(Value::as_str);
            let split = item.get("split").and_then(Value::as_str);
            if let (Some(config), Some(split)) = (config, split) {
                let pair = (config.to_string(), split.to_string());
                if seen.insert(pair.clone()) {
                    pairs.push(pair);
                }
            }
        }
    }
    pairs
}
