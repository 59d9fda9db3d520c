//! Resolving identifiers to long-lived dataset instances.
//!
//! An identifier is either a path to a COCO-shaped JSON file or a hub
//! reference (`repo@config@split@mode`). Each distinct identifier is loaded
//! once and shared for the rest of the process; files changed on disk after
//! that are not picked up again.

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex, OnceLock, PoisonError};

use crate::dataset::DatasetSource;
use crate::error::DatalensError;
use crate::hub::{HubCatalog, HubConnector, HubIdentifier, HuggingFaceDataset, LoadMode};

/// Keys that must all appear, quoted, in a COCO-shaped file.
const COCO_SIGNATURE: [&str; 3] = ["\"images\"", "\"categories\"", "\"annotations\""];

/// Whether `path` is an existing file that looks like a COCO archive.
///
/// This is a substring probe, not a parse: a file mentioning all three keys
/// anywhere is accepted.
pub fn is_coco_dataset(path: &Path) -> bool {
    if !path.is_file() {
        return false;
    }
    match fs::read_to_string(path) {
        Ok(text) => COCO_SIGNATURE.iter().all(|key| text.contains(key)),
        Err(_) => false,
    }
}

/// Opens a COCO archive with the richest reader compiled in.
pub fn make_coco_dataset(path: &Path) -> Result<Arc<dyn DatasetSource>, DatalensError> {
    #[cfg(feature = "kwcoco")]
    {
        Ok(Arc::new(crate::dataset::KwcocoDataset::open(path)?))
    }
    #[cfg(not(feature = "kwcoco"))]
    {
        Ok(Arc::new(crate::dataset::CocoJsonDataset::open(path)?))
    }
}

/// Memoized identifier-to-dataset resolution.
pub struct DatasetRegistry {
    connector: Box<dyn HubConnector>,
    loaded: Mutex<HashMap<String, Arc<dyn DatasetSource>>>,
}

impl Default for DatasetRegistry {
    fn default() -> Self {
        Self::new(default_connector())
    }
}

impl DatasetRegistry {
    pub fn new(connector: Box<dyn HubConnector>) -> Self {
        Self {
            connector,
            loaded: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the dataset for `identifier`, loading it on first use.
    ///
    /// The same identifier always yields the same instance. A failed load is
    /// not remembered, so a later call retries.
    pub fn get_or_load(&self, identifier: &str) -> Result<Arc<dyn DatasetSource>, DatalensError> {
        let mut loaded = self.loaded.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(dataset) = loaded.get(identifier) {
            return Ok(Arc::clone(dataset));
        }

        let dataset = self.load(identifier)?;
        loaded.insert(identifier.to_string(), Arc::clone(&dataset));
        Ok(dataset)
    }

    pub fn len(&self) -> usize {
        self.loaded
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn load(&self, identifier: &str) -> Result<Arc<dyn DatasetSource>, DatalensError> {
        let path = Path::new(identifier);
        if is_coco_dataset(path) {
            let absolute = fs::canonicalize(path)?;
            tracing::info!(path = %absolute.display(), "loading COCO dataset");
            return make_coco_dataset(&absolute);
        }

        let hub_id = HubIdentifier::parse(identifier)?;
        tracing::info!(dataset = %hub_id, "loading hub dataset");
        let source = self.connector.connect(&hub_id)?;
        Ok(Arc::new(HuggingFaceDataset::from_source(
            hub_id.to_string(),
            source,
        )?))
    }
}

#[cfg(feature = "hf-remote")]
fn default_connector() -> Box<dyn HubConnector> {
    Box::new(crate::hub::remote::RemoteHub::from_env())
}

#[cfg(not(feature = "hf-remote"))]
fn default_connector() -> Box<dyn HubConnector> {
    Box::new(crate::hub::OfflineHub)
}

/// The process-wide registry.
pub fn global() -> &'static DatasetRegistry {
    static REGISTRY: OnceLock<DatasetRegistry> = OnceLock::new();
    REGISTRY.get_or_init(DatasetRegistry::default)
}

/// Resolves `identifier` through the process-wide registry.
pub fn get_dataset(identifier: &str) -> Result<Arc<dyn DatasetSource>, DatalensError> {
    global().get_or_load(identifier)
}

/// The catalog matching [`global`]'s connector.
#[cfg(feature = "hf-remote")]
pub fn default_catalog() -> Box<dyn HubCatalog> {
    Box::new(crate::hub::remote::RemoteHub::from_env())
}

/// The catalog matching [`global`]'s connector.
#[cfg(not(feature = "hf-remote"))]
pub fn default_catalog() -> Box<dyn HubCatalog> {
    Box::new(crate::hub::OfflineHub)
}

/// Turns user-supplied identifiers into ones [`get_dataset`] accepts.
///
/// COCO paths pass through unchanged. Anything else names a hub repository
/// (only the part before the first `@` is used) and expands to one
/// `repo@config@split@mode` identifier per `(config, split)` pair the catalog
/// lists, in catalog order.
pub fn expand_identifiers(
    identifiers: &[String],
    mode: LoadMode,
    catalog: &dyn HubCatalog,
) -> Result<Vec<String>, DatalensError> {
    let mut expanded = Vec::new();
    for identifier in identifiers {
        if is_coco_dataset(Path::new(identifier)) {
            expanded.push(identifier.clone());
            continue;
        }

        let repo = identifier.split('@').next().unwrap_or_default();
        if repo.trim().is_empty() {
            return Err(DatalensError::InvalidIdentifier {
                identifier: identifier.clone(),
                message: "missing repository".to_string(),
            });
        }

        let pairs = catalog.config_splits(repo)?;
        tracing::debug!(repo, pairs = pairs.len(), "expanded hub identifier");
        expanded.extend(pairs.into_iter().map(|(config, split)| {
            HubIdentifier {
                repo: repo.to_string(),
                config,
                split,
                mode,
            }
            .to_string()
        }));
    }
    Ok(expanded)
}
