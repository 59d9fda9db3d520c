//! Normalization of Hugging Face rows into the id-indexed [`Dataset`].
//!
//! HF detection datasets disagree on nearly everything: whether `objects` is
//! column- or row-oriented, which key holds the category, whether categories
//! are class-label indices or free-form names, and whether annotations have
//! ids at all. The row pass records what it sees; category names that are not
//! known yet stay [`CategoryRef::Pending`] until a final reconciliation step
//! assigns ids and collapses every reference to a plain [`CategoryId`].

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use image::DynamicImage;
use serde_json::{Map, Value};

use super::features::{discover_labels, CATEGORY_KEYS};
use crate::dataset::{
    AnnotationId, AnnotationRecord, CategoryId, CategoryRecord, Dataset, ImageId, ImageLocation,
    ImageRecord, Key,
};

/// One dataset row as handed over by a row source.
#[derive(Clone, Debug, Default)]
pub struct HubRow {
    /// Row columns, without the image column.
    pub fields: Map<String, Value>,
    /// Decoded image for sources that cannot fetch it again later.
    pub image: Option<DynamicImage>,
}

impl HubRow {
    /// Creates a row without an inline image.
    pub fn new(fields: Map<String, Value>) -> Self {
        Self {
            fields,
            image: None,
        }
    }

    /// Attaches an inline image.
    pub fn with_image(mut self, image: DynamicImage) -> Self {
        self.image = Some(image);
        self
    }
}

/// An annotation's category while the row pass is still running.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CategoryRef {
    /// Already a known category id.
    Resolved(CategoryId),
    /// A name (or non-id value) waiting for an id.
    Pending(String),
}

#[derive(Debug)]
struct PendingAnnotation {
    image_id: ImageId,
    category: CategoryRef,
    bbox: Value,
}

/// Builds a [`Dataset`] from a feature schema and rows.
///
/// Rows carrying an inline image keep it; all other rows are recorded as
/// [`ImageLocation::Row`] with their ordinal so the image can be fetched
/// lazily.
pub fn normalize_rows<I>(features: Option<&Value>, rows: I) -> Dataset
where
    I: IntoIterator<Item = HubRow>,
{
    let mut normalizer = Normalizer::new(features);
    for (idx, row) in rows.into_iter().enumerate() {
        normalizer.push_row(idx, row);
    }
    normalizer.finish()
}

struct Normalizer {
    images: BTreeMap<ImageId, ImageRecord>,
    categories: BTreeMap<CategoryId, CategoryRecord>,
    annotations: BTreeMap<AnnotationId, PendingAnnotation>,
    pending_names: Vec<String>,
    pending_seen: HashSet<String>,
    synthesized: u64,
}

impl Normalizer {
    fn new(features: Option<&Value>) -> Self {
        let categories = features
            .and_then(discover_labels)
            .unwrap_or_default()
            .into_iter()
            .enumerate()
            .map(|(idx, name)| {
                let record = CategoryRecord::new(idx as i64, name);
                (record.id, record)
            })
            .collect();

        Self {
            images: BTreeMap::new(),
            categories,
            annotations: BTreeMap::new(),
            pending_names: Vec::new(),
            pending_seen: HashSet::new(),
            synthesized: 0,
        }
    }

    fn push_row(&mut self, idx: usize, row: HubRow) {
        let HubRow { fields, image } = row;

        let key = ["id", "image_id"]
            .iter()
            .find_map(|field| fields.get(*field).and_then(Key::from_value))
            .unwrap_or(Key::Int(idx as i64));
        let image_id = ImageId(key);

        let location = match image {
            Some(image) => ImageLocation::Inline(Arc::new(image)),
            None => ImageLocation::Row(idx),
        };
        let mut record = ImageRecord::new(image_id.clone(), location);
        record.width = read_dimension(&fields, "width");
        record.height = read_dimension(&fields, "height");
        self.images.insert(image_id.clone(), record);

        let Some(objects) = fields.get("objects") else {
            return;
        };
        let columns = match objects {
            Value::Object(columns) => columns.clone(),
            Value::Array(rows) => pivot_objects(rows),
            _ => return,
        };

        let bboxes = columns
            .get("bbox")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        let ids = self.annotation_ids(&columns, bboxes.len());
        let categories = CATEGORY_KEYS
            .iter()
            .filter_map(|key| columns.get(*key).and_then(Value::as_array))
            .find(|values| !values.is_empty())
            .cloned()
            .unwrap_or_default();

        for ((ann_id, bbox), category) in ids.into_iter().zip(bboxes).zip(categories.iter()) {
            let category = self.category_ref(category);
            self.annotations.insert(
                ann_id,
                PendingAnnotation {
                    image_id: image_id.clone(),
                    category,
                    bbox,
                },
            );
        }
    }

    /// The objects' own ids when complete, otherwise one synthesized
    /// `ann_<n>` id per bbox from a dataset-wide counter.
    fn annotation_ids(&mut self, columns: &Map<String, Value>, count: usize) -> Vec<AnnotationId> {
        let own_ids = columns
            .get("id")
            .and_then(Value::as_array)
            .filter(|ids| !ids.is_empty())
            .and_then(|ids| {
                ids.iter()
                    .map(|id| Key::from_value(id).map(AnnotationId))
                    .collect::<Option<Vec<_>>>()
            });

        own_ids.unwrap_or_else(|| {
            (0..count)
                .map(|_| {
                    self.synthesized += 1;
                    AnnotationId::new(format!("ann_{}", self.synthesized))
                })
                .collect()
        })
    }

    fn category_ref(&mut self, value: &Value) -> CategoryRef {
        if let Some(Key::Int(id)) = Key::from_value(value) {
            let id = CategoryId(id);
            if self.categories.contains_key(&id) {
                return CategoryRef::Resolved(id);
            }
        }

        let name = match value {
            Value::String(name) => name.clone(),
            other => other.to_string(),
        };
        if self.pending_seen.insert(name.clone()) {
            self.pending_names.push(name.clone());
        }
        CategoryRef::Pending(name)
    }

    fn finish(mut self) -> Dataset {
        if !self.pending_names.is_empty() {
            self.reconcile_categories();
        }

        // Ascending ids: on duplicate names the newest category wins.
        let name_to_id: HashMap<&str, CategoryId> = self
            .categories
            .values()
            .map(|cat| (cat.name.as_str(), cat.id))
            .collect();

        let annotations = self
            .annotations
            .into_iter()
            .filter_map(|(id, ann)| {
                let category_id = match ann.category {
                    CategoryRef::Resolved(id) => id,
                    CategoryRef::Pending(name) => *name_to_id.get(name.as_str())?,
                };
                let record = AnnotationRecord::new(id.clone(), ann.image_id, category_id, ann.bbox);
                Some((id, record))
            })
            .collect();

        Dataset {
            images: self.images,
            annotations,
            categories: self.categories,
        }
    }

    /// Gives every pending name a new id, counting up from the largest
    /// existing id, in first-seen order. A name shadowing a seeded one still
    /// gets its own id.
    fn reconcile_categories(&mut self) {
        let mut next_id = self
            .categories
            .keys()
            .max()
            .map(CategoryId::as_i64)
            .unwrap_or(0);

        for name in std::mem::take(&mut self.pending_names) {
            next_id += 1;
            let record = CategoryRecord::new(next_id, name);
            self.categories.insert(record.id, record);
        }

        tracing::debug!(
            categories = self.categories.len(),
            "reconciled categories discovered during row pass"
        );
    }
}

/// Turns row-oriented objects (`[{"bbox": .., "category": ..}, ..]`) into
/// parallel `id`, `bbox` and category columns.
///
/// The category key is the first of [`CATEGORY_KEYS`] present in the first
/// object, defaulting to `category`.
pub fn pivot_objects(rows: &[Value]) -> Map<String, Value> {
    let category_key = rows
        .first()
        .and_then(Value::as_object)
        .and_then(|first| CATEGORY_KEYS.iter().find(|key| first.contains_key(**key)))
        .copied()
        .unwrap_or(CATEGORY_KEYS[0]);

    ["id", "bbox", category_key]
        .into_iter()
        .map(|key| {
            let column = rows
                .iter()
                .map(|obj| obj.get(key).cloned().unwrap_or(Value::Null))
                .collect();
            (key.to_string(), Value::Array(column))
        })
        .collect()
}

fn read_dimension(fields: &Map<String, Value>, key: &str) -> Option<u32> {
    fields
        .get(key)
        .and_then(Value::as_u64)
        .and_then(|value| u32::try_from(value).ok())
}
