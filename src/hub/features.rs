//! Hugging Face feature schemas and class-label discovery.
//!
//! HF describes columns with a JSON feature tree (the `features` block of
//! `dataset_info`, parquet `huggingface` metadata, or the viewer API). We parse
//! it into a small closed [`Feature`] enum and walk that to find class names.

use std::collections::BTreeMap;

use serde_json::{Map, Value};

/// Keys that may carry an object's category, in priority order.
pub const CATEGORY_KEYS: [&str; 3] = ["category", "category_id", "label"];

/// The feature shapes that matter for label discovery.
#[derive(Clone, Debug, PartialEq)]
pub enum Feature {
    /// A class label with its ordered names.
    ClassLabel { names: Vec<String> },
    /// `Sequence`, `List` or `LargeList` of an inner feature.
    Sequence(Box<Feature>),
    /// A literal JSON list `[feature]`; only the first item describes the items.
    ListLiteral(Vec<Feature>),
    /// A dict-like feature with named fields.
    Struct(BTreeMap<String, Feature>),
    /// Anything else (`Value`, `Image`, unknown types), tagged by `_type`.
    Scalar(String),
}

impl Feature {
    /// Parses a JSON feature description. Never fails; unrecognized shapes
    /// become [`Feature::Scalar`].
    pub fn parse(value: &Value) -> Self {
        match value {
            Value::Array(items) => Feature::ListLiteral(items.iter().map(Feature::parse).collect()),
            Value::Object(obj) => parse_object(obj),
            _ => Feature::Scalar("unknown".to_string()),
        }
    }

    /// Parses a top-level `features` block.
    ///
    /// Accepts the dict form (`{"image": {...}, "objects": {...}}`) and the
    /// viewer API's list form (`[{"name": "image", "type": {...}}, ...]`).
    pub fn parse_schema(value: &Value) -> BTreeMap<String, Feature> {
        match value {
            Value::Object(obj) => obj
                .iter()
                .map(|(name, feature)| (name.clone(), Feature::parse(feature)))
                .collect(),
            Value::Array(items) => items
                .iter()
                .filter_map(|item| {
                    let name = item.get("name")?.as_str()?;
                    let feature = item.get("type")?;
                    Some((name.to_string(), Feature::parse(feature)))
                })
                .collect(),
            _ => BTreeMap::new(),
        }
    }

    /// Walks the feature for class names.
    ///
    /// Class labels yield their names, sequences and lists recurse into their
    /// item feature, and structs recurse into the first present of
    /// [`CATEGORY_KEYS`]. Returns `None` when the walk finds nothing.
    pub fn label_names(&self) -> Option<Vec<String>> {
        match self {
            Feature::ClassLabel { names } => Some(names.clone()),
            Feature::Sequence(inner) => inner.label_names(),
            Feature::ListLiteral(items) => items.first()?.label_names(),
            Feature::Struct(fields) => CATEGORY_KEYS
                .iter()
                .find_map(|key| fields.get(*key))?
                .label_names(),
            Feature::Scalar(_) => None,
        }
    }
}

fn parse_object(obj: &Map<String, Value>) -> Feature {
    if let Some(names) = obj.get("names").and_then(Value::as_array) {
        return Feature::ClassLabel {
            names: names.iter().map(display_name).collect(),
        };
    }

    let Some(type_name) = obj.get("_type").and_then(Value::as_str) else {
        return Feature::Struct(
            obj.iter()
                .map(|(name, feature)| (name.clone(), Feature::parse(feature)))
                .collect(),
        );
    };

    match (type_name, obj.get("feature")) {
        ("Sequence" | "List" | "LargeList", Some(inner)) => {
            Feature::Sequence(Box::new(Feature::parse(inner)))
        }
        _ => Feature::Scalar(type_name.to_string()),
    }
}

fn display_name(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

/// Discovers class names from a dataset's features block.
///
/// Looks under `labels` first, then `objects`. Empty name lists count as not
/// found.
pub fn discover_labels(features: &Value) -> Option<Vec<String>> {
    let schema = Feature::parse_schema(features);
    ["labels", "objects"]
        .iter()
        .filter_map(|column| schema.get(*column))
        .filter_map(Feature::label_names)
        .find(|names| !names.is_empty())
}
