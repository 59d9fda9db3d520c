//! Newtype IDs for type-safe identification of dataset records.
//!
//! Source datasets disagree on what an id is: COCO uses integers, Hugging Face
//! rows may carry strings, and synthesized annotation ids look like `ann_7`.
//! [`Key`] covers both shapes; the newtypes keep image and annotation ids from
//! being mixed up.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// A source-native identifier: either an integer or a string.
///
/// Integers order before strings so integer-keyed datasets iterate in
/// numeric order.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Key {
    Int(i64),
    Str(String),
}

impl Key {
    /// Converts a JSON value into a key.
    ///
    /// Integral numbers become [`Key::Int`], strings become [`Key::Str`] and
    /// anything else is rendered as compact JSON text. Returns `None` for
    /// `null`.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Null => None,
            Value::String(text) => Some(Key::Str(text.clone())),
            Value::Number(number) => match number.as_i64() {
                Some(int) => Some(Key::Int(int)),
                None => match number.as_f64() {
                    Some(float) if float.fract() == 0.0 => Some(Key::Int(float as i64)),
                    _ => Some(Key::Str(number.to_string())),
                },
            },
            other => Some(Key::Str(other.to_string())),
        }
    }

    /// Returns the integer value, if this is an integer key.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Key::Int(int) => Some(*int),
            Key::Str(_) => None,
        }
    }
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Int(int) => write!(f, "{int}"),
            Key::Str(text) => write!(f, "{text:?}"),
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Int(int) => write!(f, "{int}"),
            Key::Str(text) => f.write_str(text),
        }
    }
}

impl From<i64> for Key {
    fn from(id: i64) -> Self {
        Key::Int(id)
    }
}

impl From<&str> for Key {
    fn from(id: &str) -> Self {
        Key::Str(id.to_string())
    }
}

impl From<String> for Key {
    fn from(id: String) -> Self {
        Key::Str(id)
    }
}

/// A unique identifier for an image in the dataset.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ImageId(pub Key);

impl ImageId {
    /// Creates a new ImageId.
    #[inline]
    pub fn new(id: impl Into<Key>) -> Self {
        Self(id.into())
    }

    /// Returns the underlying key.
    #[inline]
    pub fn key(&self) -> &Key {
        &self.0
    }
}

impl fmt::Debug for ImageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ImageId({:?})", self.0)
    }
}

impl fmt::Display for ImageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for ImageId {
    fn from(id: i64) -> Self {
        ImageId::new(id)
    }
}

impl From<&str> for ImageId {
    fn from(id: &str) -> Self {
        ImageId::new(id)
    }
}

impl From<Key> for ImageId {
    fn from(key: Key) -> Self {
        ImageId(key)
    }
}

/// A unique identifier for an annotation in the dataset.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AnnotationId(pub Key);

impl AnnotationId {
    /// Creates a new AnnotationId.
    #[inline]
    pub fn new(id: impl Into<Key>) -> Self {
        Self(id.into())
    }

    /// Returns the underlying key.
    #[inline]
    pub fn key(&self) -> &Key {
        &self.0
    }
}

impl fmt::Debug for AnnotationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AnnotationId({:?})", self.0)
    }
}

impl fmt::Display for AnnotationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for AnnotationId {
    fn from(id: i64) -> Self {
        AnnotationId::new(id)
    }
}

impl From<&str> for AnnotationId {
    fn from(id: &str) -> Self {
        AnnotationId::new(id)
    }
}

impl From<Key> for AnnotationId {
    fn from(key: Key) -> Self {
        AnnotationId(key)
    }
}

/// A unique identifier for a category in the dataset.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CategoryId(pub i64);

impl CategoryId {
    /// Creates a new CategoryId.
    #[inline]
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    /// Returns the underlying i64 value.
    #[inline]
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl fmt::Debug for CategoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CategoryId({})", self.0)
    }
}

impl fmt::Display for CategoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for CategoryId {
    fn from(id: i64) -> Self {
        CategoryId::new(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_key_from_value() {
        assert_eq!(Key::from_value(&json!(3)), Some(Key::Int(3)));
        assert_eq!(Key::from_value(&json!(3.0)), Some(Key::Int(3)));
        assert_eq!(Key::from_value(&json!("abc")), Some(Key::Str("abc".into())));
        assert_eq!(Key::from_value(&json!(1.5)), Some(Key::Str("1.5".into())));
        assert_eq!(Key::from_value(&json!([1, 2])), Some(Key::Str("[1,2]".into())));
        assert_eq!(Key::from_value(&Value::Null), None);
    }

    #[test]
    fn test_key_ordering() {
        assert!(Key::Int(10) < Key::Int(11));
        assert!(Key::Int(i64::MAX) < Key::Str("a".into()));
        assert!(ImageId::from(1i64) < ImageId::from(2i64));
        assert!(CategoryId(10) > CategoryId(5));
    }

    #[test]
    fn test_id_display() {
        assert_eq!(ImageId::from(42i64).to_string(), "42");
        assert_eq!(AnnotationId::from("ann_3").to_string(), "ann_3");
        assert_eq!(format!("{:?}", AnnotationId::from("ann_3")), "AnnotationId(\"ann_3\")");
        assert_eq!(format!("{:?}", CategoryId(7)), "CategoryId(7)");
    }

    #[test]
    fn test_id_hash() {
        use std::collections::HashSet;
        let mut set = HashSet::new();
        set.insert(ImageId::from(1i64));
        set.insert(ImageId::from(1i64));
        set.insert(ImageId::from("1"));
        assert_eq!(set.len(), 2);
    }
}
