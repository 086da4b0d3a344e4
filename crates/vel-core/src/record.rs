//! # Record Envelope
//!
//! Every synced entity travels as a JSON object with a fixed envelope and
//! free-form payload fields next to it.
//!
//! ## Wire Shape
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  {                                                                      │
//! │    "id": "wp-108",          ◄── envelope: identifier                    │
//! │    "version": 4,            ◄── envelope: monotonically increasing      │
//! │    "deleted": false,        ◄── envelope: tombstone flag (optional)     │
//! │    "collection": "wallpapers", ◄── envelope: optional                   │
//! │    "title": "Vel",          ◄── payload (flattened)                     │
//! │    "imageUrl": "https://…"  ◄── payload (flattened)                     │
//! │  }                                                                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The payload defaults to a dynamic JSON map. Callers that know the shape of
//! a collection can re-read records as `Record<T>` with [`Record::into_typed`].

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{CoreError, CoreResult};

/// Dynamic payload: every non-envelope field of the record.
pub type Payload = Map<String, Value>;

/// A versioned entity belonging to a named collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record<P = Payload> {
    /// Unique identifier within the collection.
    pub id: String,

    /// Version number; the highest version for an id is authoritative.
    pub version: i64,

    /// Tombstone flag. Tombstoned records are compacted away on merge.
    #[serde(default)]
    pub deleted: bool,

    /// Name of the owning collection, when the backend includes it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collection: Option<String>,

    /// Payload fields, flattened next to the envelope.
    #[serde(flatten)]
    pub payload: P,
}

impl Record {
    /// Creates a live record with an empty payload.
    pub fn new(id: impl Into<String>, version: i64) -> Self {
        Record {
            id: id.into(),
            version,
            deleted: false,
            collection: None,
            payload: Payload::new(),
        }
    }

    /// Creates a tombstone for `id` at `version`.
    pub fn tombstone(id: impl Into<String>, version: i64) -> Self {
        Record {
            deleted: true,
            ..Record::new(id, version)
        }
    }

    /// Adds a payload field.
    ///
    /// Envelope keys (`id`, `version`, `deleted`, `collection`) belong in the
    /// struct fields, not the payload.
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.payload.insert(key.into(), value.into());
        self
    }

    /// Returns a payload field by name.
    pub fn field(&self, key: &str) -> Option<&Value> {
        self.payload.get(key)
    }

    /// Re-reads this record with a typed payload.
    ///
    /// ## Example
    /// ```rust
    /// use serde::Deserialize;
    /// use vel_core::Record;
    ///
    /// #[derive(Deserialize)]
    /// struct Banner {
    ///     title: String,
    /// }
    ///
    /// let record = Record::new("b-1", 3).with_field("title", "Thaipusam");
    /// let banner = record.into_typed::<Banner>().unwrap();
    /// assert_eq!(banner.payload.title, "Thaipusam");
    /// ```
    pub fn into_typed<T: DeserializeOwned>(self) -> CoreResult<Record<T>> {
        let id = self.id.clone();
        let value = serde_json::to_value(&self).map_err(|e| CoreError::Serialization {
            id: id.clone(),
            reason: e.to_string(),
        })?;
        serde_json::from_value(value).map_err(|e| CoreError::TypedView {
            id,
            reason: e.to_string(),
        })
    }
}

impl<P> Record<P> {
    /// Returns true unless the record is a tombstone.
    pub fn is_live(&self) -> bool {
        !self.deleted
    }
}

impl<P: Serialize> Record<P> {
    /// Converts a typed record back into the dynamic representation.
    pub fn into_dynamic(self) -> CoreResult<Record> {
        let id = self.id.clone();
        serde_json::to_value(&self)
            .and_then(serde_json::from_value)
            .map_err(|e| CoreError::Serialization {
                id,
                reason: e.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug, Deserialize, Serialize, PartialEq)]
    #[serde(rename_all = "camelCase")]
    struct Wallpaper {
        title: String,
        image_url: String,
    }

    #[test]
    fn test_deleted_defaults_to_false() {
        let record: Record = serde_json::from_value(json!({
            "id": "a",
            "version": 1,
            "title": "old"
        }))
        .unwrap();

        assert!(!record.deleted);
        assert!(record.is_live());
        assert_eq!(record.field("title"), Some(&json!("old")));
        assert_eq!(record.collection, None);
    }

    #[test]
    fn test_envelope_is_not_duplicated_in_payload() {
        let record: Record = serde_json::from_value(json!({
            "id": "a",
            "version": 2,
            "deleted": true,
            "collection": "banners",
            "title": "gone"
        }))
        .unwrap();

        assert!(record.deleted);
        assert_eq!(record.collection.as_deref(), Some("banners"));
        assert_eq!(record.payload.len(), 1);
        assert!(record.payload.contains_key("title"));
    }

    #[test]
    fn test_serialized_shape_is_flat() {
        let record = Record::new("wp-1", 4).with_field("title", "Vel");
        let value = serde_json::to_value(&record).unwrap();

        assert_eq!(
            value,
            json!({ "id": "wp-1", "version": 4, "deleted": false, "title": "Vel" })
        );
    }

    #[test]
    fn test_typed_view() {
        let record = Record::new("wp-1", 4)
            .with_field("title", "Palani")
            .with_field("imageUrl", "https://cdn.example/palani.jpg");

        let typed = record.clone().into_typed::<Wallpaper>().unwrap();
        assert_eq!(typed.id, "wp-1");
        assert_eq!(typed.version, 4);
        assert_eq!(typed.payload.title, "Palani");

        let back = typed.into_dynamic().unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn test_typed_view_rejects_mismatched_payload() {
        let record = Record::new("wp-2", 1).with_field("title", "no image");
        let err = record.into_typed::<Wallpaper>().unwrap_err();
        assert!(matches!(err, CoreError::TypedView { ref id, .. } if id == "wp-2"));
    }
}
