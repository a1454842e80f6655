//! Core traits for entity records and their hydration lifecycle.
//!
//! An entity is a versioned document with a monotonic `updated_at` timestamp
//! (milliseconds since epoch), a fixed `version` tag, and model-specific
//! fields. This module provides the [`Entity`] trait that record types
//! implement and the [`EntityExt`] extension trait that handles hydration,
//! serialization, and partial-update merging.

use bson::{Bson, Document, de::deserialize_from_bson, ser::serialize_to_bson};
use chrono::Utc;
use serde::{Serialize, de::DeserializeOwned};
use serde_json::{Value, from_value, to_value};

use crate::error::{EntityLayerError, EntityLayerResult};

/// Current time in milliseconds since the Unix epoch.
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Core trait that all entity records must implement.
///
/// Every entity declares the collection it lives in, a fixed schema version
/// literal, a caller-supplied string identifier, and an `updated_at` field
/// the layer stamps on hydration and on every update.
///
/// # Example
///
/// ```ignore
/// use entitylayer::entity::Entity;
/// use serde::{Serialize, Deserialize};
///
/// #[derive(Debug, Clone, Serialize, Deserialize)]
/// pub struct Vehicle {
///     pub id: String,
///     #[serde(default = "Vehicle::default_version")]
///     pub version: String,
///     #[serde(default)]
///     pub updated_at: i64,
///     pub make: String,
/// }
///
/// impl Entity for Vehicle {
///     fn collection_name() -> &'static str { "vehicles" }
///     fn schema_version() -> &'static str { "1.0.0" }
///     fn id(&self) -> &str { &self.id }
///     fn updated_at(&self) -> i64 { self.updated_at }
///     fn set_updated_at(&mut self, timestamp: i64) { self.updated_at = timestamp; }
/// }
/// ```
///
/// The `#[derive(Entity)]` macro from `entitylayer-macros` generates this impl
/// from an `#[entity(collection = "...", version = "...")]` attribute.
pub trait Entity: Serialize + DeserializeOwned + Send + Sync + Clone + 'static {
    /// Returns the name of the collection this entity belongs to.
    fn collection_name() -> &'static str;

    /// Returns the fixed schema version literal for this entity type.
    fn schema_version() -> &'static str;

    /// Returns this record's unique identifier.
    fn id(&self) -> &str;

    /// Returns the last-update timestamp in milliseconds since epoch.
    fn updated_at(&self) -> i64;

    /// Overwrites the last-update timestamp.
    fn set_updated_at(&mut self, timestamp: i64);
}

/// Extension trait providing hydration and serialization for entities.
///
/// Automatically implemented for all types that implement [`Entity`].
pub trait EntityExt: Entity {
    /// Converts this entity to a BSON document for storage.
    fn to_document(&self) -> EntityLayerResult<Document>;

    /// Deserializes an entity from a BSON document without applying hydration
    /// defaults. Fails with a `Validation` error on schema mismatch.
    fn from_document(document: Document) -> EntityLayerResult<Self>;

    /// Converts this entity to a JSON value.
    fn to_json(&self) -> EntityLayerResult<Value>;

    /// Deserializes an entity from a JSON value.
    fn from_json(value: Value) -> EntityLayerResult<Self>;

    /// Hydrates an entity from raw record data, applying schema defaults.
    ///
    /// - `version` defaults to [`Entity::schema_version`]; a conflicting tag
    ///   is a `Validation` error.
    /// - `updated_at` defaults to `created_at` when present, otherwise to the
    ///   current time in milliseconds. A non-positive `updated_at` is
    ///   rejected.
    fn hydrate(document: Document) -> EntityLayerResult<Self>;

    /// Applies a sparse delta to this entity, producing a validated merge.
    ///
    /// The delta is shallow-merged over the current field values, then
    /// `updated_at` is stamped with a fresh timestamp that is strictly
    /// greater than the previous one, and the merge result is re-validated.
    /// On success the live instance is replaced with the validated record;
    /// on failure it is left untouched.
    fn apply_update(&mut self, delta: Document) -> EntityLayerResult<()>;
}

impl<E: Entity> EntityExt for E {
    fn to_document(&self) -> EntityLayerResult<Document> {
        match serialize_to_bson(self)? {
            Bson::Document(document) => Ok(document),
            other => Err(EntityLayerError::Serialization(format!(
                "entity serialized to non-document BSON value: {:?}",
                other.element_type()
            ))),
        }
    }

    fn from_document(document: Document) -> EntityLayerResult<Self> {
        deserialize_from_bson(Bson::Document(document))
            .map_err(|err| EntityLayerError::Validation(err.to_string()))
    }

    fn to_json(&self) -> EntityLayerResult<Value> {
        Ok(to_value(self)?)
    }

    fn from_json(value: Value) -> EntityLayerResult<Self> {
        from_value(value).map_err(|err| EntityLayerError::Validation(err.to_string()))
    }

    fn hydrate(mut document: Document) -> EntityLayerResult<Self> {
        match document.get_str("version") {
            Ok(tag) if tag != Self::schema_version() => {
                return Err(EntityLayerError::Validation(format!(
                    "schema version mismatch for collection {}: expected {:?}, got {:?}",
                    Self::collection_name(),
                    Self::schema_version(),
                    tag
                )));
            }
            Ok(_) => {}
            Err(_) => {
                document.insert("version", Self::schema_version());
            }
        }

        if !document.contains_key("updated_at") {
            let fallback = document
                .get("created_at")
                .cloned()
                .unwrap_or_else(|| Bson::Int64(now_millis()));
            document.insert("updated_at", fallback);
        }

        let entity = Self::from_document(document)?;

        if entity.updated_at() <= 0 {
            return Err(EntityLayerError::Validation(format!(
                "updated_at must be a positive millisecond timestamp, got {}",
                entity.updated_at()
            )));
        }

        Ok(entity)
    }

    fn apply_update(&mut self, delta: Document) -> EntityLayerResult<()> {
        let mut merged = self.to_document()?;

        for (key, value) in delta {
            merged.insert(key, value);
        }

        // Strictly monotonic even when two updates land in the same millisecond.
        let stamp = now_millis().max(self.updated_at() + 1);
        merged.insert("updated_at", Bson::Int64(stamp));

        *self = Self::from_document(merged)?;

        Ok(())
    }
}
