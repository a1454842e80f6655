//! Error types and result types for entity layer operations.
//!
//! The layer is fail-fast: no retries and no partial-failure recovery. Misses
//! (get/update/set against a nonexistent id) are modeled as `None` results,
//! never as errors.

use bson::error::Error as BsonError;
use serde_json::Error as SerdeJsonError;
use thiserror::Error;

/// Represents all possible errors surfaced by the entity layer.
#[derive(Error, Debug)]
pub enum EntityLayerError {
    /// Entity data failed schema validation during hydration (missing or
    /// mistyped fields, wrong schema version tag).
    #[error("Validation error: {0}")]
    Validation(String),
    /// A service was constructed against a misdeclared entity model.
    /// Detected at construction time and fatal.
    #[error("Configuration error: {0}")]
    Configuration(String),
    /// Failure reported by the backing repository, propagated unchanged.
    #[error("Repository error: {0}")]
    Repository(String),
    /// The named search index does not exist on the collection. Raised by the
    /// repository collaborator, not synthesized locally.
    #[error("Search index not found: {0}")]
    SearchIndexNotFound(String),
    /// Serialization error when converting between record formats (BSON, JSON).
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// A specialized `Result` type for entity layer operations.
pub type EntityLayerResult<T> = Result<T, EntityLayerError>;

impl From<BsonError> for EntityLayerError {
    fn from(err: BsonError) -> Self {
        EntityLayerError::Serialization(err.to_string())
    }
}

impl From<SerdeJsonError> for EntityLayerError {
    fn from(err: SerdeJsonError) -> Self {
        EntityLayerError::Serialization(err.to_string())
    }
}
