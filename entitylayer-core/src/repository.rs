//! Repository abstraction the entity layer is built on.
//!
//! The [`Repository`] trait is the only external boundary of this crate:
//! every service operation is a single round trip (or two, for count+fetch
//! pairs) through it. Implementations provide the concrete store; see the
//! `entitylayer-memory` and `entitylayer-mongodb` crates. The layer itself
//! holds no mutable state, performs no retries, and leaves cancellation and
//! timeouts entirely to the implementation.

use async_trait::async_trait;
use bson::{Bson, Document};
use std::fmt::Debug;

use crate::{condition::{Condition, Query}, error::EntityLayerResult};

/// Abstract interface for record stores.
///
/// Mutation operations return the number of matched records so callers can
/// distinguish "update hit nothing" (a signal, not an error) from a store
/// failure.
///
/// # Thread safety
///
/// Implementations must be `Send + Sync` and support concurrent callers; the
/// ordering guarantees between concurrent operations are whatever the backing
/// store provides natively.
#[async_trait]
pub trait Repository: Send + Sync + Debug {
    /// Fetches a record by id. `None` when the record does not exist.
    async fn get(&self, collection: &str, id: &str) -> EntityLayerResult<Option<Document>>;

    /// Persists a new record. The record carries its own `id` field.
    async fn create(&self, collection: &str, record: Document) -> EntityLayerResult<()>;

    /// Field-merges `record` onto the stored record with the given id.
    /// Returns the matched count (0 when the id does not exist).
    async fn update(&self, collection: &str, id: &str, record: Document)
    -> EntityLayerResult<u64>;

    /// Replaces the stored record with the given id entirely.
    /// Returns the matched count.
    async fn replace(&self, collection: &str, id: &str, record: Document)
    -> EntityLayerResult<u64>;

    /// Field-merges `data` onto every record matching `filter`.
    /// Returns the matched count.
    async fn update_many(
        &self,
        collection: &str,
        filter: &Condition,
        data: Document,
    ) -> EntityLayerResult<u64>;

    /// Appends a value to an array field of the record with the given id.
    async fn push_array(
        &self,
        collection: &str,
        id: &str,
        key: &str,
        value: Bson,
    ) -> EntityLayerResult<u64>;

    /// Appends multiple values to an array field, optionally skipping values
    /// already present (`avoid_duplication`; "already present" semantics are
    /// store-defined) and field-merging `extra` onto the record.
    async fn push_array_many(
        &self,
        collection: &str,
        id: &str,
        key: &str,
        values: Vec<Bson>,
        extra: Option<Document>,
        avoid_duplication: bool,
    ) -> EntityLayerResult<u64>;

    /// Removes all occurrences of a value from an array field, optionally
    /// field-merging `extra` onto the record.
    async fn pull_array(
        &self,
        collection: &str,
        id: &str,
        key: &str,
        value: Bson,
        extra: Option<Document>,
    ) -> EntityLayerResult<u64>;

    /// Runs a plain indexed query: filter, sort, projection, skip/limit.
    async fn query(&self, collection: &str, query: Query) -> EntityLayerResult<Vec<Document>>;

    /// Counts records matching the filter (all records when `None`),
    /// independent of any window.
    async fn count(&self, collection: &str, filter: Option<&Condition>)
    -> EntityLayerResult<u64>;

    /// Runs an aggregation pipeline against the collection. Used by the
    /// search executor for `$search`/`$facet` pipelines.
    async fn aggregate(
        &self,
        collection: &str,
        pipeline: Vec<Document>,
    ) -> EntityLayerResult<Vec<Document>>;
}

#[async_trait]
impl<R> Repository for &R
where
    R: Repository,
{
    async fn get(&self, collection: &str, id: &str) -> EntityLayerResult<Option<Document>> {
        (*self).get(collection, id).await
    }

    async fn create(&self, collection: &str, record: Document) -> EntityLayerResult<()> {
        (*self).create(collection, record).await
    }

    async fn update(
        &self,
        collection: &str,
        id: &str,
        record: Document,
    ) -> EntityLayerResult<u64> {
        (*self)
            .update(collection, id, record)
            .await
    }

    async fn replace(
        &self,
        collection: &str,
        id: &str,
        record: Document,
    ) -> EntityLayerResult<u64> {
        (*self)
            .replace(collection, id, record)
            .await
    }

    async fn update_many(
        &self,
        collection: &str,
        filter: &Condition,
        data: Document,
    ) -> EntityLayerResult<u64> {
        (*self)
            .update_many(collection, filter, data)
            .await
    }

    async fn push_array(
        &self,
        collection: &str,
        id: &str,
        key: &str,
        value: Bson,
    ) -> EntityLayerResult<u64> {
        (*self)
            .push_array(collection, id, key, value)
            .await
    }

    async fn push_array_many(
        &self,
        collection: &str,
        id: &str,
        key: &str,
        values: Vec<Bson>,
        extra: Option<Document>,
        avoid_duplication: bool,
    ) -> EntityLayerResult<u64> {
        (*self)
            .push_array_many(collection, id, key, values, extra, avoid_duplication)
            .await
    }

    async fn pull_array(
        &self,
        collection: &str,
        id: &str,
        key: &str,
        value: Bson,
        extra: Option<Document>,
    ) -> EntityLayerResult<u64> {
        (*self)
            .pull_array(collection, id, key, value, extra)
            .await
    }

    async fn query(&self, collection: &str, query: Query) -> EntityLayerResult<Vec<Document>> {
        (*self).query(collection, query).await
    }

    async fn count(
        &self,
        collection: &str,
        filter: Option<&Condition>,
    ) -> EntityLayerResult<u64> {
        (*self).count(collection, filter).await
    }

    async fn aggregate(
        &self,
        collection: &str,
        pipeline: Vec<Document>,
    ) -> EntityLayerResult<Vec<Document>> {
        (*self)
            .aggregate(collection, pipeline)
            .await
    }
}
