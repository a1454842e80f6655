//! In-memory repository implementation.
//!
//! This module provides a simple but complete in-memory backend that stores
//! records as BSON documents in ordered maps behind async-safe read-write
//! locks.

use async_trait::async_trait;
use bson::{Bson, Document};
use mea::rwlock::RwLock;
use std::{
    cmp::Ordering,
    collections::{BTreeMap, BTreeSet},
    sync::Arc,
};

use entitylayer_core::{
    condition::{Condition, Query, SortDirection},
    error::{EntityLayerError, EntityLayerResult},
    repository::Repository,
};

use crate::{
    evaluator::{Comparable, RecordEvaluator},
    pipeline::run_pipeline,
};

type CollectionMap = BTreeMap<String, Document>;
type StoreMap = BTreeMap<String, CollectionMap>;
type IndexMap = BTreeMap<String, BTreeSet<String>>;

/// Thread-safe in-memory repository.
///
/// This struct implements the [`Repository`] trait to provide a fully
/// functional record store that operates entirely in memory using async-aware
/// read-write locks. All records are stored as BSON documents indexed by
/// their id, in insertion-key order so scans are deterministic.
///
/// Search pipelines run against search indexes registered with
/// [`InMemoryRepository::create_search_index`]; querying an unregistered
/// index fails with `SearchIndexNotFound`, same as a real search backend.
///
/// # Thread Safety
///
/// `InMemoryRepository` is cloneable and uses `Arc`-wrapped internal state,
/// allowing it to be safely shared across async tasks. Multiple clones of the
/// same instance share the same underlying data.
///
/// # Performance
///
/// Queries scan all records in a collection (no indexing). For small to
/// medium datasets this is typically acceptable. For larger datasets, use a
/// persistent backend like MongoDB.
///
/// # Example
///
/// ```ignore
/// use entitylayer_memory::InMemoryRepository;
/// use entitylayer_core::repository::Repository;
/// use bson::doc;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let repository = InMemoryRepository::new();
///
///     repository
///         .create("vehicles", doc! { "id": "v-1", "make": "Toyota" })
///         .await?;
///
///     let record = repository.get("vehicles", "v-1").await?;
///     assert!(record.is_some());
///
///     Ok(())
/// }
/// ```
#[derive(Default, Clone, Debug)]
pub struct InMemoryRepository {
    /// The main storage map: collection name -> (record id -> record)
    store: Arc<RwLock<StoreMap>>,
    /// Registered search indexes: collection name -> index names
    search_indexes: Arc<RwLock<IndexMap>>,
}

impl InMemoryRepository {
    /// Creates a new empty in-memory repository.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a search index for a collection. Search pipelines against
    /// unregistered indexes fail with `SearchIndexNotFound`.
    pub async fn create_search_index(&self, collection: &str, index: &str) {
        self.search_indexes
            .write()
            .await
            .entry(collection.to_string())
            .or_default()
            .insert(index.to_string());
    }
}

fn record_id(record: &Document) -> EntityLayerResult<&str> {
    record
        .get_str("id")
        .map_err(|_| EntityLayerError::Validation("record is missing a string id field".to_string()))
}

fn merge(target: &mut Document, data: Document) {
    for (key, value) in data {
        target.insert(key, value);
    }
}

fn project(mut record: Document, fields: &[String]) -> Document {
    let mut projected = Document::new();

    for field in fields {
        if let Some(value) = record.remove(field) {
            projected.insert(field, value);
        }
    }

    projected
}

/// Grabs a mutable handle to the array field, creating it when absent.
/// A present non-array field is a store error, mirroring `$push` semantics.
fn array_field<'a>(
    record: &'a mut Document,
    key: &str,
) -> EntityLayerResult<&'a mut Vec<Bson>> {
    if record.get(key).is_none() {
        record.insert(key, Bson::Array(Vec::new()));
    }

    match record.get_mut(key) {
        Some(Bson::Array(array)) => Ok(array),
        _ => Err(EntityLayerError::Repository(format!(
            "field {key} is not an array"
        ))),
    }
}

#[async_trait]
impl Repository for InMemoryRepository {
    async fn get(&self, collection: &str, id: &str) -> EntityLayerResult<Option<Document>> {
        let store = self.store.read().await;

        Ok(store
            .get(collection)
            .and_then(|records| records.get(id))
            .cloned())
    }

    async fn create(&self, collection: &str, record: Document) -> EntityLayerResult<()> {
        let id = record_id(&record)?.to_string();
        let mut store = self.store.write().await;
        let records = store.entry(collection.to_string()).or_default();

        if records.contains_key(&id) {
            return Err(EntityLayerError::Repository(format!(
                "record {id} already exists in {collection}"
            )));
        }

        records.insert(id, record);

        Ok(())
    }

    async fn update(
        &self,
        collection: &str,
        id: &str,
        record: Document,
    ) -> EntityLayerResult<u64> {
        let mut store = self.store.write().await;

        match store.get_mut(collection).and_then(|records| records.get_mut(id)) {
            Some(stored) => {
                merge(stored, record);
                Ok(1)
            }
            None => Ok(0),
        }
    }

    async fn replace(
        &self,
        collection: &str,
        id: &str,
        record: Document,
    ) -> EntityLayerResult<u64> {
        let mut store = self.store.write().await;

        match store.get_mut(collection).and_then(|records| records.get_mut(id)) {
            Some(stored) => {
                *stored = record;
                Ok(1)
            }
            None => Ok(0),
        }
    }

    async fn update_many(
        &self,
        collection: &str,
        filter: &Condition,
        data: Document,
    ) -> EntityLayerResult<u64> {
        let mut store = self.store.write().await;
        let Some(records) = store.get_mut(collection) else {
            return Ok(0);
        };

        let mut matched = 0;

        for record in records.values_mut() {
            if RecordEvaluator::new(record).evaluate(filter)? {
                merge(record, data.clone());
                matched += 1;
            }
        }

        Ok(matched)
    }

    async fn push_array(
        &self,
        collection: &str,
        id: &str,
        key: &str,
        value: Bson,
    ) -> EntityLayerResult<u64> {
        let mut store = self.store.write().await;

        match store.get_mut(collection).and_then(|records| records.get_mut(id)) {
            Some(record) => {
                array_field(record, key)?.push(value);
                Ok(1)
            }
            None => Ok(0),
        }
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
        let mut store = self.store.write().await;

        match store.get_mut(collection).and_then(|records| records.get_mut(id)) {
            Some(record) => {
                let array = array_field(record, key)?;

                for value in values {
                    if avoid_duplication && array.contains(&value) {
                        continue;
                    }

                    array.push(value);
                }

                if let Some(extra) = extra {
                    merge(record, extra);
                }

                Ok(1)
            }
            None => Ok(0),
        }
    }

    async fn pull_array(
        &self,
        collection: &str,
        id: &str,
        key: &str,
        value: Bson,
        extra: Option<Document>,
    ) -> EntityLayerResult<u64> {
        let mut store = self.store.write().await;

        match store.get_mut(collection).and_then(|records| records.get_mut(id)) {
            Some(record) => {
                array_field(record, key)?.retain(|item| item != &value);

                if let Some(extra) = extra {
                    merge(record, extra);
                }

                Ok(1)
            }
            None => Ok(0),
        }
    }

    async fn query(&self, collection: &str, query: Query) -> EntityLayerResult<Vec<Document>> {
        let store = self.store.read().await;
        let Some(records) = store.get(collection) else {
            return Ok(vec![]);
        };

        let mut matched = match &query.filter {
            Some(condition) => RecordEvaluator::filter_records(records.values(), condition)?,
            None => records.values().cloned().collect::<Vec<_>>(),
        };

        if let Some(sort) = &query.sort {
            matched.sort_by(|a, b| {
                let left = a
                    .get(&sort.field)
                    .map(Comparable::from)
                    .unwrap_or(Comparable::Null);
                let right = b
                    .get(&sort.field)
                    .map(Comparable::from)
                    .unwrap_or(Comparable::Null);

                match sort.direction {
                    SortDirection::Asc => left.partial_cmp(&right).unwrap_or(Ordering::Equal),
                    SortDirection::Desc => right.partial_cmp(&left).unwrap_or(Ordering::Equal),
                }
            });
        }

        let windowed = matched
            .into_iter()
            .skip(query.offset.unwrap_or(0))
            .take(query.limit.unwrap_or(usize::MAX));

        Ok(match &query.projection {
            Some(fields) => windowed.map(|record| project(record, fields)).collect(),
            None => windowed.collect(),
        })
    }

    async fn count(
        &self,
        collection: &str,
        filter: Option<&Condition>,
    ) -> EntityLayerResult<u64> {
        let store = self.store.read().await;
        let Some(records) = store.get(collection) else {
            return Ok(0);
        };

        let count = match filter {
            Some(condition) => records
                .values()
                .filter(|record| {
                    RecordEvaluator::new(record)
                        .evaluate(condition)
                        .unwrap_or(false)
                })
                .count(),
            None => records.len(),
        };

        Ok(count as u64)
    }

    async fn aggregate(
        &self,
        collection: &str,
        pipeline: Vec<Document>,
    ) -> EntityLayerResult<Vec<Document>> {
        let store = self.store.read().await;
        let records = store
            .get(collection)
            .map(|records| records.values().cloned().collect::<Vec<_>>())
            .unwrap_or_default();
        drop(store);

        let indexes = self.search_indexes.read().await;
        let collection_indexes = indexes.get(collection).cloned().unwrap_or_default();
        drop(indexes);

        run_pipeline(records, &pipeline, &collection_indexes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;
    use entitylayer_core::condition::Sort;

    async fn seeded() -> InMemoryRepository {
        let repository = InMemoryRepository::new();

        for record in [
            doc! { "id": "v-1", "make": "Toyota", "model": "Corolla", "price": 15_000 },
            doc! { "id": "v-2", "make": "Toyota", "model": "Yaris", "price": 9_000 },
            doc! { "id": "v-3", "make": "Honda", "model": "Civic", "price": 18_000 },
        ] {
            repository.create("vehicles", record).await.unwrap();
        }

        repository
    }

    #[tokio::test]
    async fn create_then_get_roundtrips() {
        let repository = seeded().await;

        let record = repository.get("vehicles", "v-1").await.unwrap().unwrap();
        assert_eq!(record.get_str("make").unwrap(), "Toyota");

        assert!(repository.get("vehicles", "v-9").await.unwrap().is_none());
        assert!(repository.get("boats", "v-1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn duplicate_create_is_rejected() {
        let repository = seeded().await;
        let error = repository
            .create("vehicles", doc! { "id": "v-1" })
            .await
            .unwrap_err();

        assert!(matches!(error, EntityLayerError::Repository(_)));
    }

    #[tokio::test]
    async fn create_without_id_is_a_validation_error() {
        let repository = InMemoryRepository::new();
        let error = repository
            .create("vehicles", doc! { "make": "Toyota" })
            .await
            .unwrap_err();

        assert!(matches!(error, EntityLayerError::Validation(_)));
    }

    #[tokio::test]
    async fn update_merges_and_replace_overwrites() {
        let repository = seeded().await;

        let matched = repository
            .update("vehicles", "v-1", doc! { "price": 14_000 })
            .await
            .unwrap();
        assert_eq!(matched, 1);

        let record = repository.get("vehicles", "v-1").await.unwrap().unwrap();
        assert_eq!(record.get_i32("price").unwrap(), 14_000);
        assert_eq!(record.get_str("model").unwrap(), "Corolla");

        repository
            .replace("vehicles", "v-1", doc! { "id": "v-1", "make": "Toyota" })
            .await
            .unwrap();

        let record = repository.get("vehicles", "v-1").await.unwrap().unwrap();
        assert!(record.get("model").is_none());

        let matched = repository
            .update("vehicles", "v-9", doc! { "price": 1 })
            .await
            .unwrap();
        assert_eq!(matched, 0);
    }

    #[tokio::test]
    async fn update_many_touches_only_matching_records() {
        let repository = seeded().await;

        let matched = repository
            .update_many("vehicles", &Condition::eq("make", "Toyota"), doc! { "certified": true })
            .await
            .unwrap();
        assert_eq!(matched, 2);

        let record = repository.get("vehicles", "v-3").await.unwrap().unwrap();
        assert!(record.get("certified").is_none());
    }

    #[tokio::test]
    async fn query_filters_sorts_and_windows() {
        let repository = seeded().await;

        let query = Query::builder()
            .filter(Condition::eq("make", "Toyota"))
            .sort("price", SortDirection::Desc)
            .limit(1)
            .build();
        let records = repository.query("vehicles", query).await.unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].get_str("id").unwrap(), "v-1");

        let query = Query::builder()
            .sort("price", SortDirection::Asc)
            .offset(1)
            .build();
        let records = repository.query("vehicles", query).await.unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].get_str("id").unwrap(), "v-1");
    }

    #[tokio::test]
    async fn projection_keeps_only_requested_fields() {
        let repository = seeded().await;

        let query = Query::builder()
            .filter(Condition::eq("id", "v-1"))
            .projection(["model", "price"])
            .build();
        let records = repository.query("vehicles", query).await.unwrap();

        assert_eq!(records[0], doc! { "model": "Corolla", "price": 15_000 });
    }

    #[tokio::test]
    async fn count_ignores_the_window() {
        let repository = seeded().await;

        assert_eq!(repository.count("vehicles", None).await.unwrap(), 3);
        assert_eq!(
            repository
                .count("vehicles", Some(&Condition::eq("make", "Toyota")))
                .await
                .unwrap(),
            2
        );
        assert_eq!(repository.count("boats", None).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn array_operations_push_dedupe_and_pull() {
        let repository = seeded().await;

        repository
            .push_array("vehicles", "v-1", "tags", Bson::from("clean"))
            .await
            .unwrap();
        repository
            .push_array_many(
                "vehicles",
                "v-1",
                "tags",
                vec![Bson::from("clean"), Bson::from("inspected")],
                Some(doc! { "flagged": true }),
                true,
            )
            .await
            .unwrap();

        let record = repository.get("vehicles", "v-1").await.unwrap().unwrap();
        assert_eq!(record.get_array("tags").unwrap().len(), 2);
        assert!(record.get_bool("flagged").unwrap());

        repository
            .pull_array("vehicles", "v-1", "tags", Bson::from("clean"), None)
            .await
            .unwrap();

        let record = repository.get("vehicles", "v-1").await.unwrap().unwrap();
        assert_eq!(record.get_array("tags").unwrap().len(), 1);
    }

    #[tokio::test]
    async fn push_to_non_array_field_is_an_error() {
        let repository = seeded().await;
        let error = repository
            .push_array("vehicles", "v-1", "make", Bson::from("x"))
            .await
            .unwrap_err();

        assert!(matches!(error, EntityLayerError::Repository(_)));
    }

    #[tokio::test]
    async fn aggregate_requires_a_registered_search_index() {
        let repository = seeded().await;
        let pipeline = vec![doc! { "$search": { "index": "vehicles", "compound": {
            "filter": [{ "equals": { "value": "Honda", "path": "make" } }],
        } } }];

        let error = repository
            .aggregate("vehicles", pipeline.clone())
            .await
            .unwrap_err();
        assert!(matches!(error, EntityLayerError::SearchIndexNotFound(_)));

        repository.create_search_index("vehicles", "vehicles").await;

        let results = repository.aggregate("vehicles", pipeline).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].get_str("id").unwrap(), "v-3");
    }

    #[tokio::test]
    async fn clones_share_the_same_records() {
        let repository = InMemoryRepository::new();
        let clone = repository.clone();

        clone
            .create("vehicles", doc! { "id": "v-1", "make": "Toyota" })
            .await
            .unwrap();

        assert!(repository.get("vehicles", "v-1").await.unwrap().is_some());
    }
}
