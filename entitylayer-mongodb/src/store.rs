//! MongoDB repository implementation.
//!
//! Records are stored with their entity id mirrored into `_id`, so id lookups
//! ride the primary index; `_id` is stripped again on every read path.

use async_trait::async_trait;
use bson::{Bson, Document, doc};
use futures::TryStreamExt;
use mongodb::{
    Client, Collection as MongoCollection,
    options::{ClientOptions, FindOptions},
};
use tracing::debug;

use entitylayer_core::{
    condition::{Condition, ConditionVisitor, Query, SortDirection},
    error::{EntityLayerError, EntityLayerResult},
    repository::Repository,
};

use crate::query::MongoConditionTranslator;

/// MongoDB-backed repository.
///
/// Search pipelines (`$search` aggregations) require the target collection to
/// carry an Atlas Search index with the name the pipeline references; driver
/// errors that point at a missing index surface as `SearchIndexNotFound`.
#[derive(Debug)]
pub struct MongoRepository {
    client: Client,
    database: String,
}

impl MongoRepository {
    pub fn new(client: Client, database: String) -> Self {
        Self { client, database }
    }

    pub fn builder(dsn: &str, database: &str) -> MongoRepositoryBuilder {
        MongoRepositoryBuilder::new(dsn, database)
    }

    fn get_collection(&self, collection: &str) -> MongoCollection<Document> {
        self.client.database(&self.database).collection(collection)
    }
}

fn backend_error(error: mongodb::error::Error) -> EntityLayerError {
    EntityLayerError::Repository(error.to_string())
}

/// Error mapping for search pipelines. The driver reports a missing Atlas
/// Search index as a generic command error, so the classification is by
/// message.
fn search_error(error: mongodb::error::Error) -> EntityLayerError {
    let message = error.to_string();

    if is_missing_index_message(&message) {
        EntityLayerError::SearchIndexNotFound(message)
    } else {
        EntityLayerError::Repository(message)
    }
}

fn is_missing_index_message(message: &str) -> bool {
    let lowered = message.to_lowercase();

    lowered.contains("index")
        && (lowered.contains("not found") || lowered.contains("does not exist"))
}

fn translate_filter(filter: Option<&Condition>) -> EntityLayerResult<Document> {
    match filter {
        Some(condition) => MongoConditionTranslator.visit_condition(condition),
        None => Ok(doc! {}),
    }
}

/// Mirrors the record's own id into `_id` before writing.
fn prepare_record(mut record: Document) -> EntityLayerResult<Document> {
    let id = record
        .get_str("id")
        .map_err(|_| EntityLayerError::Validation("record is missing a string id field".to_string()))?
        .to_string();

    record.insert("_id", id);

    Ok(record)
}

/// Drops the storage-internal `_id` on the way out.
fn restore_record(mut record: Document) -> Document {
    record.remove("_id");

    record
}

#[async_trait]
impl Repository for MongoRepository {
    async fn get(&self, collection: &str, id: &str) -> EntityLayerResult<Option<Document>> {
        Ok(self
            .get_collection(collection)
            .find_one(doc! { "_id": id })
            .await
            .map_err(backend_error)?
            .map(restore_record))
    }

    async fn create(&self, collection: &str, record: Document) -> EntityLayerResult<()> {
        self.get_collection(collection)
            .insert_one(prepare_record(record)?)
            .await
            .map_err(backend_error)?;

        Ok(())
    }

    async fn update(
        &self,
        collection: &str,
        id: &str,
        record: Document,
    ) -> EntityLayerResult<u64> {
        let result = self
            .get_collection(collection)
            .update_one(doc! { "_id": id }, doc! { "$set": record })
            .await
            .map_err(backend_error)?;

        Ok(result.matched_count)
    }

    async fn replace(
        &self,
        collection: &str,
        id: &str,
        record: Document,
    ) -> EntityLayerResult<u64> {
        let result = self
            .get_collection(collection)
            .replace_one(doc! { "_id": id }, prepare_record(record)?)
            .await
            .map_err(backend_error)?;

        Ok(result.matched_count)
    }

    async fn update_many(
        &self,
        collection: &str,
        filter: &Condition,
        data: Document,
    ) -> EntityLayerResult<u64> {
        let result = self
            .get_collection(collection)
            .update_many(translate_filter(Some(filter))?, doc! { "$set": data })
            .await
            .map_err(backend_error)?;

        Ok(result.matched_count)
    }

    async fn push_array(
        &self,
        collection: &str,
        id: &str,
        key: &str,
        value: Bson,
    ) -> EntityLayerResult<u64> {
        let result = self
            .get_collection(collection)
            .update_one(doc! { "_id": id }, doc! { "$push": { key: value } })
            .await
            .map_err(backend_error)?;

        Ok(result.matched_count)
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
        // $addToSet is the server-side form of duplicate avoidance.
        let operator = if avoid_duplication { "$addToSet" } else { "$push" };
        let mut update = doc! { operator: { key: { "$each": values } } };

        if let Some(extra) = extra {
            update.insert("$set", extra);
        }

        let result = self
            .get_collection(collection)
            .update_one(doc! { "_id": id }, update)
            .await
            .map_err(backend_error)?;

        Ok(result.matched_count)
    }

    async fn pull_array(
        &self,
        collection: &str,
        id: &str,
        key: &str,
        value: Bson,
        extra: Option<Document>,
    ) -> EntityLayerResult<u64> {
        let mut update = doc! { "$pull": { key: value } };

        if let Some(extra) = extra {
            update.insert("$set", extra);
        }

        let result = self
            .get_collection(collection)
            .update_one(doc! { "_id": id }, update)
            .await
            .map_err(backend_error)?;

        Ok(result.matched_count)
    }

    async fn query(&self, collection: &str, query: Query) -> EntityLayerResult<Vec<Document>> {
        let mut options = FindOptions::default();

        if let Some(limit) = query.limit {
            options.limit = Some(limit as i64);
        }
        if let Some(offset) = query.offset {
            options.skip = Some(offset as u64);
        }
        if let Some(sort) = &query.sort {
            options.sort = Some(doc! {
                sort.field.clone(): match sort.direction {
                    SortDirection::Asc => 1,
                    SortDirection::Desc => -1,
                }
            });
        }
        if let Some(fields) = &query.projection {
            options.projection = Some(
                fields
                    .iter()
                    .map(|field| (field.clone(), Bson::Int32(1)))
                    .chain([("_id".to_string(), Bson::Int32(0))])
                    .collect(),
            );
        }

        Ok(self
            .get_collection(collection)
            .find(translate_filter(query.filter.as_ref())?)
            .with_options(options)
            .await
            .map_err(backend_error)?
            .try_collect::<Vec<Document>>()
            .await
            .map_err(backend_error)?
            .into_iter()
            .map(restore_record)
            .collect())
    }

    async fn count(
        &self,
        collection: &str,
        filter: Option<&Condition>,
    ) -> EntityLayerResult<u64> {
        self.get_collection(collection)
            .count_documents(translate_filter(filter)?)
            .await
            .map_err(backend_error)
    }

    async fn aggregate(
        &self,
        collection: &str,
        pipeline: Vec<Document>,
    ) -> EntityLayerResult<Vec<Document>> {
        Ok(self
            .get_collection(collection)
            .aggregate(pipeline)
            .await
            .map_err(search_error)?
            .try_collect::<Vec<Document>>()
            .await
            .map_err(search_error)?
            .into_iter()
            .map(restore_record)
            .collect())
    }
}

/// Builder for [`MongoRepository`] instances from a connection string.
pub struct MongoRepositoryBuilder {
    dsn: String,
    database: String,
}

impl MongoRepositoryBuilder {
    pub fn new(dsn: &str, database: &str) -> Self {
        Self {
            dsn: dsn.to_string(),
            database: database.to_string(),
        }
    }

    /// Parses the connection string and constructs the repository. The driver
    /// connects lazily, so this does not touch the network beyond DNS
    /// resolution of SRV records.
    pub async fn build(self) -> EntityLayerResult<MongoRepository> {
        debug!(database = %self.database, "connecting to MongoDB");

        let options = ClientOptions::parse(&self.dsn)
            .await
            .map_err(|e| EntityLayerError::Configuration(e.to_string()))?;
        let client = Client::with_options(options)
            .map_err(|e| EntityLayerError::Configuration(e.to_string()))?;

        Ok(MongoRepository::new(client, self.database))
    }
}
