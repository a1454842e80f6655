//! The generic entity service: CRUD, filtered querying, pagination, and
//! search-index querying for one entity type against one repository.
//!
//! A [`Service`] binds an [`Entity`] type to a [`Repository`] handle; both
//! the handle and the collection name are fixed at construction. Every
//! operation is stateless and delegates to the repository in a single round
//! trip (or two, for count+fetch pairs).
//!
//! Read operations come in two families:
//!
//! - **plain queries** run [`Condition`]-filtered queries against the store's
//!   native indexes and return raw records (so projections stay
//!   representable); use [`Service::hydrate`] to turn them back into typed
//!   entities.
//! - **search** compiles a [`SearchFilters`] specification into a `$search`
//!   pipeline with count faceting. A specification with no filters silently
//!   degrades to a plain paginated query, so "search with no filters" behaves
//!   as "browse all" instead of hitting the search index with an empty
//!   compound clause.

use bson::{Bson, Document, doc};
use std::marker::PhantomData;
use tracing::debug;

use crate::{
    condition::{Condition, Query, Sort, SortDirection},
    entity::{Entity, EntityExt},
    error::{EntityLayerError, EntityLayerResult},
    page::{Page, PageRequest},
    repository::Repository,
    search::{SearchFilters, SearchStage},
};

/// Hard cap applied to plain queries when the caller supplies no limit.
/// The `*_unlimited` variants bypass it.
pub const DEFAULT_QUERY_LIMIT: usize = 100;

/// A generic service bound to a repository handle and an entity type.
#[derive(Debug)]
pub struct Service<R: Repository, E: Entity> {
    repository: R,
    collection: &'static str,
    _marker: PhantomData<E>,
}

impl<R: Repository, E: Entity> Service<R, E> {
    /// Binds the repository to the entity's collection.
    ///
    /// Fails with a `Configuration` error when the entity declares an empty
    /// collection name; this is fatal and not recoverable.
    pub fn new(repository: R) -> EntityLayerResult<Self> {
        let collection = E::collection_name();

        if collection.is_empty() {
            return Err(EntityLayerError::Configuration(format!(
                "entity model {} declares an empty collection name",
                std::any::type_name::<E>()
            )));
        }

        Ok(Self { repository, collection, _marker: PhantomData })
    }

    /// The collection this service operates on.
    pub fn collection(&self) -> &str {
        self.collection
    }

    /// The underlying repository handle.
    pub fn repository(&self) -> &R {
        &self.repository
    }

    /// Hydrates a raw record into the entity type.
    pub fn hydrate(&self, record: Document) -> EntityLayerResult<E> {
        E::hydrate(record)
    }

    /// Hydrates a batch of raw records.
    pub fn hydrate_all(&self, records: Vec<Document>) -> EntityLayerResult<Vec<E>> {
        records.into_iter().map(E::hydrate).collect()
    }

    /// Fetches an entity by id. `None` when the record does not exist.
    pub async fn get(&self, id: &str) -> EntityLayerResult<Option<E>> {
        match self.repository.get(self.collection, id).await? {
            Some(record) => Ok(Some(E::hydrate(record)?)),
            None => Ok(None),
        }
    }

    /// Creates a new record. Hydration happens first, so invalid data is
    /// rejected before anything is written.
    pub async fn create(&self, data: Document) -> EntityLayerResult<E> {
        let entity = E::hydrate(data)?;

        self.repository
            .create(self.collection, entity.to_document()?)
            .await?;

        Ok(entity)
    }

    /// Updates an existing record by field-merge. Returns `None` when no
    /// record matched the entity's id, which is a signal, not an error.
    pub async fn update(&self, data: Document) -> EntityLayerResult<Option<E>> {
        let entity = E::hydrate(data)?;
        let matched = self
            .repository
            .update(self.collection, entity.id(), entity.to_document()?)
            .await?;

        Ok((matched != 0).then_some(entity))
    }

    /// Replaces an existing record entirely. Returns `None` when no record
    /// matched the entity's id.
    pub async fn set(&self, data: Document) -> EntityLayerResult<Option<E>> {
        let entity = E::hydrate(data)?;
        let matched = self
            .repository
            .replace(self.collection, entity.id(), entity.to_document()?)
            .await?;

        Ok((matched != 0).then_some(entity))
    }

    /// Field-merges `data` onto every record matching `filter`.
    /// Returns the matched count.
    pub async fn update_many(
        &self,
        filter: &Condition,
        data: Document,
    ) -> EntityLayerResult<u64> {
        self.repository
            .update_many(self.collection, filter, data)
            .await
    }

    /// Appends a value to an array field of the record with the given id.
    pub async fn push_array(
        &self,
        id: &str,
        key: &str,
        value: impl Into<Bson> + Send,
    ) -> EntityLayerResult<u64> {
        self.repository
            .push_array(self.collection, id, key, value.into())
            .await
    }

    /// Appends multiple values to an array field. With `avoid_duplication`
    /// the repository skips values already present.
    pub async fn push_array_many(
        &self,
        id: &str,
        key: &str,
        values: Vec<Bson>,
        extra: Option<Document>,
        avoid_duplication: bool,
    ) -> EntityLayerResult<u64> {
        self.repository
            .push_array_many(self.collection, id, key, values, extra, avoid_duplication)
            .await
    }

    /// Removes a value from an array field of the record with the given id.
    pub async fn pull_array(
        &self,
        id: &str,
        key: &str,
        value: impl Into<Bson> + Send,
        extra: Option<Document>,
    ) -> EntityLayerResult<u64> {
        self.repository
            .pull_array(self.collection, id, key, value.into(), extra)
            .await
    }

    /// Runs a plain query, capped at [`DEFAULT_QUERY_LIMIT`] records when the
    /// query carries no limit of its own.
    pub async fn query(&self, mut query: Query) -> EntityLayerResult<Vec<Document>> {
        query.limit = query.limit.or(Some(DEFAULT_QUERY_LIMIT));

        self.repository.query(self.collection, query).await
    }

    /// Runs a plain query and returns the first matching record, if any.
    pub async fn query_one(&self, mut query: Query) -> EntityLayerResult<Option<Document>> {
        query.limit = Some(1);

        Ok(self
            .repository
            .query(self.collection, query)
            .await?
            .into_iter()
            .next())
    }

    /// Runs a plain query with no limit. Use only when the match set is known
    /// to be bounded.
    pub async fn query_unlimited(&self, mut query: Query) -> EntityLayerResult<Vec<Document>> {
        query.limit = None;

        self.repository.query(self.collection, query).await
    }

    /// Runs a plain query and additionally counts the full match set. The
    /// count is computed via a separate count operation over the same filter,
    /// so it stays accurate when the window is limited.
    pub async fn query_with_count(
        &self,
        query: Query,
    ) -> EntityLayerResult<(u64, Vec<Document>)> {
        let count = self
            .repository
            .count(self.collection, query.filter.as_ref())
            .await?;
        let records = self.query(query).await?;

        Ok((count, records))
    }

    /// Unlimited variant of [`Service::query_with_count`].
    pub async fn query_unlimited_with_count(
        &self,
        query: Query,
    ) -> EntityLayerResult<(u64, Vec<Document>)> {
        let count = self
            .repository
            .count(self.collection, query.filter.as_ref())
            .await?;
        let records = self.query_unlimited(query).await?;

        Ok((count, records))
    }

    /// Runs a plain query windowed by the pagination cursor and returns the
    /// page together with the full match count.
    pub async fn query_paginated(
        &self,
        request: PageRequest,
        mut query: Query,
    ) -> EntityLayerResult<Page<Document>> {
        let count = self
            .repository
            .count(self.collection, query.filter.as_ref())
            .await?;

        query.offset = Some(request.offset());
        query.limit = Some(request.per_page);

        let records = self.repository.query(self.collection, query).await?;

        Ok(request.to_page(count, records))
    }

    /// Runs a paginated search against the given search index.
    ///
    /// Compiles the filter specification into a `$search` stage composed with
    /// a count facet; when the specification is empty, falls back to a plain
    /// paginated query so that "search with no filters" means "browse all".
    pub async fn search_paginated(
        &self,
        index: &str,
        request: PageRequest,
        filters: &SearchFilters,
        sort: Option<Sort>,
    ) -> EntityLayerResult<Page<Document>> {
        let stage = SearchStage::compile(index, filters, sort.as_ref().map(sort_directive));

        if stage.is_unfiltered() {
            debug!(
                collection = self.collection,
                index, "search invoked without filters, using plain query"
            );

            let mut query = Query::new();
            query.sort = sort;

            return self.query_paginated(request, query).await;
        }

        let pipeline = vec![
            doc! { "$search": stage.to_document() },
            doc! {
                "$facet": {
                    "results": [
                        { "$skip": request.offset() as i64 },
                        { "$limit": request.per_page as i64 },
                    ],
                    "totalCount": [{ "$count": "count" }],
                }
            },
            doc! { "$addFields": { "count": { "$arrayElemAt": ["$totalCount.count", 0] } } },
        ];

        debug!(collection = self.collection, index, "running search pipeline");

        let mut output = self
            .repository
            .aggregate(self.collection, pipeline)
            .await?;
        let facets = output
            .drain(..)
            .next()
            .unwrap_or_default();

        let count = facet_count(&facets);
        let records = facets
            .get_array("results")
            .map(|results| {
                results
                    .iter()
                    .filter_map(Bson::as_document)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        Ok(request.to_page(count, records))
    }

    /// Runs an unpaginated search and returns every matching record. Never
    /// computes a count; use only when the match set is known to be bounded.
    /// An empty specification falls back to an unlimited plain query.
    pub async fn search_unlimited(
        &self,
        index: &str,
        filters: &SearchFilters,
        sort: Option<Sort>,
    ) -> EntityLayerResult<Vec<Document>> {
        let stage = SearchStage::compile(index, filters, sort.as_ref().map(sort_directive));

        if stage.is_unfiltered() {
            debug!(
                collection = self.collection,
                index, "search invoked without filters, using plain query"
            );

            let mut query = Query::new();
            query.sort = sort;

            return self.query_unlimited(query).await;
        }

        let pipeline = vec![doc! { "$search": stage.to_document() }];

        debug!(collection = self.collection, index, "running search pipeline");

        self.repository
            .aggregate(self.collection, pipeline)
            .await
    }
}

/// Renders a sort specification as a stage-level search sort directive.
fn sort_directive(sort: &Sort) -> Document {
    doc! {
        &sort.field: match sort.direction {
            SortDirection::Asc => 1,
            SortDirection::Desc => -1,
        }
    }
}

/// Hoists the faceted total count out of the aggregation output. The count
/// field is absent when nothing matched.
fn facet_count(facets: &Document) -> u64 {
    match facets.get("count") {
        Some(Bson::Int32(count)) => *count as u64,
        Some(Bson::Int64(count)) => *count as u64,
        Some(Bson::Double(count)) => *count as u64,
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn facet_count_reads_any_numeric_width() {
        assert_eq!(facet_count(&doc! { "count": 7_i32 }), 7);
        assert_eq!(facet_count(&doc! { "count": 7_i64 }), 7);
        assert_eq!(facet_count(&doc! { "count": 7.0 }), 7);
    }

    #[test]
    fn facet_count_defaults_to_zero_when_nothing_matched() {
        assert_eq!(facet_count(&doc! { "results": [] }), 0);
    }

    #[test]
    fn sort_directive_maps_direction_to_sign() {
        assert_eq!(sort_directive(&Sort::asc("price")), doc! { "price": 1 });
        assert_eq!(sort_directive(&Sort::desc("price")), doc! { "price": -1 });
    }
}
