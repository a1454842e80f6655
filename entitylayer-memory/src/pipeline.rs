//! Aggregation pipeline interpretation for the in-memory repository.
//!
//! The service layer talks to search indexes through aggregation pipelines
//! (`$search` followed by `$facet`/`$addFields` bookkeeping stages). This
//! module interprets exactly that pipeline shape against in-memory records so
//! the backend is a drop-in stand-in for a real search-capable store:
//!
//! - `text` matches are case-insensitive substring tests
//! - `autocomplete` matches are case-insensitive prefix tests
//! - `equals` and `range` compare via [`Comparable`]
//! - `wildcard` with the query `*` is a present-and-non-null test
//!
//! Search clauses only ever match records whose target field exists; a
//! `mustNot` clause therefore keeps records that lack the field entirely,
//! matching how search engines treat unindexed values.

use bson::{Bson, Document, doc};
use std::{cmp::Ordering, collections::BTreeSet};

use entitylayer_core::error::{EntityLayerError, EntityLayerResult};

use crate::evaluator::Comparable;

/// Runs an aggregation pipeline over a snapshot of a collection's records.
/// `indexes` holds the search index names registered for the collection.
pub(crate) fn run_pipeline(
    mut records: Vec<Document>,
    pipeline: &[Document],
    indexes: &BTreeSet<String>,
) -> EntityLayerResult<Vec<Document>> {
    for stage in pipeline {
        records = apply_stage(records, stage, indexes)?;
    }

    Ok(records)
}

fn apply_stage(
    records: Vec<Document>,
    stage: &Document,
    indexes: &BTreeSet<String>,
) -> EntityLayerResult<Vec<Document>> {
    let Some((name, body)) = stage.iter().next() else {
        return Ok(records);
    };

    match (name.as_str(), body) {
        ("$search", Bson::Document(body)) => search(records, body, indexes),
        ("$facet", Bson::Document(facets)) => facet(records, facets, indexes),
        ("$addFields", Bson::Document(fields)) => Ok(add_fields(records, fields)),
        ("$sort", Bson::Document(sort)) => Ok(apply_sort(records, sort)),
        ("$skip", skip) => match to_usize(skip) {
            Some(skip) => Ok(records.into_iter().skip(skip).collect()),
            None => Err(malformed(name)),
        },
        ("$limit", limit) => match to_usize(limit) {
            Some(limit) => Ok(records.into_iter().take(limit).collect()),
            None => Err(malformed(name)),
        },
        // $count emits nothing at all when its input set is empty.
        ("$count", Bson::String(field)) => Ok(if records.is_empty() {
            vec![]
        } else {
            vec![doc! { field: records.len() as i64 }]
        }),
        _ => Err(EntityLayerError::Repository(format!(
            "unsupported aggregation stage: {name}"
        ))),
    }
}

fn malformed(stage: &str) -> EntityLayerError {
    EntityLayerError::Repository(format!("malformed {stage} aggregation stage"))
}

fn to_usize(value: &Bson) -> Option<usize> {
    match value {
        Bson::Int32(value) if *value >= 0 => Some(*value as usize),
        Bson::Int64(value) if *value >= 0 => Some(*value as usize),
        _ => None,
    }
}

/// Applies a `$search` stage: compound clause matching followed by the
/// optional stage-level sort.
fn search(
    records: Vec<Document>,
    body: &Document,
    indexes: &BTreeSet<String>,
) -> EntityLayerResult<Vec<Document>> {
    let index = body
        .get_str("index")
        .map_err(|_| malformed("$search"))?;

    if !indexes.contains(index) {
        return Err(EntityLayerError::SearchIndexNotFound(index.to_string()));
    }

    let compound = body
        .get_document("compound")
        .map_err(|_| malformed("$search"))?;
    let filter = clause_bucket(compound, "filter")?;
    let must_not = clause_bucket(compound, "mustNot")?;
    let should = clause_bucket(compound, "should")?;
    let minimum_should_match = compound
        .get("minimumShouldMatch")
        .and_then(to_usize)
        .unwrap_or(0);

    let mut matched = Vec::new();

    for record in records {
        let strict = filter
            .iter()
            .map(|clause| clause_matches(&record, clause))
            .collect::<EntityLayerResult<Vec<_>>>()?
            .into_iter()
            .all(|matches| matches);
        let excluded = must_not
            .iter()
            .map(|clause| clause_matches(&record, clause))
            .collect::<EntityLayerResult<Vec<_>>>()?
            .into_iter()
            .any(|matches| matches);
        let relaxed = should
            .iter()
            .map(|clause| clause_matches(&record, clause))
            .collect::<EntityLayerResult<Vec<_>>>()?
            .into_iter()
            .filter(|matches| *matches)
            .count();

        if strict && !excluded && relaxed >= minimum_should_match {
            matched.push(record);
        }
    }

    match body.get_document("sort") {
        Ok(sort) => Ok(apply_sort(matched, sort)),
        Err(_) => Ok(matched),
    }
}

fn clause_bucket(compound: &Document, bucket: &str) -> EntityLayerResult<Vec<Document>> {
    match compound.get(bucket) {
        Some(Bson::Array(clauses)) => clauses
            .iter()
            .map(|clause| {
                clause
                    .as_document()
                    .cloned()
                    .ok_or_else(|| malformed("$search"))
            })
            .collect(),
        Some(_) => Err(malformed("$search")),
        None => Ok(vec![]),
    }
}

fn clause_matches(record: &Document, clause: &Document) -> EntityLayerResult<bool> {
    let Some((operator, Bson::Document(body))) = clause.iter().next() else {
        return Err(malformed("$search"));
    };
    let path = body.get_str("path").map_err(|_| malformed("$search"))?;
    let Some(field_value) = record.get(path) else {
        return Ok(false);
    };

    match operator.as_str() {
        "text" => {
            let query = body.get_str("query").map_err(|_| malformed("$search"))?;

            Ok(field_value
                .as_str()
                .is_some_and(|text| text.to_lowercase().contains(&query.to_lowercase())))
        }
        "autocomplete" => {
            let query = body.get_str("query").map_err(|_| malformed("$search"))?;

            Ok(field_value
                .as_str()
                .is_some_and(|text| text.to_lowercase().starts_with(&query.to_lowercase())))
        }
        "equals" => {
            let value = body.get("value").ok_or_else(|| malformed("$search"))?;

            Ok(Comparable::from(field_value) == Comparable::from(value))
        }
        "range" => Ok(range_matches(field_value, body)),
        "wildcard" => {
            let query = body.get_str("query").map_err(|_| malformed("$search"))?;

            if query != "*" {
                return Err(EntityLayerError::Repository(format!(
                    "unsupported wildcard pattern: {query}"
                )));
            }

            Ok(!matches!(field_value, Bson::Null))
        }
        other => Err(EntityLayerError::Repository(format!(
            "unsupported search operator: {other}"
        ))),
    }
}

fn range_matches(field_value: &Bson, body: &Document) -> bool {
    let value = Comparable::from(field_value);
    let within = |bound: &Bson, accepted: &[Ordering]| {
        value
            .partial_cmp(&Comparable::from(bound))
            .is_some_and(|ordering| accepted.contains(&ordering))
    };

    body.get("gt").is_none_or(|bound| within(bound, &[Ordering::Greater]))
        && body
            .get("gte")
            .is_none_or(|bound| within(bound, &[Ordering::Greater, Ordering::Equal]))
        && body.get("lt").is_none_or(|bound| within(bound, &[Ordering::Less]))
        && body
            .get("lte")
            .is_none_or(|bound| within(bound, &[Ordering::Less, Ordering::Equal]))
}

/// Applies a `$facet` stage: each facet runs its sub-pipeline over the same
/// input set, and the output is a single record of facet-name to results.
fn facet(
    records: Vec<Document>,
    facets: &Document,
    indexes: &BTreeSet<String>,
) -> EntityLayerResult<Vec<Document>> {
    let mut output = Document::new();

    for (name, sub_pipeline) in facets {
        let Bson::Array(stages) = sub_pipeline else {
            return Err(malformed("$facet"));
        };
        let stages = stages
            .iter()
            .map(|stage| {
                stage
                    .as_document()
                    .cloned()
                    .ok_or_else(|| malformed("$facet"))
            })
            .collect::<EntityLayerResult<Vec<_>>>()?;
        let results = run_pipeline(records.clone(), &stages, indexes)?;

        output.insert(
            name,
            Bson::Array(results.into_iter().map(Bson::Document).collect()),
        );
    }

    Ok(vec![output])
}

/// Applies an `$addFields` stage. Expressions that resolve to nothing (such
/// as `$arrayElemAt` past the end of an array) leave the field unset.
fn add_fields(records: Vec<Document>, fields: &Document) -> Vec<Document> {
    records
        .into_iter()
        .map(|mut record| {
            for (field, expression) in fields {
                if let Some(value) = evaluate_expression(&record, expression) {
                    record.insert(field, value);
                }
            }

            record
        })
        .collect()
}

fn evaluate_expression(record: &Document, expression: &Bson) -> Option<Bson> {
    match expression {
        Bson::Document(body) => match body.iter().next() {
            Some((operator, Bson::Array(arguments))) if operator == "$arrayElemAt" => {
                let [array, index] = arguments.as_slice() else {
                    return None;
                };
                let array = evaluate_expression(record, array)?;
                let index = to_usize(index)?;

                array.as_array()?.get(index).cloned()
            }
            _ => None,
        },
        Bson::String(path) => match path.strip_prefix('$') {
            Some(path) => resolve_path(record, path),
            None => Some(expression.clone()),
        },
        literal => Some(literal.clone()),
    }
}

/// Resolves a dotted field path. A path segment applied to an array fans out
/// over its elements, so `totalCount.count` over a facet output collects the
/// `count` of every record in the `totalCount` array.
fn resolve_path(record: &Document, path: &str) -> Option<Bson> {
    let mut current = Bson::Document(record.clone());

    for segment in path.split('.') {
        current = match current {
            Bson::Document(doc) => doc.get(segment).cloned()?,
            Bson::Array(items) => Bson::Array(
                items
                    .iter()
                    .filter_map(|item| item.as_document())
                    .filter_map(|doc| doc.get(segment).cloned())
                    .collect(),
            ),
            _ => return None,
        };
    }

    Some(current)
}

fn apply_sort(mut records: Vec<Document>, sort: &Document) -> Vec<Document> {
    let Some((field, direction)) = sort.iter().next() else {
        return records;
    };
    let descending = matches!(direction, Bson::Int32(-1) | Bson::Int64(-1));

    records.sort_by(|a, b| {
        let left = a.get(field).map(Comparable::from).unwrap_or(Comparable::Null);
        let right = b.get(field).map(Comparable::from).unwrap_or(Comparable::Null);
        let ordering = left.partial_cmp(&right).unwrap_or(Ordering::Equal);

        if descending { ordering.reverse() } else { ordering }
    });

    records
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vehicles() -> Vec<Document> {
        vec![
            doc! { "id": "v-1", "make": "Toyota", "model": "Corolla", "price": 15_000 },
            doc! { "id": "v-2", "make": "Toyota", "model": "Yaris", "price": 9_000 },
            doc! { "id": "v-3", "make": "Honda", "model": "Civic", "price": 18_000, "bluetooth": true },
        ]
    }

    fn indexes() -> BTreeSet<String> {
        BTreeSet::from(["vehicles".to_string()])
    }

    #[test]
    fn search_filters_and_sorts_records() {
        let pipeline = [doc! { "$search": {
            "index": "vehicles",
            "compound": { "filter": [
                { "equals": { "value": "Toyota", "path": "make" } },
                { "range": { "path": "price", "gte": 10_000, "lte": 20_000 } },
            ] },
            "sort": { "price": 1 },
        } }];

        let results = run_pipeline(vehicles(), &pipeline, &indexes()).unwrap();

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].get_str("id").unwrap(), "v-1");
    }

    #[test]
    fn unknown_search_index_is_an_error() {
        let pipeline = [doc! { "$search": { "index": "missing", "compound": {} } }];
        let error = run_pipeline(vehicles(), &pipeline, &indexes()).unwrap_err();

        assert!(matches!(error, EntityLayerError::SearchIndexNotFound(index) if index == "missing"));
    }

    #[test]
    fn text_is_substring_and_autocomplete_is_prefix() {
        let compound = doc! { "should": [
            { "autocomplete": { "query": "cor", "path": "model" } },
        ], "minimumShouldMatch": 1 };
        let pipeline = [doc! { "$search": { "index": "vehicles", "compound": compound } }];

        let results = run_pipeline(vehicles(), &pipeline, &indexes()).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].get_str("model").unwrap(), "Corolla");

        let compound = doc! { "filter": [{ "text": { "query": "oroll", "path": "model" } }] };
        let pipeline = [doc! { "$search": { "index": "vehicles", "compound": compound } }];

        let results = run_pipeline(vehicles(), &pipeline, &indexes()).unwrap();
        assert_eq!(results.len(), 1);
    }

    #[test]
    fn must_not_keeps_records_missing_the_field() {
        let compound = doc! { "mustNot": [{ "equals": { "value": "Honda", "path": "make" } }] };
        let pipeline = [doc! { "$search": { "index": "vehicles", "compound": compound } }];

        let results = run_pipeline(vehicles(), &pipeline, &indexes()).unwrap();
        assert_eq!(results.len(), 2);
    }

    #[test]
    fn wildcard_presence_requires_non_null() {
        let compound = doc! { "filter": [
            { "wildcard": { "query": "*", "path": "bluetooth", "allowAnalyzedField": true } },
        ] };
        let pipeline = [doc! { "$search": { "index": "vehicles", "compound": compound } }];

        let results = run_pipeline(vehicles(), &pipeline, &indexes()).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].get_str("id").unwrap(), "v-3");
    }

    #[test]
    fn facet_with_count_hoist_matches_the_service_pipeline() {
        let pipeline = [
            doc! { "$search": {
                "index": "vehicles",
                "compound": { "filter": [{ "equals": { "value": "Toyota", "path": "make" } }] },
            } },
            doc! { "$facet": {
                "results": [{ "$skip": 0_i64 }, { "$limit": 1_i64 }],
                "totalCount": [{ "$count": "count" }],
            } },
            doc! { "$addFields": { "count": { "$arrayElemAt": ["$totalCount.count", 0] } } },
        ];

        let output = run_pipeline(vehicles(), &pipeline, &indexes()).unwrap();

        assert_eq!(output.len(), 1);
        assert_eq!(output[0].get_i64("count").unwrap(), 2);
        assert_eq!(output[0].get_array("results").unwrap().len(), 1);
    }

    #[test]
    fn count_over_an_empty_set_emits_nothing() {
        let pipeline = [
            doc! { "$search": {
                "index": "vehicles",
                "compound": { "filter": [{ "equals": { "value": "Kia", "path": "make" } }] },
            } },
            doc! { "$facet": { "totalCount": [{ "$count": "count" }] } },
            doc! { "$addFields": { "count": { "$arrayElemAt": ["$totalCount.count", 0] } } },
        ];

        let output = run_pipeline(vehicles(), &pipeline, &indexes()).unwrap();

        assert_eq!(output.len(), 1);
        assert!(output[0].get("count").is_none());
        assert_eq!(output[0].get_array("totalCount").unwrap().len(), 0);
    }
}
