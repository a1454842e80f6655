//! End-to-end tests of the service layer over the in-memory backend.

use bson::{Bson, doc};
use entitylayer::{memory::InMemoryRepository, prelude::*};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Entity)]
#[entity(collection = "vehicles")]
struct Vehicle {
    id: String,
    version: String,
    updated_at: i64,
    make: String,
    model: String,
    price: i32,
    #[serde(default)]
    tags: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Entity)]
#[entity(collection = "", version = "3.0.0")]
struct Misdeclared {
    id: String,
    updated_at: i64,
}

async fn seeded() -> (InMemoryRepository, Service<InMemoryRepository, Vehicle>) {
    let repository = InMemoryRepository::new();
    let vehicles = Service::new(repository.clone()).unwrap();

    for (id, make, model, price) in [
        ("v-1", "Toyota", "Corolla", 15_000),
        ("v-2", "Toyota", "Yaris", 9_000),
        ("v-3", "Honda", "Civic", 18_000),
    ] {
        vehicles
            .create(doc! { "id": id, "make": make, "model": model, "price": price })
            .await
            .unwrap();
    }

    (repository, vehicles)
}

#[tokio::test]
async fn create_stamps_version_and_timestamp() {
    let (_, vehicles) = seeded().await;
    let vehicle = vehicles.get("v-1").await.unwrap().unwrap();

    assert_eq!(vehicle.version, "1.0.0");
    assert!(vehicle.updated_at > 0);
    assert_eq!(vehicle.make, "Toyota");
}

#[tokio::test]
async fn create_rejects_wrong_version_tag() {
    let (_, vehicles) = seeded().await;
    let error = vehicles
        .create(doc! { "id": "v-9", "make": "Kia", "model": "Rio", "price": 7_000, "version": "9.9.9" })
        .await
        .unwrap_err();

    assert!(matches!(error, EntityLayerError::Validation(_)));
    assert!(vehicles.get("v-9").await.unwrap().is_none());
}

#[tokio::test]
async fn misdeclared_collection_fails_at_construction() {
    let error = Service::<_, Misdeclared>::new(InMemoryRepository::new()).unwrap_err();

    assert!(matches!(error, EntityLayerError::Configuration(_)));
}

#[tokio::test]
async fn update_misses_are_none_not_errors() {
    let (_, vehicles) = seeded().await;

    let result = vehicles
        .update(doc! { "id": "v-9", "make": "Kia", "model": "Rio", "price": 7_000 })
        .await
        .unwrap();
    assert!(result.is_none());

    let result = vehicles
        .set(doc! { "id": "v-9", "make": "Kia", "model": "Rio", "price": 7_000 })
        .await
        .unwrap();
    assert!(result.is_none());
}

#[tokio::test]
async fn apply_update_then_persist_restamps_the_record() {
    let (_, vehicles) = seeded().await;
    let mut vehicle = vehicles.get("v-1").await.unwrap().unwrap();
    let before = vehicle.updated_at;

    vehicle.apply_update(doc! { "price": 14_000 }).unwrap();
    let updated = vehicles
        .update(vehicle.to_document().unwrap())
        .await
        .unwrap()
        .unwrap();

    assert_eq!(updated.price, 14_000);
    assert!(updated.updated_at > before);

    let stored = vehicles.get("v-1").await.unwrap().unwrap();
    assert_eq!(stored, updated);
}

#[tokio::test]
async fn update_many_counts_matches() {
    let (_, vehicles) = seeded().await;

    let matched = vehicles
        .update_many(&Condition::eq("make", "Toyota"), doc! { "certified": true })
        .await
        .unwrap();

    assert_eq!(matched, 2);
}

#[tokio::test]
async fn query_family_caps_and_counts() {
    let (_, vehicles) = seeded().await;

    let records = vehicles
        .query(Query::builder().filter(Condition::eq("make", "Toyota")).build())
        .await
        .unwrap();
    assert_eq!(records.len(), 2);

    let (count, records) = vehicles
        .query_with_count(
            Query::builder()
                .filter(Condition::gte("price", 10_000))
                .limit(1)
                .build(),
        )
        .await
        .unwrap();
    assert_eq!(count, 2);
    assert_eq!(records.len(), 1);

    let first = vehicles
        .query_one(Query::builder().sort("price", SortDirection::Asc).build())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(first.get_str("id").unwrap(), "v-2");
}

#[tokio::test]
async fn query_paginated_navigates() {
    let (_, vehicles) = seeded().await;

    let page = vehicles
        .query_paginated(
            PageRequest::new(2, 1),
            Query::builder().sort("price", SortDirection::Asc).build(),
        )
        .await
        .unwrap();

    assert_eq!(page.count, 3);
    assert_eq!(page.items.len(), 1);
    assert_eq!(page.items[0].get_str("id").unwrap(), "v-1");
    assert_eq!(page.next_page, Some(3));
    assert_eq!(page.previous_page, Some(1));
}

#[tokio::test]
async fn unfiltered_search_degrades_to_plain_pagination() {
    // No search index registered: an empty filter specification must not
    // touch the search pipeline at all.
    let (_, vehicles) = seeded().await;

    let searched = vehicles
        .search_paginated(
            "vehicles",
            PageRequest::new(1, 2),
            &SearchFilters::new(),
            Some(Sort::asc("price")),
        )
        .await
        .unwrap();
    let queried = vehicles
        .query_paginated(
            PageRequest::new(1, 2),
            Query::builder().sort("price", SortDirection::Asc).build(),
        )
        .await
        .unwrap();

    assert_eq!(searched, queried);
    assert_eq!(searched.count, 3);
    assert_eq!(searched.items.len(), 2);
}

#[tokio::test]
async fn filtered_search_pages_with_facet_counts() {
    let (repository, vehicles) = seeded().await;
    repository.create_search_index("vehicles", "vehicles").await;

    let filters = SearchFilters::new()
        .equals("make", "Toyota")
        .range("price", RangeFilter::new().gte(5_000).lte(20_000));

    let page = vehicles
        .search_paginated("vehicles", PageRequest::new(1, 1), &filters, Some(Sort::asc("price")))
        .await
        .unwrap();

    assert_eq!(page.count, 2);
    assert_eq!(page.items.len(), 1);
    assert_eq!(page.items[0].get_str("id").unwrap(), "v-2");
    assert_eq!(page.next_page, Some(2));

    let page = vehicles
        .search_paginated("vehicles", PageRequest::new(2, 1), &filters, Some(Sort::asc("price")))
        .await
        .unwrap();

    assert_eq!(page.items[0].get_str("id").unwrap(), "v-1");
    assert_eq!(page.next_page, None);
    assert_eq!(page.previous_page, Some(1));
}

#[tokio::test]
async fn search_unlimited_returns_the_full_match_set() {
    let (repository, vehicles) = seeded().await;
    repository.create_search_index("vehicles", "vehicles").await;

    let records = vehicles
        .search_unlimited(
            "vehicles",
            &SearchFilters::new().autocomplete("model", "C"),
            Some(Sort::desc("price")),
        )
        .await
        .unwrap();

    assert_eq!(records.len(), 2);
    assert_eq!(records[0].get_str("model").unwrap(), "Civic");
    assert_eq!(records[1].get_str("model").unwrap(), "Corolla");
}

#[tokio::test]
async fn search_against_unknown_index_is_an_error() {
    let (_, vehicles) = seeded().await;

    let error = vehicles
        .search_paginated(
            "nonexistent",
            PageRequest::default(),
            &SearchFilters::new().equals("make", "Toyota"),
            None,
        )
        .await
        .unwrap_err();

    assert!(matches!(error, EntityLayerError::SearchIndexNotFound(index) if index == "nonexistent"));
}

#[tokio::test]
async fn array_helpers_dedupe_and_pull() {
    let (_, vehicles) = seeded().await;

    vehicles.push_array("v-1", "tags", "clean").await.unwrap();
    vehicles
        .push_array_many(
            "v-1",
            "tags",
            vec![Bson::from("clean"), Bson::from("inspected")],
            None,
            true,
        )
        .await
        .unwrap();

    let vehicle = vehicles.get("v-1").await.unwrap().unwrap();
    assert_eq!(vehicle.tags, vec!["clean".to_string(), "inspected".to_string()]);

    vehicles
        .pull_array("v-1", "tags", "clean", None)
        .await
        .unwrap();

    let vehicle = vehicles.get("v-1").await.unwrap().unwrap();
    assert_eq!(vehicle.tags, vec!["inspected".to_string()]);
}

#[tokio::test]
async fn hydrate_turns_raw_records_back_into_entities() {
    let (_, vehicles) = seeded().await;

    let records = vehicles
        .query_unlimited(Query::builder().sort("price", SortDirection::Asc).build())
        .await
        .unwrap();
    let typed = vehicles.hydrate_all(records).unwrap();

    assert_eq!(typed.len(), 3);
    assert_eq!(typed[0].model, "Yaris");
}
