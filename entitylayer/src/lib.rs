//! Main entitylayer crate providing a generic entity service layer over
//! document databases.
//!
//! This crate is the primary entry point for users of the entitylayer
//! framework. It re-exports the core types and functionality from various
//! sub-crates and provides convenient access to different storage backends.
//!
//! # Features
//!
//! - **Type-safe entity models** - Define your data structures with Serde and
//!   derive `Entity` for automatic schema-version and timestamp bookkeeping
//! - **Multiple backends** - Support for in-memory and MongoDB storage with an
//!   extensible repository trait
//! - **Flexible querying** - Composable condition API for filtering, sorting,
//!   projection and pagination
//! - **Search** - Typed filter specifications compiled into search-index
//!   pipelines with faceted counts
//!
//! # Quick Start
//!
//! ```ignore
//! use entitylayer::{prelude::*, memory::InMemoryRepository};
//! use bson::doc;
//! use serde::{Serialize, Deserialize};
//!
//! #[derive(Debug, Clone, Serialize, Deserialize, Entity)]
//! #[entity(collection = "vehicles")]
//! pub struct Vehicle {
//!     pub id: String,
//!     pub version: String,
//!     pub updated_at: i64,
//!     pub make: String,
//!     pub model: String,
//!     pub price: i32,
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let repository = InMemoryRepository::new();
//!     let vehicles = Service::<_, Vehicle>::new(repository)?;
//!
//!     // Create a vehicle; version and updated_at are stamped automatically
//!     let vehicle = vehicles
//!         .create(doc! { "id": "v-1", "make": "Toyota", "model": "Corolla", "price": 15_000 })
//!         .await?;
//!
//!     // Query it back
//!     let toyotas = vehicles
//!         .query(Query::builder().filter(Condition::eq("make", "Toyota")).build())
//!         .await?;
//!
//!     println!("found {} vehicle(s), first is {:?}", toyotas.len(), vehicle);
//!
//!     Ok(())
//! }
//! ```
//!
//! # Search
//!
//! The search family compiles a [`SearchFilters`](search::SearchFilters)
//! specification into a search-index pipeline with a faceted total count.
//! When no filters are supplied, search transparently degrades to a plain
//! paginated query:
//!
//! ```ignore
//! use entitylayer::prelude::*;
//!
//! let filters = SearchFilters::new()
//!     .equals("make", "Toyota")
//!     .range("price", RangeFilter::new().gte(10_000).lte(20_000));
//!
//! let page = vehicles
//!     .search_paginated("vehicles", PageRequest::new(1, 20), &filters, Some(Sort::asc("price")))
//!     .await?;
//! ```
//!
//! # Backends
//!
//! - [`memory`] - Fast in-memory storage for development and testing
//! - [`mongodb`] - Persistent MongoDB backend with Atlas Search (requires the
//!   `mongodb` feature)

pub mod prelude;

pub use entitylayer_core::{condition, entity, error, page, repository, search, service};

// Re-export BSON types for convenience
pub use bson;

/// In-memory repository backend implementations.
pub mod memory {
    pub use entitylayer_memory::InMemoryRepository;
}

/// MongoDB repository backend implementations.
///
/// This module is only available when the `mongodb` feature is enabled.
#[cfg(feature = "mongodb")]
pub mod mongodb {
    pub use entitylayer_mongodb::{MongoRepository, MongoRepositoryBuilder};
}
