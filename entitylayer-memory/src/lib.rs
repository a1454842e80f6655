//! In-memory repository backend for entitylayer.
//!
//! This crate provides a thread-safe, in-memory implementation of the
//! `Repository` trait. It uses async-aware read-write locks for concurrent
//! access and is ideal for development, testing, and small-scale deployments.
//!
//! # Features
//!
//! - **Thread-safe access** - Concurrent reads and writes using async-aware RwLock
//! - **Full query support** - Supports filtering, sorting, projection and pagination
//! - **Search emulation** - Interprets the search pipelines the service layer
//!   produces against registered in-memory search indexes
//!
//! # Quick Start
//!
//! ```ignore
//! use entitylayer::{prelude::*, memory::InMemoryRepository};
//! use bson::doc;
//! use serde::{Serialize, Deserialize};
//!
//! #[derive(Debug, Clone, Serialize, Deserialize, Entity)]
//! #[entity(collection = "conversations")]
//! pub struct Conversation {
//!     pub id: String,
//!     pub version: String,
//!     pub updated_at: i64,
//!     pub title: String,
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let repository = InMemoryRepository::new();
//!     let conversations = Service::<_, Conversation>::new(repository)?;
//!
//!     conversations
//!         .create(doc! { "id": "c-1", "title": "hello", "created_at": 1_700_000_000_000_i64 })
//!         .await?;
//!
//!     Ok(())
//! }
//! ```

#[allow(unused_extern_crates)]
extern crate self as entitylayer_memory;

pub mod evaluator;
pub mod pipeline;
pub mod store;

pub use store::InMemoryRepository;
