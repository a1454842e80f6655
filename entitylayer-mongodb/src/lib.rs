//! MongoDB backend implementation for entitylayer.
//!
//! This crate provides a MongoDB-based implementation of the `Repository`
//! trait, enabling persistent record storage with full query support using
//! MongoDB's querying capabilities and Atlas Search for the search pipeline
//! family.
//!
//! To use this backend, include the `mongodb` feature in your `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! entitylayer = { version = "x.y.z", features = ["mongodb"] }
//! ```
//!
//! # Features
//!
//! - **Persistent storage** - Data is persisted to MongoDB Atlas or self-hosted MongoDB
//! - **Full query support** - Leverages MongoDB's query engine for filtering and sorting
//! - **Search pipelines** - `$search` aggregations run against Atlas Search indexes
//! - **Async/await** - Fully asynchronous API built on MongoDB's async driver
//!
//! # Connection
//!
//! To use this backend, you need a MongoDB connection string. This can be
//! provided through the builder pattern.
//!
//! # Example
//!
//! ```ignore
//! use entitylayer::mongodb::MongoRepository;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let repository = MongoRepository::builder("mongodb://localhost:27017", "my_database")
//!         .build()
//!         .await?;
//!
//!     Ok(())
//! }
//! ```

#[allow(unused_extern_crates)]
extern crate self as entitylayer_mongodb;

pub mod query;
pub mod store;

pub use store::{MongoRepository, MongoRepositoryBuilder};
