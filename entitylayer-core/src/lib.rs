//! A generic entity service layer over document databases.
//!
//! This crate is the core of the entitylayer project and provides:
//!
//! - **Entity traits** ([`entity`]) - Core traits for defining, serializing and hydrating entity models
//! - **Repository abstraction** ([`repository`]) - The backend trait every storage engine implements
//! - **Query and filtering API** ([`condition`]) - Type-safe condition construction, sorting and projection
//! - **Search filter compiler** ([`search`]) - Compiles filter specifications into search-index stages
//! - **Generic service** ([`service`]) - High-level CRUD, query, pagination and search operations
//! - **Pagination types** ([`page`]) - Page requests and page results
//! - **Error handling** ([`error`]) - Error types and result aliases
//!
//! # Example
//!
//! ```ignore
//! use entitylayer_core::{entity::Entity, service::Service};
//! use serde::{Serialize, Deserialize};
//!
//! #[derive(Debug, Clone, Serialize, Deserialize)]
//! pub struct Conversation {
//!     pub id: String,
//!     pub version: String,
//!     pub updated_at: i64,
//!     pub title: String,
//! }
//!
//! impl Entity for Conversation {
//!     fn collection_name() -> &'static str {
//!         "conversations"
//!     }
//!
//!     fn schema_version() -> &'static str {
//!         "1.0.0"
//!     }
//!
//!     fn id(&self) -> &str {
//!         &self.id
//!     }
//!
//!     fn updated_at(&self) -> i64 {
//!         self.updated_at
//!     }
//!
//!     fn set_updated_at(&mut self, updated_at: i64) {
//!         self.updated_at = updated_at;
//!     }
//! }
//! ```

#[allow(unused_extern_crates)]
extern crate self as entitylayer_core;

pub mod condition;
pub mod entity;
pub mod error;
pub mod page;
pub mod repository;
pub mod search;
pub mod service;
