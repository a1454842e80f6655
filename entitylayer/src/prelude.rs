//! Convenient re-exports of commonly used types from entitylayer.
//!
//! Import this prelude module to quickly access the most frequently used
//! types and traits without needing to import from multiple sub-modules:
//!
//! ```ignore
//! use entitylayer::prelude::*;
//! ```
//!
//! This provides access to:
//! - The `Entity` trait, extension methods and derive macro
//! - The generic service and repository trait
//! - Condition construction, sorting and pagination
//! - Search filter specifications
//! - Error types

pub use entitylayer_core::{
    condition::{CompareOp, Condition, ConditionVisitor, Query, QueryBuilder, Sort, SortDirection},
    entity::{Entity, EntityExt},
    error::{EntityLayerError, EntityLayerResult},
    page::{Page, PageRequest},
    repository::Repository,
    search::{RangeFilter, SearchFilters, SearchStage},
    service::{DEFAULT_QUERY_LIMIT, Service},
};
pub use entitylayer_macros::Entity;
