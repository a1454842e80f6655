//! Typed conditions for plain (indexed) repository queries.
//!
//! The service's plain-query family filters records with [`Condition`] trees
//! instead of stringly-typed `(field, operator, value)` triples, so malformed
//! filters are caught at compile time rather than at query-build time. Each
//! backend supplies its own translation or evaluation by implementing
//! [`ConditionVisitor`].
//!
//! # Example
//!
//! ```ignore
//! use entitylayer::condition::{Condition, Query, SortDirection};
//!
//! let query = Query::builder()
//!     .filter(Condition::eq("make", "Toyota").and(Condition::gte("year", 2020)))
//!     .sort("price", SortDirection::Asc)
//!     .limit(20)
//!     .build();
//! ```

use bson::Bson;

use crate::error::EntityLayerError;

/// Sort direction for query results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    /// Ascending order.
    Asc,
    /// Descending order.
    Desc,
}

/// Sort specification: which field to sort by and in which direction.
#[derive(Debug, Clone)]
pub struct Sort {
    /// The field name to sort by.
    pub field: String,
    /// The sort direction.
    pub direction: SortDirection,
}

impl Sort {
    pub fn asc(field: impl Into<String>) -> Self {
        Sort { field: field.into(), direction: SortDirection::Asc }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Sort { field: field.into(), direction: SortDirection::Desc }
    }
}

/// Field comparison operators for plain-query conditions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompareOp {
    /// Equal to (exact match).
    Eq,
    /// Not equal to.
    Ne,
    /// Greater than.
    Gt,
    /// Greater than or equal to.
    Gte,
    /// Less than.
    Lt,
    /// Less than or equal to.
    Lte,
    /// Field value is one of the given values.
    In,
    /// Field value is none of the given values.
    NotIn,
    /// String or array field contains the value.
    Contains,
}

/// A condition tree for filtering records in plain queries.
///
/// Conditions are additive: combine them with [`Condition::and`],
/// [`Condition::or`], and [`Condition::negate`] to build compound predicates.
#[derive(Debug, Clone)]
pub enum Condition {
    /// All inner conditions must match.
    And(Vec<Condition>),
    /// Any inner condition must match.
    Or(Vec<Condition>),
    /// The inner condition must not match.
    Not(Box<Condition>),
    /// The field must exist (or not exist) on the record.
    Exists(String, bool),
    /// Field comparison against a typed value.
    Compare {
        /// The field name to compare.
        field: String,
        /// The comparison operator.
        op: CompareOp,
        /// The value to compare against.
        value: Bson,
    },
}

impl Condition {
    fn compare(field: impl Into<String>, op: CompareOp, value: impl Into<Bson>) -> Self {
        Condition::Compare { field: field.into(), op, value: value.into() }
    }

    /// Matches records where the field equals the value.
    pub fn eq(field: impl Into<String>, value: impl Into<Bson>) -> Self {
        Self::compare(field, CompareOp::Eq, value)
    }

    /// Matches records where the field does not equal the value.
    pub fn ne(field: impl Into<String>, value: impl Into<Bson>) -> Self {
        Self::compare(field, CompareOp::Ne, value)
    }

    /// Matches records where the field is greater than the value.
    pub fn gt(field: impl Into<String>, value: impl Into<Bson>) -> Self {
        Self::compare(field, CompareOp::Gt, value)
    }

    /// Matches records where the field is greater than or equal to the value.
    pub fn gte(field: impl Into<String>, value: impl Into<Bson>) -> Self {
        Self::compare(field, CompareOp::Gte, value)
    }

    /// Matches records where the field is less than the value.
    pub fn lt(field: impl Into<String>, value: impl Into<Bson>) -> Self {
        Self::compare(field, CompareOp::Lt, value)
    }

    /// Matches records where the field is less than or equal to the value.
    pub fn lte(field: impl Into<String>, value: impl Into<Bson>) -> Self {
        Self::compare(field, CompareOp::Lte, value)
    }

    /// Matches records where the field is one of the given values.
    pub fn any_of(field: impl Into<String>, values: impl IntoIterator<Item = impl Into<Bson>>) -> Self {
        Self::compare(
            field,
            CompareOp::In,
            Bson::Array(values.into_iter().map(Into::into).collect()),
        )
    }

    /// Matches records where the field is none of the given values.
    pub fn none_of(field: impl Into<String>, values: impl IntoIterator<Item = impl Into<Bson>>) -> Self {
        Self::compare(
            field,
            CompareOp::NotIn,
            Bson::Array(values.into_iter().map(Into::into).collect()),
        )
    }

    /// Matches records where the string or array field contains the value.
    pub fn contains(field: impl Into<String>, value: impl Into<Bson>) -> Self {
        Self::compare(field, CompareOp::Contains, value)
    }

    /// Matches records where the field exists.
    pub fn exists(field: impl Into<String>) -> Self {
        Condition::Exists(field.into(), true)
    }

    /// Matches records where the field does not exist.
    pub fn not_exists(field: impl Into<String>) -> Self {
        Condition::Exists(field.into(), false)
    }

    /// Combines this condition with another, both must match.
    pub fn and(self, other: Condition) -> Self {
        match self {
            Condition::And(mut list) => {
                list.push(other);
                Condition::And(list)
            }
            _ => Condition::And(vec![self, other]),
        }
    }

    /// Combines this condition with another, either must match.
    pub fn or(self, other: Condition) -> Self {
        match self {
            Condition::Or(mut list) => {
                list.push(other);
                Condition::Or(list)
            }
            _ => Condition::Or(vec![self, other]),
        }
    }

    /// Negates this condition.
    pub fn negate(self) -> Self {
        Condition::Not(Box::new(self))
    }

    /// All of the given conditions must match.
    pub fn all(conditions: impl IntoIterator<Item = Condition>) -> Self {
        Condition::And(conditions.into_iter().collect())
    }

    /// Any of the given conditions must match.
    pub fn any(conditions: impl IntoIterator<Item = Condition>) -> Self {
        Condition::Or(conditions.into_iter().collect())
    }
}

/// A structured plain query: filter, sort, projection, and window.
#[derive(Debug, Clone, Default)]
pub struct Query {
    /// Optional condition tree to match records.
    pub filter: Option<Condition>,
    /// Sort specification for results.
    pub sort: Option<Sort>,
    /// Fields to include in the returned records (all fields when `None`).
    pub projection: Option<Vec<String>>,
    /// Maximum number of records to return.
    pub limit: Option<usize>,
    /// Number of records to skip (for pagination).
    pub offset: Option<usize>,
}

impl Query {
    /// Creates a new empty query matching every record.
    pub fn new() -> Self {
        Query::default()
    }

    /// Creates a builder for fluent query construction.
    pub fn builder() -> QueryBuilder {
        QueryBuilder::new()
    }
}

/// Fluent builder for [`Query`].
#[derive(Debug, Clone, Default)]
pub struct QueryBuilder {
    query: Query,
}

impl QueryBuilder {
    pub fn new() -> Self {
        QueryBuilder { query: Query::default() }
    }

    /// Sets the condition tree for this query.
    pub fn filter(mut self, filter: Condition) -> Self {
        self.query.filter = Some(filter);
        self
    }

    /// Sets the sort field and direction.
    pub fn sort(mut self, field: impl Into<String>, direction: SortDirection) -> Self {
        self.query.sort = Some(Sort { field: field.into(), direction });
        self
    }

    /// Restricts returned records to the given fields.
    pub fn projection(mut self, fields: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.query.projection = Some(fields.into_iter().map(Into::into).collect());
        self
    }

    /// Sets the maximum number of records to return.
    pub fn limit(mut self, limit: usize) -> Self {
        self.query.limit = Some(limit);
        self
    }

    /// Sets the number of records to skip.
    pub fn offset(mut self, offset: usize) -> Self {
        self.query.offset = Some(offset);
        self
    }

    /// Builds and returns the final query.
    pub fn build(self) -> Query {
        self.query
    }
}

/// Visitor over [`Condition`] trees.
///
/// Backends implement this to translate conditions into their native query
/// representation (a BSON filter document for MongoDB, a boolean evaluation
/// for the in-memory store).
pub trait ConditionVisitor {
    type Output;
    type Error: Into<EntityLayerError>;

    fn visit_and(&mut self, conditions: &[Condition]) -> Result<Self::Output, Self::Error>;
    fn visit_or(&mut self, conditions: &[Condition]) -> Result<Self::Output, Self::Error>;
    fn visit_not(&mut self, condition: &Condition) -> Result<Self::Output, Self::Error>;
    fn visit_exists(
        &mut self,
        field: &str,
        should_exist: bool,
    ) -> Result<Self::Output, Self::Error>;
    fn visit_compare(
        &mut self,
        field: &str,
        op: &CompareOp,
        value: &Bson,
    ) -> Result<Self::Output, Self::Error>;

    fn visit_condition(&mut self, condition: &Condition) -> Result<Self::Output, Self::Error> {
        match condition {
            Condition::And(conditions) => self.visit_and(conditions),
            Condition::Or(conditions) => self.visit_or(conditions),
            Condition::Not(condition) => self.visit_not(condition),
            Condition::Exists(field, should_exist) => self.visit_exists(field, *should_exist),
            Condition::Compare { field, op, value } => self.visit_compare(field, op, value),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn and_combinator_flattens() {
        let condition = Condition::eq("make", "Toyota")
            .and(Condition::gte("year", 2020))
            .and(Condition::lte("km", 50_000));

        match condition {
            Condition::And(list) => assert_eq!(list.len(), 3),
            other => panic!("expected And, got {other:?}"),
        }
    }

    #[test]
    fn builder_assembles_full_query() {
        let query = Query::builder()
            .filter(Condition::exists("price"))
            .sort("price", SortDirection::Desc)
            .projection(["price", "make"])
            .limit(10)
            .offset(20)
            .build();

        assert!(query.filter.is_some());
        assert_eq!(query.sort.as_ref().unwrap().field, "price");
        assert_eq!(query.projection.as_deref(), Some(&["price".to_string(), "make".to_string()][..]));
        assert_eq!(query.limit, Some(10));
        assert_eq!(query.offset, Some(20));
    }
}
