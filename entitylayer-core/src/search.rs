//! Search filter specification and the filter-to-stage compiler.
//!
//! This module translates a set of typed filter categories plus an optional
//! sort into the body of a search-engine `$search` stage. Categories are
//! independent and additive: the compiled stage is the union of all non-empty
//! categories, and an entirely empty specification compiles to a stage with an
//! empty compound clause, which callers treat as "no search, use a plain
//! query" (see [`crate::service::Service::search_paginated`]).
//!
//! Strict categories (text, equals, range, not-null) land in the compound
//! `filter` bucket; negated categories land in `mustNot`. Autocomplete is the
//! deliberate exception: its clauses land in a `should` bucket with
//! `minimumShouldMatch = 1`, so fuzzy prefix matches are optional-but-at-
//! least-one rather than strict AND constraints.

use bson::{Bson, Document, doc};

/// Range bounds for a single field, applied in the compound `filter` bucket.
///
/// Only the bounds that are set appear in the compiled clause.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RangeFilter {
    pub gt: Option<Bson>,
    pub gte: Option<Bson>,
    pub lt: Option<Bson>,
    pub lte: Option<Bson>,
}

impl RangeFilter {
    pub fn new() -> Self {
        RangeFilter::default()
    }

    pub fn gt(mut self, value: impl Into<Bson>) -> Self {
        self.gt = Some(value.into());
        self
    }

    pub fn gte(mut self, value: impl Into<Bson>) -> Self {
        self.gte = Some(value.into());
        self
    }

    pub fn lt(mut self, value: impl Into<Bson>) -> Self {
        self.lt = Some(value.into());
        self
    }

    pub fn lte(mut self, value: impl Into<Bson>) -> Self {
        self.lte = Some(value.into());
        self
    }

    fn to_clause(&self, path: &str) -> Document {
        let mut range = doc! { "path": path };

        if let Some(bound) = &self.gt {
            range.insert("gt", bound.clone());
        }
        if let Some(bound) = &self.gte {
            range.insert("gte", bound.clone());
        }
        if let Some(bound) = &self.lt {
            range.insert("lt", bound.clone());
        }
        if let Some(bound) = &self.lte {
            range.insert("lte", bound.clone());
        }

        doc! { "range": range }
    }
}

/// A set of named filter categories for a search operation.
///
/// Field order within a category is preserved in the compiled stage.
///
/// # Example
///
/// ```ignore
/// use entitylayer::search::{RangeFilter, SearchFilters, SearchStage};
///
/// let filters = SearchFilters::new()
///     .equals("make", "Toyota")
///     .range("price", RangeFilter::new().gte(10_000).lte(20_000));
///
/// let stage = SearchStage::compile("vehicles", &filters, None);
/// assert!(!stage.is_unfiltered());
/// ```
#[derive(Debug, Clone, Default)]
pub struct SearchFilters {
    text: Vec<(String, String)>,
    autocomplete: Vec<(String, String)>,
    equals: Vec<(String, Bson)>,
    range: Vec<(String, RangeFilter)>,
    not_text: Vec<(String, String)>,
    not_autocomplete: Vec<(String, String)>,
    not_equals: Vec<(String, Bson)>,
    not_null: Vec<String>,
}

impl SearchFilters {
    pub fn new() -> Self {
        SearchFilters::default()
    }

    /// Requires an analyzed text match on the field.
    pub fn text(mut self, field: impl Into<String>, query: impl Into<String>) -> Self {
        self.text.push((field.into(), query.into()));
        self
    }

    /// Adds a relaxed prefix match on the field; at least one autocomplete
    /// clause must match, but no single one is required.
    pub fn autocomplete(mut self, field: impl Into<String>, query: impl Into<String>) -> Self {
        self.autocomplete.push((field.into(), query.into()));
        self
    }

    /// Requires the field to equal the value exactly.
    pub fn equals(mut self, field: impl Into<String>, value: impl Into<Bson>) -> Self {
        self.equals.push((field.into(), value.into()));
        self
    }

    /// Requires the field to fall within the given bounds.
    pub fn range(mut self, field: impl Into<String>, range: RangeFilter) -> Self {
        self.range.push((field.into(), range));
        self
    }

    /// Excludes records with an analyzed text match on the field.
    pub fn not_text(mut self, field: impl Into<String>, query: impl Into<String>) -> Self {
        self.not_text.push((field.into(), query.into()));
        self
    }

    /// Excludes records with a prefix match on the field.
    pub fn not_autocomplete(mut self, field: impl Into<String>, query: impl Into<String>) -> Self {
        self.not_autocomplete.push((field.into(), query.into()));
        self
    }

    /// Excludes records where the field equals the value.
    pub fn not_equals(mut self, field: impl Into<String>, value: impl Into<Bson>) -> Self {
        self.not_equals.push((field.into(), value.into()));
        self
    }

    /// Requires the field to be present and non-null (wildcard presence test).
    pub fn not_null(mut self, field: impl Into<String>) -> Self {
        self.not_null.push(field.into());
        self
    }

    /// Returns `true` when every category is empty.
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
            && self.autocomplete.is_empty()
            && self.equals.is_empty()
            && self.range.is_empty()
            && self.not_text.is_empty()
            && self.not_autocomplete.is_empty()
            && self.not_equals.is_empty()
            && self.not_null.is_empty()
    }
}

fn text_clause(path: &str, query: &str) -> Document {
    doc! { "text": { "query": query, "path": path } }
}

fn autocomplete_clause(path: &str, query: &str) -> Document {
    doc! { "autocomplete": { "query": query, "path": path } }
}

fn equals_clause(path: &str, value: &Bson) -> Document {
    doc! { "equals": { "value": value.clone(), "path": path } }
}

fn wildcard_clause(path: &str) -> Document {
    doc! { "wildcard": { "query": "*", "path": path, "allowAnalyzedField": true } }
}

/// The compiled body of a `$search` pipeline stage.
///
/// Produced by [`SearchStage::compile`]; rendered with
/// [`SearchStage::to_document`]. A stage whose compound clause is empty means
/// "no search filters were supplied" and must not be sent to a search index.
#[derive(Debug, Clone)]
pub struct SearchStage {
    index: String,
    filter: Vec<Document>,
    must_not: Vec<Document>,
    should: Vec<Document>,
    sort: Option<Document>,
}

impl SearchStage {
    /// Compiles a filter specification into a search stage.
    ///
    /// Pure translation: the result depends only on the arguments. `sort`
    /// attaches at stage level, outside the compound clause.
    pub fn compile(index: &str, filters: &SearchFilters, sort: Option<Document>) -> Self {
        let mut filter = Vec::new();
        let mut must_not = Vec::new();
        let mut should = Vec::new();

        for (path, query) in &filters.text {
            filter.push(text_clause(path, query));
        }
        for (path, value) in &filters.equals {
            filter.push(equals_clause(path, value));
        }
        for (path, range) in &filters.range {
            filter.push(range.to_clause(path));
        }
        for path in &filters.not_null {
            filter.push(wildcard_clause(path));
        }

        for (path, query) in &filters.not_text {
            must_not.push(text_clause(path, query));
        }
        for (path, query) in &filters.not_autocomplete {
            must_not.push(autocomplete_clause(path, query));
        }
        for (path, value) in &filters.not_equals {
            must_not.push(equals_clause(path, value));
        }

        for (path, query) in &filters.autocomplete {
            should.push(autocomplete_clause(path, query));
        }

        SearchStage { index: index.to_string(), filter, must_not, should, sort }
    }

    /// Returns `true` when the compound clause is empty, i.e. no filters were
    /// supplied. Callers must fall back to a plain query in that case.
    pub fn is_unfiltered(&self) -> bool {
        self.filter.is_empty() && self.must_not.is_empty() && self.should.is_empty()
    }

    /// The search index this stage targets.
    pub fn index(&self) -> &str {
        &self.index
    }

    /// Renders the stage body for use as the value of a `$search` key.
    pub fn to_document(&self) -> Document {
        let mut compound = Document::new();

        if !self.filter.is_empty() {
            compound.insert("filter", self.filter.clone());
        }
        if !self.must_not.is_empty() {
            compound.insert("mustNot", self.must_not.clone());
        }
        if !self.should.is_empty() {
            compound.insert("should", self.should.clone());
            compound.insert("minimumShouldMatch", 1);
        }

        let mut stage = doc! { "index": &self.index, "compound": compound };

        if let Some(sort) = &self.sort {
            stage.insert("sort", sort.clone());
        }

        stage
    }
}
