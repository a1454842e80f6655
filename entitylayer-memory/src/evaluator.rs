//! Condition evaluation for in-memory record filtering.
//!
//! This module provides the evaluation engine for condition trees, enabling
//! filtering and comparison operations on BSON records.

use bson::{Bson, Document, datetime::DateTime};
use std::{cmp::Ordering, collections::HashMap};

use entitylayer_core::{
    condition::{CompareOp, Condition, ConditionVisitor},
    error::{EntityLayerError, EntityLayerResult},
};

/// Type-erased, comparable representation of BSON values.
///
/// This enum wraps BSON values and provides comparison operations for
/// filtering records. It normalizes numeric types to f64 for easy comparison.
#[derive(Debug)]
pub(crate) enum Comparable<'a> {
    /// Null value
    Null,
    /// Boolean value
    Bool(bool),
    /// Numeric value (all integers and floats normalized to f64)
    Number(f64),
    /// DateTime value
    DateTime(DateTime),
    /// String value
    String(&'a str),
    /// Array of comparable values
    Array(Vec<Comparable<'a>>),
    /// Map/Object of comparable values
    Map(HashMap<&'a str, Comparable<'a>>),
}

impl<'a> From<&'a Bson> for Comparable<'a> {
    fn from(bson: &'a Bson) -> Self {
        match bson {
            Bson::Null => Comparable::Null,
            Bson::Boolean(value) => Comparable::Bool(*value),
            Bson::Int32(value) => Comparable::Number(*value as f64),
            Bson::Int64(value) => Comparable::Number(*value as f64),
            Bson::Double(value) => Comparable::Number(*value),
            Bson::DateTime(value) => Comparable::DateTime(*value),
            Bson::String(value) => Comparable::String(value),
            Bson::Array(arr) => Comparable::Array(
                arr
                    .iter()
                    .map(Comparable::from)
                    .collect::<Vec<_>>()
            ),
            Bson::Document(doc) => Comparable::Map(
                doc
                    .iter()
                    .map(|(k, v)| (k.as_str(), Comparable::from(v)))
                    .collect::<HashMap<_, _>>()
            ),
            _ => Comparable::Null, // Other types are not comparable
        }
    }
}

impl<'a> PartialEq for Comparable<'a> {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Comparable::Null, Comparable::Null) => true,
            (Comparable::Bool(a), Comparable::Bool(b)) => a == b,
            (Comparable::Number(a), Comparable::Number(b)) => a == b,
            (Comparable::DateTime(a), Comparable::DateTime(b)) => a == b,
            (Comparable::String(a), Comparable::String(b)) => a == b,
            (Comparable::Array(a), Comparable::Array(b)) => a == b,
            (Comparable::Map(a), Comparable::Map(b)) => a == b,
            _ => false,
        }
    }
}

impl<'a> PartialOrd for Comparable<'a> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Comparable::Bool(a), Comparable::Bool(b)) => a.partial_cmp(b),
            (Comparable::Number(a), Comparable::Number(b)) => a.partial_cmp(b),
            (Comparable::DateTime(a), Comparable::DateTime(b)) => a.partial_cmp(b),
            (Comparable::String(a), Comparable::String(b)) => a.partial_cmp(b),
            _ => None,
        }
    }
}

/// Evaluates a condition tree against a single record.
pub(crate) struct RecordEvaluator<'a> {
    record: &'a Document,
}

impl<'a> RecordEvaluator<'a> {
    pub fn new(record: &'a Document) -> Self {
        Self { record }
    }

    pub fn evaluate(&mut self, condition: &Condition) -> EntityLayerResult<bool> {
        self.visit_condition(condition)
    }

    pub fn filter_records(
        records: impl IntoIterator<Item = &'a Document>,
        condition: &Condition,
    ) -> EntityLayerResult<Vec<Document>> {
        Ok(
            records
                .into_iter()
                .filter(|record| {
                    RecordEvaluator::new(record)
                        .evaluate(condition)
                        .unwrap_or(false)
                })
                .cloned()
                .collect::<Vec<_>>()
        )
    }
}

impl<'a> ConditionVisitor for RecordEvaluator<'a> {
    type Output = bool;
    type Error = EntityLayerError;

    fn visit_and(&mut self, conditions: &[Condition]) -> Result<Self::Output, Self::Error> {
        for condition in conditions {
            if !self.visit_condition(condition)? {
                return Ok(false);
            }
        }

        Ok(true)
    }

    fn visit_or(&mut self, conditions: &[Condition]) -> Result<Self::Output, Self::Error> {
        for condition in conditions {
            if self.visit_condition(condition)? {
                return Ok(true);
            }
        }

        Ok(false)
    }

    fn visit_not(&mut self, condition: &Condition) -> Result<Self::Output, Self::Error> {
        Ok(!self.visit_condition(condition)?)
    }

    fn visit_exists(&mut self, field: &str, should_exist: bool) -> Result<Self::Output, Self::Error> {
        Ok(self.record.get(field).is_some() == should_exist)
    }

    fn visit_compare(
        &mut self,
        field: &str,
        op: &CompareOp,
        value: &Bson,
    ) -> Result<Self::Output, Self::Error> {
        match self.record.get(field) {
            Some(field_value) => match op {
                CompareOp::Eq => Ok(Comparable::from(field_value) == Comparable::from(value)),
                CompareOp::Ne => Ok(Comparable::from(field_value) != Comparable::from(value)),
                CompareOp::Gt | CompareOp::Gte | CompareOp::Lt | CompareOp::Lte => {
                    match Comparable::from(field_value).partial_cmp(&Comparable::from(value)) {
                        Some(ordering) => Ok(match op {
                            CompareOp::Gt => ordering == Ordering::Greater,
                            CompareOp::Gte => ordering == Ordering::Greater || ordering == Ordering::Equal,
                            CompareOp::Lt => ordering == Ordering::Less,
                            CompareOp::Lte => ordering == Ordering::Less || ordering == Ordering::Equal,
                            _ => unreachable!(),
                        }),
                        None => Ok(false),
                    }
                },
                CompareOp::In => Ok(overlaps(field_value, value)),
                CompareOp::NotIn => Ok(!overlaps(field_value, value)),
                CompareOp::Contains => match Comparable::from(field_value) {
                    Comparable::Array(array) => Ok(
                        array
                            .iter()
                            .any(|item| item == &Comparable::from(value))
                    ),
                    Comparable::String(left) => match Comparable::from(value) {
                        Comparable::String(right) => Ok(left.contains(right)),
                        _ => Ok(false),
                    },
                    _ => Ok(false),
                },
            },
            None => Ok(false),
        }
    }
}

/// Membership test for `In`/`NotIn`: either side may be a scalar or an array,
/// and any shared element counts as a match.
fn overlaps(field_value: &Bson, value: &Bson) -> bool {
    match (Comparable::from(field_value), Comparable::from(value)) {
        (Comparable::Array(array), Comparable::Array(values)) => values
            .iter()
            .any(|val| array.iter().any(|item| item == val)),
        (Comparable::Array(array), single_value) => {
            array.iter().any(|item| item == &single_value)
        }
        (single_value, Comparable::Array(values)) => {
            values.iter().any(|val| val == &single_value)
        }
        (left, right) => left == right,
    }
}
