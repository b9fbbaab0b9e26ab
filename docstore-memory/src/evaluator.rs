//! Predicate evaluation for in-memory row filtering.
//!
//! This module provides the evaluation engine for backend predicates, enabling filtering and
//! ordering of BSON rows.

use bson::{Bson, datetime::DateTime};
use std::{cmp::Ordering, collections::HashMap};

use docstore_core::{
    error::{DocumentStoreError, DocumentStoreResult},
    query::{Expr, FieldOp, QueryVisitor},
};

/// Comparable representation of BSON values.
///
/// Normalizes all numeric types to f64 so that `Int32`, `Int64` and `Double` values compare
/// by value.
#[derive(Debug)]
pub(crate) enum Comparable<'a> {
    Null,
    Bool(bool),
    /// All integers and floats normalized to f64
    Number(f64),
    DateTime(DateTime),
    String(&'a str),
    Array(Vec<Comparable<'a>>),
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
            Bson::Array(arr) => Comparable::Array(arr.iter().map(Comparable::from).collect()),
            Bson::Document(doc) => Comparable::Map(
                doc.iter()
                    .map(|(k, v)| (k.as_str(), Comparable::from(v)))
                    .collect(),
            ),
            _ => Comparable::Null,
        }
    }
}

impl PartialEq for Comparable<'_> {
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

impl PartialOrd for Comparable<'_> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Comparable::Null, Comparable::Null) => Some(Ordering::Equal),
            (Comparable::Null, _) => Some(Ordering::Less),
            (_, Comparable::Null) => Some(Ordering::Greater),
            (Comparable::Bool(a), Comparable::Bool(b)) => a.partial_cmp(b),
            (Comparable::Number(a), Comparable::Number(b)) => a.partial_cmp(b),
            (Comparable::DateTime(a), Comparable::DateTime(b)) => a.partial_cmp(b),
            (Comparable::String(a), Comparable::String(b)) => a.partial_cmp(b),
            _ => None,
        }
    }
}

/// Evaluates predicates against a single row.
pub(crate) struct RowEvaluator<'a> {
    row: &'a Bson,
}

impl<'a> RowEvaluator<'a> {
    pub fn new(row: &'a Bson) -> Self {
        Self { row }
    }

    pub fn evaluate(&mut self, expr: &Expr) -> DocumentStoreResult<bool> {
        self.visit_expr(expr)
    }

    /// Returns the rows matching `expr`, keeping their order.
    ///
    /// Rows that cannot be evaluated are skipped.
    pub fn filter_rows(rows: impl IntoIterator<Item = &'a Bson>, expr: &Expr) -> Vec<Bson> {
        rows.into_iter()
            .filter(|row| match RowEvaluator::new(row).evaluate(expr) {
                Ok(matches) => matches,
                Err(err) => {
                    tracing::warn!(error = %err, "Skipping row that cannot be evaluated");
                    false
                }
            })
            .cloned()
            .collect()
    }

    fn column(&self, field: &str) -> DocumentStoreResult<Option<&'a Bson>> {
        self.row
            .as_document()
            .map(|doc| doc.get(field))
            .ok_or_else(|| {
                DocumentStoreError::Backend(format!("Row must be a document, got {}", self.row))
            })
    }
}

impl QueryVisitor for RowEvaluator<'_> {
    type Output = bool;
    type Error = DocumentStoreError;

    fn visit_and(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error> {
        for expr in exprs {
            if !self.visit_expr(expr)? {
                return Ok(false);
            }
        }

        Ok(true)
    }

    fn visit_field(
        &mut self,
        field: &str,
        op: FieldOp,
        value: &Bson,
    ) -> Result<Self::Output, Self::Error> {
        let column_value = match self.column(field)? {
            Some(column_value) => column_value,
            None => return Ok(false),
        };

        Ok(match op {
            FieldOp::Eq => Comparable::from(column_value) == Comparable::from(value),
            FieldOp::Lt => matches!(
                Comparable::from(column_value).partial_cmp(&Comparable::from(value)),
                Some(Ordering::Less)
            ),
            FieldOp::Contains => match (Comparable::from(column_value), Comparable::from(value)) {
                (Comparable::String(haystack), Comparable::String(needle)) => {
                    haystack.contains(needle)
                }
                (Comparable::Array(items), needle) => items.iter().any(|item| *item == needle),
                _ => false,
            },
        })
    }
}

/// Orders two rows by a column, treating a missing column as null.
pub(crate) fn compare_column(a: &Bson, b: &Bson, field: &str) -> Ordering {
    let left = a
        .as_document()
        .and_then(|doc| doc.get(field))
        .map(Comparable::from)
        .unwrap_or(Comparable::Null);
    let right = b
        .as_document()
        .and_then(|doc| doc.get(field))
        .map(Comparable::from)
        .unwrap_or(Comparable::Null);

    left.partial_cmp(&right).unwrap_or(Ordering::Equal)
}
