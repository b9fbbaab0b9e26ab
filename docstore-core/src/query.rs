//! Storage-level predicates and queries.
//!
//! Backends receive a [`Query`] built from [`Expr`] predicates over row columns. The
//! expression language is deliberately small: conjunction, equality, less-than and substring
//! containment (SQL `LIKE '%value%'`). Backends translate it by implementing
//! [`QueryVisitor`].
//!
//! [`PropertyQuery::compile`] splits a user-supplied property map into the part a backend can
//! evaluate and the residual constraints left for [`DocumentFilter`](crate::filter::DocumentFilter).
//!
//! # Example
//!
//! ```ignore
//! use docstore_core::query::{Filter, Query, SortDirection};
//!
//! let query = Query::builder()
//!     .filter(Filter::eq("db", "people").and(Filter::eq("deleted", false)))
//!     .sort("db", SortDirection::Asc)
//!     .limit(10)
//!     .build();
//! ```

use bson::{Bson, ser::serialize_to_bson};
use serde_json::{Map, Value};

use crate::{
    document::{DECLARED_ATTRIBUTES, split_guid},
    error::{DocumentStoreError, DocumentStoreResult},
    mapper::columns,
};

/// Sort direction for query results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    /// Ascending order.
    Asc,
    /// Descending order.
    Desc,
}

/// Sort specification for one column.
#[derive(Debug, Clone, PartialEq)]
pub struct Sort {
    /// The column to sort by.
    pub field: String,
    /// The sort direction.
    pub direction: SortDirection,
}

/// Column comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldOp {
    /// Equal to.
    Eq,
    /// Less than.
    Lt,
    /// String column contains the value as a substring.
    Contains,
}

/// A predicate over row columns.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Logical AND of multiple expressions (all must match). An empty list matches every row.
    And(Vec<Expr>),
    /// Column comparison expression.
    Field {
        /// The column to compare.
        field: String,
        /// The comparison operator.
        op: FieldOp,
        /// The value to compare against.
        value: Bson,
    },
}

impl Expr {
    /// Creates a column comparison expression.
    pub fn field(field: String, op: FieldOp, value: Bson) -> Self {
        Expr::Field { field, op, value }
    }

    /// Combines this expression with another using logical AND.
    ///
    /// If this expression is already an AND, the other expression is appended to the list.
    pub fn and(self, other: Expr) -> Self {
        match self {
            Expr::And(mut list) => {
                list.push(other);
                Expr::And(list)
            }
            _ => Expr::And(vec![self, other]),
        }
    }
}

/// A storage-level query: optional predicate, ordering and limit.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    /// Optional predicate; `None` matches every row.
    pub filter: Option<Expr>,
    /// Maximum number of rows to return.
    pub limit: Option<usize>,
    /// Sort specifications, applied in order.
    pub sort: Vec<Sort>,
}

impl Query {
    /// Creates a new empty query.
    pub fn new() -> Self {
        Query::default()
    }

    /// Creates a new query builder for fluent construction.
    pub fn builder() -> QueryBuilder {
        QueryBuilder::new()
    }
}

/// Helper for constructing predicates.
pub struct Filter;

impl Filter {
    /// Matches rows whose column equals the value.
    pub fn eq(field: impl Into<String>, value: impl Into<Bson>) -> Expr {
        Expr::field(field.into(), FieldOp::Eq, value.into())
    }

    /// Matches rows whose column is less than the value.
    pub fn lt(field: impl Into<String>, value: impl Into<Bson>) -> Expr {
        Expr::field(field.into(), FieldOp::Lt, value.into())
    }

    /// Matches rows whose string column contains the value.
    pub fn contains(field: impl Into<String>, value: impl Into<String>) -> Expr {
        Expr::field(field.into(), FieldOp::Contains, Bson::String(value.into()))
    }

    /// Matches rows satisfying every expression.
    pub fn and(exprs: impl IntoIterator<Item = Expr>) -> Expr {
        Expr::And(exprs.into_iter().collect())
    }
}

#[derive(Debug, Clone, Default)]
pub struct QueryBuilder {
    query: Query,
}

impl QueryBuilder {
    /// Creates a new query builder.
    pub fn new() -> Self {
        QueryBuilder::default()
    }

    /// Sets the predicate for this query.
    pub fn filter(mut self, filter: Expr) -> Self {
        self.query.filter = Some(filter);
        self
    }

    /// Sets the predicate if one is given.
    pub fn maybe_filter(mut self, filter: Option<Expr>) -> Self {
        self.query.filter = filter;
        self
    }

    /// Sets the maximum number of rows to return.
    pub fn limit(mut self, limit: usize) -> Self {
        self.query.limit = Some(limit);
        self
    }

    /// Appends a sort specification.
    ///
    /// # Arguments
    ///
    /// * `field` - The column to sort by
    /// * `direction` - The sort direction
    pub fn sort(mut self, field: impl Into<String>, direction: SortDirection) -> Self {
        self.query.sort.push(Sort { field: field.into(), direction });
        self
    }

    /// Builds and returns the final query.
    pub fn build(self) -> Query {
        self.query
    }
}

pub trait QueryVisitor {
    type Output;
    type Error: Into<DocumentStoreError>;

    fn visit_and(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error>;
    fn visit_field(
        &mut self,
        field: &str,
        op: FieldOp,
        value: &Bson,
    ) -> Result<Self::Output, Self::Error>;

    fn visit_expr(&mut self, expr: &Expr) -> Result<Self::Output, Self::Error> {
        match expr {
            Expr::And(exprs) => self.visit_and(exprs),
            Expr::Field { field, op, value } => self.visit_field(field, *op, value),
        }
    }
}

/// Property keys that map directly onto row columns.
pub const NATIVE_COLUMNS: [&str; 4] = [
    columns::UID,
    columns::DB,
    columns::CREATION_TIMESTAMP,
    columns::MODIFICATION_TIMESTAMP,
];

/// A property map split into a backend predicate and residual in-memory constraints.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PropertyQuery {
    /// Predicate to push down to the backend, if any constraint could be expressed.
    pub filter: Option<Expr>,
    /// Constraints left for [`DocumentFilter`](crate::filter::DocumentFilter).
    pub residual: Map<String, Value>,
}

impl PropertyQuery {
    /// Compiles a property map.
    ///
    /// * `guid` becomes equality on `db` and `id` (the database part is validated).
    /// * Native columns (`uid`, `db`, `creation_timestamp`, `modification_timestamp`) become
    ///   equality predicates.
    /// * With `add_data_constraint`, residual payload values that serialize to plain text
    ///   (integers and strings needing no JSON escaping) also add a substring pre-filter on
    ///   `data_protected`. They remain residual. Only a strict filter may ask for this: loose
    ///   equality accepts values whose text differs from the stored JSON (`"1"` for `true`,
    ///   `"30.0"` for `30`).
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::InvalidDatabaseName`] for a malformed `guid`.
    pub fn compile(
        properties: &Map<String, Value>,
        add_data_constraint: bool,
    ) -> DocumentStoreResult<Self> {
        let mut residual = properties.clone();
        let mut constraints = Vec::new();

        if let Some(guid) = residual.remove("guid") {
            let guid = guid.as_str().ok_or_else(|| {
                DocumentStoreError::InvalidDatabaseName(format!(
                    "GUID must be a string, got {guid}"
                ))
            })?;
            let (db, id) = split_guid(guid)?;
            constraints.push(Filter::eq(columns::DB, db));
            constraints.push(Filter::eq(columns::ID, id));
        }

        for column in NATIVE_COLUMNS {
            if let Some(value) = residual.remove(column) {
                constraints.push(Expr::field(
                    column.to_string(),
                    FieldOp::Eq,
                    serialize_to_bson(&value)?,
                ));
            }
        }

        if add_data_constraint {
            for (key, value) in &residual {
                if let Some(needle) = data_constraint_needle(key, value) {
                    constraints.push(Filter::contains(columns::DATA_PROTECTED, needle));
                }
            }
        }

        let filter = if constraints.is_empty() {
            None
        } else {
            Some(Expr::And(constraints))
        };

        Ok(PropertyQuery { filter, residual })
    }
}

fn data_constraint_needle(key: &str, value: &Value) -> Option<String> {
    if DECLARED_ATTRIBUTES.contains(&key) {
        return None;
    }

    match value {
        Value::Number(number) if number.is_i64() || number.is_u64() => Some(number.to_string()),
        Value::String(text) if !text.is_empty() => {
            let encoded = value.to_string();
            (encoded[1..encoded.len() - 1] == *text).then(|| text.clone())
        }
        _ => None,
    }
}
