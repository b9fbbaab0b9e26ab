//! Garbage collection of soft-deleted documents.
//!
//! [`GcService`] permanently deletes tombstoned rows whose last modification is older than a
//! minimum age, optionally limited to one database. It talks to the backend directly and
//! never hydrates documents.

use bson::Bson;
use chrono::Utc;
use std::fmt;

use crate::{
    backend::StoreBackend,
    document::validate_db,
    error::{DocumentStoreError, DocumentStoreResult},
    mapper::columns,
    query::{Expr, FieldOp},
};

/// A parameterized predicate: a template of `column op ?` conjuncts joined by `AND`, plus
/// one parameter per `?` placeholder.
///
/// Supported operators are `=`, `<` and `LIKE`.
#[derive(Debug, Clone, PartialEq)]
pub struct GcWhereExpression {
    template: String,
    parameters: Vec<Bson>,
}

impl GcWhereExpression {
    /// Creates an expression.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::PlaceholderMismatch`] if the number of `?` placeholders
    /// in `template` differs from the number of parameters.
    pub fn new(template: impl Into<String>, parameters: Vec<Bson>) -> DocumentStoreResult<Self> {
        let template = template.into();
        let placeholders = template.matches('?').count();
        if placeholders != parameters.len() {
            return Err(DocumentStoreError::PlaceholderMismatch {
                placeholders,
                parameters: parameters.len(),
            });
        }

        Ok(GcWhereExpression { template, parameters })
    }

    pub fn template(&self) -> &str {
        &self.template
    }

    pub fn parameters(&self) -> &[Bson] {
        &self.parameters
    }

    /// Converts the expression into a backend predicate, binding parameters in order.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::Backend`] if a conjunct is not of the form
    /// `column op ?`.
    pub fn to_filter(&self) -> DocumentStoreResult<Expr> {
        let mut parameters = self.parameters.iter();
        let mut conjuncts = Vec::new();

        for part in self.template.split(" AND ") {
            let tokens: Vec<&str> = part.split_whitespace().collect();
            let (column, op) = match tokens.as_slice() {
                [column, "=", "?"] => (*column, FieldOp::Eq),
                [column, "<", "?"] => (*column, FieldOp::Lt),
                [column, like, "?"] if like.eq_ignore_ascii_case("like") => {
                    (*column, FieldOp::Contains)
                }
                _ => {
                    return Err(DocumentStoreError::Backend(format!(
                        "Unsupported predicate \"{part}\""
                    )));
                }
            };
            let value = parameters.next().cloned().ok_or_else(|| {
                DocumentStoreError::Backend(format!("Missing parameter for \"{part}\""))
            })?;
            conjuncts.push(Expr::field(column.to_string(), op, value));
        }

        Ok(Expr::And(conjuncts))
    }
}

impl fmt::Display for GcWhereExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.template)
    }
}

/// Purges soft-deleted rows from one table.
#[derive(Debug)]
pub struct GcService<'a, B: StoreBackend> {
    backend: &'a B,
    table: String,
}

impl<'a, B: StoreBackend> GcService<'a, B> {
    pub fn new(backend: &'a B, table: impl Into<String>) -> Self {
        GcService {
            backend,
            table: table.into(),
        }
    }

    /// Counts the soft-deleted rows last modified more than `min_age_seconds` ago.
    ///
    /// # Arguments
    ///
    /// * `min_age_seconds` - Minimum age of the tombstone
    /// * `db` - Restrict the count to one database
    pub async fn count_deleted_documents(
        &self,
        min_age_seconds: i64,
        db: Option<&str>,
    ) -> DocumentStoreResult<u64> {
        let filter = build_where(min_age_seconds, db, Utc::now().timestamp())?.to_filter()?;

        self.backend.count_rows(Some(filter), &self.table).await
    }

    /// Permanently deletes the soft-deleted rows last modified more than `min_age_seconds`
    /// ago.
    ///
    /// # Returns
    ///
    /// `true` if at least one row was deleted.
    pub async fn remove_deleted_documents(
        &self,
        min_age_seconds: i64,
        db: Option<&str>,
    ) -> DocumentStoreResult<bool> {
        let filter = build_where(min_age_seconds, db, Utc::now().timestamp())?.to_filter()?;
        let removed = self.backend.delete_rows(filter, &self.table).await?;

        tracing::debug!(
            table = %self.table,
            db = db.unwrap_or("*"),
            min_age_seconds,
            removed,
            "Purged soft-deleted documents"
        );
        Ok(removed > 0)
    }
}

fn build_where(
    min_age_seconds: i64,
    db: Option<&str>,
    now: i64,
) -> DocumentStoreResult<GcWhereExpression> {
    let mut parts = vec![
        format!("{} = ?", columns::DELETED),
        format!("{} < ?", columns::MODIFICATION_TIMESTAMP),
    ];
    let mut parameters = vec![Bson::Boolean(true), Bson::Int64(now - min_age_seconds)];

    if let Some(db) = db.filter(|db| !db.is_empty()) {
        validate_db(db)?;
        parts.push(format!("{} = ?", columns::DB));
        parameters.push(Bson::String(db.to_string()));
    }

    GcWhereExpression::new(parts.join(" AND "), parameters)
}
