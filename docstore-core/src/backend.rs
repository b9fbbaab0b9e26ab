//! Storage backend abstraction for the document store.
//!
//! A backend stores rows (BSON documents, see [`DataMapper`](crate::mapper::DataMapper) for
//! their shape) in named tables, keyed by the row's surrogate `uid`. Everything above this
//! trait (identity rules, scoping, soft delete) is backend-independent.
//!
//! # Examples
//!
//! ```ignore
//! use docstore_core::{backend::StoreBackend, query::{Filter, Query}};
//! use bson::{Uuid, Bson, doc};
//!
//! let backend = MyBackendImpl::new();
//!
//! let uid = Uuid::new();
//! let row = Bson::Document(doc! { "uid": uid.to_string(), "db": "people", "id": "alice" });
//! backend.insert_rows(vec![(uid, row)], "documents").await?;
//!
//! let rows = backend
//!     .query_rows(Query::builder().filter(Filter::eq("db", "people")).build(), "documents")
//!     .await?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use async_trait::async_trait;
use bson::{Bson, Uuid};
use std::fmt::Debug;

use crate::{
    error::DocumentStoreResult,
    query::{Expr, Query},
};

/// Abstract interface for row storage backends.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync`. The repositories issue calls sequentially, but a
/// backend may be shared between several repositories.
#[async_trait]
pub trait StoreBackend: Send + Sync + Debug {
    /// Inserts new rows into a table.
    ///
    /// # Arguments
    ///
    /// * `rows` - Pairs of surrogate key and row
    /// * `table` - The name of the target table
    ///
    /// # Errors
    ///
    /// Returns a [`DocumentStoreError`](crate::error::DocumentStoreError) if a key already
    /// exists or the backend fails.
    async fn insert_rows(&self, rows: Vec<(Uuid, Bson)>, table: &str) -> DocumentStoreResult<()>;

    /// Replaces existing rows, matched by surrogate key.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::DocumentNotFound`](crate::error::DocumentStoreError::DocumentNotFound)
    /// if a key has no row.
    async fn update_rows(&self, rows: Vec<(Uuid, Bson)>, table: &str) -> DocumentStoreResult<()>;

    /// Permanently deletes every row matching the predicate.
    ///
    /// # Returns
    ///
    /// The number of rows deleted.
    async fn delete_rows(&self, filter: Expr, table: &str) -> DocumentStoreResult<u64>;

    /// Returns the rows matching a query, ordered and limited as requested.
    ///
    /// Rows are returned in insertion order when the query has no sort specification.
    async fn query_rows(&self, query: Query, table: &str) -> DocumentStoreResult<Vec<Bson>>;

    /// Counts the rows matching the predicate (all rows for `None`).
    async fn count_rows(&self, filter: Option<Expr>, table: &str) -> DocumentStoreResult<u64>;

    /// Cleanly shuts down the backend, releasing all resources.
    ///
    /// The default implementation is a no-op.
    async fn shutdown(self) -> DocumentStoreResult<()>
    where
        Self: Sized,
    {
        Ok(())
    }
}

#[async_trait]
pub trait StoreBackendBuilder {
    type Backend: StoreBackend;

    async fn build(self) -> DocumentStoreResult<Self::Backend>;
}
