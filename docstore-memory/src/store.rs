//! In-memory storage implementation for document stores.
//!
//! Rows are kept per table in insertion order, behind an async-safe read-write lock.

use async_trait::async_trait;
use bson::{Bson, Uuid};
use mea::rwlock::RwLock;
use std::{cmp::Ordering, collections::HashMap, sync::Arc};

use docstore_core::{
    backend::{StoreBackend, StoreBackendBuilder},
    error::{DocumentStoreError, DocumentStoreResult},
    query::{Expr, Query, SortDirection},
};

use crate::evaluator::{RowEvaluator, compare_column};

type Table = Vec<(String, Bson)>;
type StoreMap = HashMap<String, Table>;

/// A thread-safe in-memory backend.
///
/// Clones share the same underlying storage.
#[derive(Default, Clone, Debug)]
pub struct InMemoryStore {
    store: Arc<RwLock<StoreMap>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            store: Arc::new(RwLock::new(StoreMap::new())),
        }
    }

    pub fn builder() -> InMemoryStoreBuilder {
        InMemoryStoreBuilder
    }

    /// Returns the number of rows in a table, including soft-deleted ones.
    pub async fn row_count(&self, table: &str) -> usize {
        self.store
            .read()
            .await
            .get(table)
            .map(Vec::len)
            .unwrap_or(0)
    }
}

#[async_trait]
impl StoreBackend for InMemoryStore {
    async fn insert_rows(&self, rows: Vec<(Uuid, Bson)>, table: &str) -> DocumentStoreResult<()> {
        let mut store = self.store.write().await;
        let table_rows = store.entry(table.to_string()).or_default();

        for (uid, row) in rows {
            let key = uid.to_string();

            if table_rows.iter().any(|(existing, _)| *existing == key) {
                return Err(DocumentStoreError::DocumentAlreadyExists(key, table.to_string()));
            }

            table_rows.push((key, row));
        }

        Ok(())
    }

    async fn update_rows(&self, rows: Vec<(Uuid, Bson)>, table: &str) -> DocumentStoreResult<()> {
        let mut store = self.store.write().await;
        let table_rows = store.entry(table.to_string()).or_default();

        for (uid, row) in rows {
            let key = uid.to_string();

            match table_rows.iter_mut().find(|(existing, _)| *existing == key) {
                Some((_, stored)) => *stored = row,
                None => return Err(DocumentStoreError::DocumentNotFound(key, table.to_string())),
            }
        }

        Ok(())
    }

    async fn delete_rows(&self, filter: Expr, table: &str) -> DocumentStoreResult<u64> {
        let mut store = self.store.write().await;
        let table_rows = match store.get_mut(table) {
            Some(rows) => rows,
            None => return Ok(0),
        };

        let before = table_rows.len();
        table_rows.retain(|(_, row)| !RowEvaluator::new(row).evaluate(&filter).unwrap_or(false));

        Ok((before - table_rows.len()) as u64)
    }

    async fn query_rows(&self, query: Query, table: &str) -> DocumentStoreResult<Vec<Bson>> {
        let store = self.store.read().await;
        let table_rows = match store.get(table) {
            Some(rows) => rows,
            None => return Ok(vec![]),
        };

        let mut rows = match &query.filter {
            Some(filter) => {
                RowEvaluator::filter_rows(table_rows.iter().map(|(_, row)| row), filter)
            }
            None => table_rows.iter().map(|(_, row)| row.clone()).collect(),
        };

        if !query.sort.is_empty() {
            rows.sort_by(|a, b| {
                query
                    .sort
                    .iter()
                    .map(|sort| match sort.direction {
                        SortDirection::Asc => compare_column(a, b, &sort.field),
                        SortDirection::Desc => compare_column(b, a, &sort.field),
                    })
                    .find(|ordering| *ordering != Ordering::Equal)
                    .unwrap_or(Ordering::Equal)
            });
        }

        Ok(rows
            .into_iter()
            .take(query.limit.unwrap_or(usize::MAX))
            .collect())
    }

    async fn count_rows(&self, filter: Option<Expr>, table: &str) -> DocumentStoreResult<u64> {
        let store = self.store.read().await;
        let table_rows = match store.get(table) {
            Some(rows) => rows,
            None => return Ok(0),
        };

        let count = match &filter {
            Some(filter) => {
                RowEvaluator::filter_rows(table_rows.iter().map(|(_, row)| row), filter).len()
            }
            None => table_rows.len(),
        };

        Ok(count as u64)
    }
}

#[derive(Debug, Default)]
pub struct InMemoryStoreBuilder;

#[async_trait]
impl StoreBackendBuilder for InMemoryStoreBuilder {
    type Backend = InMemoryStore;

    async fn build(self) -> DocumentStoreResult<Self::Backend> {
        Ok(InMemoryStore::new())
    }
}
