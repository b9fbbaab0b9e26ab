//! Read-only projection of the databases present in a table.

use bson::Bson;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

use crate::{
    backend::StoreBackend,
    error::{DocumentStoreError, DocumentStoreResult},
    mapper::columns,
    query::{Filter, Query, SortDirection},
};

/// A database: the set of active documents sharing a `db` name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Database {
    /// The database name.
    pub name: String,
    /// The earliest creation time of the database's documents.
    pub creation_time: Option<DateTime<Utc>>,
}

/// Lists databases by aggregating the rows of a table.
#[derive(Debug)]
pub struct DatabaseRepository<'a, B: StoreBackend> {
    backend: &'a B,
    table: String,
}

impl<'a, B: StoreBackend> DatabaseRepository<'a, B> {
    pub fn new(backend: &'a B, table: impl Into<String>) -> Self {
        DatabaseRepository {
            backend,
            table: table.into(),
        }
    }

    /// Returns every database with at least one active document, ordered by name.
    pub async fn find_all(&self) -> DocumentStoreResult<Vec<Database>> {
        let query = Query::builder()
            .filter(Filter::eq(columns::DELETED, false))
            .sort(columns::DB, SortDirection::Asc)
            .sort(columns::CREATION_TIMESTAMP, SortDirection::Asc)
            .build();
        let rows = self.backend.query_rows(query, &self.table).await?;

        group_rows(&rows)
    }
}

fn group_rows(rows: &[Bson]) -> DocumentStoreResult<Vec<Database>> {
    let mut earliest: BTreeMap<&str, i64> = BTreeMap::new();

    for row in rows {
        let row = row.as_document().ok_or_else(|| {
            DocumentStoreError::DataMapping(format!("Row must be a document, got {row}"))
        })?;
        let name = row.get_str(columns::DB).map_err(|e| {
            DocumentStoreError::DataMapping(format!("Invalid column \"{}\": {e}", columns::DB))
        })?;
        let created = match row.get(columns::CREATION_TIMESTAMP) {
            Some(Bson::Int64(value)) => *value,
            Some(Bson::Int32(value)) => i64::from(*value),
            _ => 0,
        };

        earliest
            .entry(name)
            .and_modify(|current| *current = (*current).min(created))
            .or_insert(created);
    }

    Ok(earliest
        .into_iter()
        .map(|(name, created)| Database {
            name: name.to_string(),
            creation_time: DateTime::<Utc>::from_timestamp(created, 0),
        })
        .collect())
}
