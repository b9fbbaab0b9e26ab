//! The core document repository.
//!
//! [`CoreDocumentRepository`] implements storage operations over one backing table that holds
//! documents of many databases. It does not apply any database scoping of its own; callers
//! normally go through a [`DocumentRepository`](crate::scope::DocumentRepository), which adds
//! the scope checks on top.
//!
//! Deletion is two-phase. [`remove`](CoreDocumentRepository::remove) only tombstones a row:
//! the document gets a new synthetic ID (so its original `(db, id)` can be reused) and
//! `deleted = true`. The row stays in the table until the
//! [`GcService`](crate::gc::GcService) purges it.

use bson::Uuid;
use chrono::Utc;
use serde_json::{Map, Value};

use crate::{
    backend::StoreBackend,
    document::{Document, split_guid, validate_db, validate_id},
    error::{DocumentStoreError, DocumentStoreResult},
    filter::DocumentFilter,
    mapper::{DataMapper, columns},
    query::{Expr, Filter, PropertyQuery, Query},
};

/// Default name of the backing table.
pub const DEFAULT_TABLE: &str = "documents";

/// Storage operations for documents of any database.
#[derive(Debug)]
pub struct CoreDocumentRepository<'a, B: StoreBackend> {
    backend: &'a B,
    table: String,
    filter: DocumentFilter,
    mapper: DataMapper,
}

impl<'a, B: StoreBackend> Clone for CoreDocumentRepository<'a, B> {
    fn clone(&self) -> Self {
        CoreDocumentRepository {
            backend: self.backend,
            table: self.table.clone(),
            filter: self.filter,
            mapper: self.mapper,
        }
    }
}

impl<'a, B: StoreBackend> CoreDocumentRepository<'a, B> {
    /// Creates a repository over the given backend and table, using a loose
    /// [`DocumentFilter`].
    pub fn new(backend: &'a B, table: impl Into<String>) -> Self {
        CoreDocumentRepository {
            backend,
            table: table.into(),
            filter: DocumentFilter::new(),
            mapper: DataMapper::new(),
        }
    }

    /// Replaces the filter used for residual property constraints.
    pub fn with_filter(mut self, filter: DocumentFilter) -> Self {
        self.filter = filter;
        self
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn backend(&self) -> &'a B {
        self.backend
    }

    /// Persists a new document.
    ///
    /// Assigns the surrogate `uid` and both timestamps.
    ///
    /// # Errors
    ///
    /// * [`DocumentStoreError::NoDatabaseSelected`] if the document has no database
    /// * [`DocumentStoreError::InvalidId`] if the document has no valid ID
    /// * [`DocumentStoreError::DocumentAlreadyExists`] if the document is already persisted or
    ///   an active document with the same `(db, id)` exists
    pub async fn add(&self, document: &mut Document) -> DocumentStoreResult<()> {
        require_database(document)?;
        validate_id(document.id())?;

        let guid = document.guid().unwrap_or_default();
        if document.uid().is_some() {
            return Err(DocumentStoreError::DocumentAlreadyExists(guid, self.table.clone()));
        }
        let existing = self
            .backend
            .count_rows(
                Some(active(vec![
                    Filter::eq(columns::DB, document.db()),
                    Filter::eq(columns::ID, document.id()),
                ])),
                &self.table,
            )
            .await?;
        if existing > 0 {
            return Err(DocumentStoreError::DocumentAlreadyExists(guid, self.table.clone()));
        }

        let now = Utc::now().timestamp();
        document.set_uid(Some(Uuid::new()));
        document.set_creation_time(now);
        document.set_modification_time(now);

        let row = self.mapper.to_row(document)?;
        self.backend.insert_rows(vec![row], &self.table).await?;

        tracing::debug!(guid = %guid, table = %self.table, "Added document");
        Ok(())
    }

    /// Replaces the stored row of a persisted document and refreshes its modification time.
    ///
    /// # Errors
    ///
    /// * [`DocumentStoreError::NoDatabaseSelected`] if the document has no database
    /// * [`DocumentStoreError::DocumentNotFound`] if the document was never persisted
    pub async fn update(&self, document: &mut Document) -> DocumentStoreResult<()> {
        require_database(document)?;
        self.require_persisted(document)?;

        document.set_modification_time(Utc::now().timestamp());
        let row = self.mapper.to_row(document)?;
        self.backend.update_rows(vec![row], &self.table).await?;

        tracing::debug!(
            guid = %document.guid().unwrap_or_default(),
            table = %self.table,
            "Updated document"
        );
        Ok(())
    }

    /// Soft-deletes a persisted document.
    ///
    /// The document's ID becomes `<old id>-<timestamp>-<random token>` and it is flagged as
    /// deleted, then stored with [`update`](CoreDocumentRepository::update).
    ///
    /// # Errors
    ///
    /// Returns the errors of [`update`](CoreDocumentRepository::update). The document is
    /// left unchanged unless the tombstone was stored.
    pub async fn remove(&self, document: &mut Document) -> DocumentStoreResult<()> {
        require_database(document)?;
        self.require_persisted(document)?;

        let mut tombstone = document.clone();
        tombstone.set_id(format!(
            "{}-{}-{}",
            document.id(),
            Utc::now().timestamp(),
            uuid::Uuid::new_v4().simple()
        ))?;
        tombstone.set_deleted(true);

        self.update(&mut tombstone).await?;
        *document = tombstone;

        Ok(())
    }

    /// Finds the active document with the given GUID (`db/id`).
    ///
    /// # Errors
    ///
    /// * [`DocumentStoreError::InvalidDatabaseName`] if the GUID has no valid database part
    /// * [`DocumentStoreError::InvalidId`] if the ID part is invalid
    pub async fn find_by_guid(&self, guid: &str) -> DocumentStoreResult<Option<Document>> {
        let (db, id) = split_guid(guid)?;
        self.find_one_by_database_and_id(db, id).await
    }

    /// Finds the active document with the given database and ID.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::InvalidDatabaseName`] or [`DocumentStoreError::InvalidId`]
    /// before touching the backend.
    pub async fn find_one_by_database_and_id(
        &self,
        db: &str,
        id: &str,
    ) -> DocumentStoreResult<Option<Document>> {
        validate_db(db)?;
        validate_id(id)?;

        let query = Query::builder()
            .filter(active(vec![Filter::eq(columns::DB, db), Filter::eq(columns::ID, id)]))
            .limit(1)
            .build();
        let rows = self.backend.query_rows(query, &self.table).await?;

        rows.first()
            .map(|row| self.mapper.map_single_row(row))
            .transpose()
    }

    /// Returns every active document of a database, in backend order.
    pub async fn find_by_database(&self, db: &str) -> DocumentStoreResult<Vec<Document>> {
        let db = prepare_database(Some(db))?;

        let query = Query::builder()
            .filter(active(vec![Filter::eq(columns::DB, db)]))
            .build();
        let rows = self.backend.query_rows(query, &self.table).await?;

        self.mapper.map(rows)
    }

    /// Counts the active documents of a database.
    pub async fn count_by_database(&self, db: &str) -> DocumentStoreResult<u64> {
        let db = prepare_database(Some(db))?;

        self.backend
            .count_rows(Some(active(vec![Filter::eq(columns::DB, db)])), &self.table)
            .await
    }

    /// Soft-deletes every active document of a database.
    ///
    /// # Returns
    ///
    /// The number of documents removed.
    pub async fn remove_all_from_database(&self, db: &str) -> DocumentStoreResult<usize> {
        let documents = self.find_by_database(db).await?;
        let count = documents.len();

        for mut document in documents {
            self.remove(&mut document).await?;
        }

        tracing::debug!(db = %db, count, "Removed all documents of database");
        Ok(count)
    }

    /// Finds active documents matching the given properties.
    ///
    /// The properties are compiled with [`PropertyQuery::compile`]; the pushed-down part runs
    /// in the backend and the residual constraints are applied with the repository's
    /// [`DocumentFilter`], which stops after `limit` matches. The payload pre-filter is only
    /// pushed down when the filter is strict.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::InvalidDatabaseName`] for a malformed `guid` property,
    /// or any backend or mapping error.
    pub async fn find_with_properties(
        &self,
        properties: &Map<String, Value>,
        limit: usize,
    ) -> DocumentStoreResult<Vec<Document>> {
        let compiled = PropertyQuery::compile(properties, self.filter.is_strict())?;
        self.find_with_compiled(compiled, limit).await
    }

    /// Like [`find_with_properties`](CoreDocumentRepository::find_with_properties), but
    /// without the payload pre-filter: only native columns are pushed down.
    pub async fn find_with_properties_unconstrained(
        &self,
        properties: &Map<String, Value>,
        limit: usize,
    ) -> DocumentStoreResult<Vec<Document>> {
        self.find_with_compiled(PropertyQuery::compile(properties, false)?, limit)
            .await
    }

    /// Returns every active document regardless of database.
    pub async fn find_all_ignore_database(&self) -> DocumentStoreResult<Vec<Document>> {
        let query = Query::builder().filter(active(Vec::new())).build();
        let rows = self.backend.query_rows(query, &self.table).await?;

        self.mapper.map(rows)
    }

    async fn find_with_compiled(
        &self,
        compiled: PropertyQuery,
        limit: usize,
    ) -> DocumentStoreResult<Vec<Document>> {
        let PropertyQuery { filter, residual } = compiled;
        let pushed_down = match filter {
            Some(Expr::And(list)) => list,
            Some(other) => vec![other],
            None => Vec::new(),
        };

        let query = Query::builder().filter(active(pushed_down)).build();
        let rows = self.backend.query_rows(query, &self.table).await?;
        let documents = self.mapper.map(rows)?;

        Ok(self
            .filter
            .filter_by_properties(documents, &residual, limit)
            .collect())
    }

    fn require_persisted(&self, document: &Document) -> DocumentStoreResult<()> {
        if document.uid().is_none() {
            return Err(DocumentStoreError::DocumentNotFound(
                document.guid().unwrap_or_default(),
                self.table.clone(),
            ));
        }
        Ok(())
    }
}

fn require_database(document: &Document) -> DocumentStoreResult<()> {
    if document.db().is_empty() {
        return Err(DocumentStoreError::NoDatabaseSelected(
            "The given object has no database set".to_string(),
        ));
    }
    Ok(())
}

/// Validates an optional database argument.
pub(crate) fn prepare_database(db: Option<&str>) -> DocumentStoreResult<&str> {
    match db {
        Some(db) if !db.is_empty() => {
            validate_db(db)?;
            Ok(db)
        }
        _ => Err(DocumentStoreError::NoDatabaseSelected(
            "No document database has been selected".to_string(),
        )),
    }
}

/// Restricts a conjunction to rows that are not soft-deleted.
fn active(mut constraints: Vec<Expr>) -> Expr {
    constraints.push(Filter::eq(columns::DELETED, false));
    Expr::And(constraints)
}
