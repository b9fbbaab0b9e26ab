//! Main entry point: a document store over one backend.
//!
//! [`DocumentStore`] owns a backend and hands out repositories and services that borrow it.
//! All of them operate on the same backing table.
//!
//! # Example
//!
//! ```ignore
//! use docstore_core::store::DocumentStore;
//!
//! let store = DocumentStore::new(backend).with_table("documents");
//!
//! let people = store.repository("people")?;
//! let mut alice = Document::new("people", "alice")?;
//! people.add(&mut alice).await?;
//!
//! store.gc().remove_deleted_documents(7 * 86_400, None).await?;
//! store.shutdown().await?;
//! ```

use crate::{
    backend::StoreBackend,
    database::DatabaseRepository,
    error::DocumentStoreResult,
    filter::DocumentFilter,
    gc::GcService,
    repository::{CoreDocumentRepository, DEFAULT_TABLE},
    scope::DocumentRepository,
};

#[derive(Debug)]
pub struct DocumentStore<B: StoreBackend> {
    backend: B,
    table: String,
    filter: DocumentFilter,
}

impl<B: StoreBackend> DocumentStore<B> {
    /// Creates a store using the default table and a loose [`DocumentFilter`].
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            table: DEFAULT_TABLE.to_string(),
            filter: DocumentFilter::new(),
        }
    }

    /// Selects the backing table.
    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = table.into();
        self
    }

    /// Selects the filter used for residual property constraints.
    pub fn with_filter(mut self, filter: DocumentFilter) -> Self {
        self.filter = filter;
        self
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// Returns an unscoped core repository.
    pub fn core_repository(&self) -> CoreDocumentRepository<'_, B> {
        CoreDocumentRepository::new(&self.backend, self.table.clone()).with_filter(self.filter)
    }

    /// Returns a repository bound to one database.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::InvalidDatabaseName`](crate::error::DocumentStoreError::InvalidDatabaseName)
    /// if `db` is malformed.
    pub fn repository(&self, db: &str) -> DocumentStoreResult<DocumentRepository<'_, B>> {
        DocumentRepository::fixed(self.core_repository(), db)
    }

    /// Returns a repository working across databases.
    pub fn free_repository(&self) -> DocumentRepository<'_, B> {
        DocumentRepository::free(self.core_repository())
    }

    pub fn databases(&self) -> DatabaseRepository<'_, B> {
        DatabaseRepository::new(&self.backend, self.table.clone())
    }

    pub fn gc(&self) -> GcService<'_, B> {
        GcService::new(&self.backend, self.table.clone())
    }

    pub async fn shutdown(self) -> DocumentStoreResult<()> {
        self.backend.shutdown().await?;

        Ok(())
    }
}
