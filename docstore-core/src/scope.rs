//! Database-scoped repositories.
//!
//! A [`DocumentRepository`] wraps a [`CoreDocumentRepository`] and enforces a
//! [`DatabaseScope`]:
//!
//! * `Fixed(name)` repositories only ever read and write documents of `name`. Documents
//!   without a database are assigned to it; documents of another database are rejected.
//! * `Unscoped` repositories work across databases, but every operation must name the
//!   database it targets.
//!
//! Scope violations are detected by the pure functions [`check_document_database`] and
//! [`resolve_database`], before any backend call is made.

use serde_json::{Map, Value};

use crate::{
    backend::StoreBackend,
    document::{Document, split_guid, validate_db},
    error::{DocumentStoreError, DocumentStoreResult},
    repository::{CoreDocumentRepository, prepare_database},
};

/// The set of databases a repository may access.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatabaseScope {
    /// Exactly one database.
    Fixed(String),
    /// Any database, named per operation.
    Unscoped,
}

/// Checks that a document may be written through a repository with the given scope.
///
/// A `Fixed` scope assigns its database to a document that has none.
///
/// # Errors
///
/// * [`DocumentStoreError::InvalidDocumentDatabase`] if a `Fixed` scope receives a document of
///   another database
/// * [`DocumentStoreError::NoDatabaseSelected`] if an `Unscoped` repository receives a
///   document without a database
pub fn check_document_database(
    scope: &DatabaseScope,
    document: &mut Document,
) -> DocumentStoreResult<()> {
    match scope {
        DatabaseScope::Fixed(name) => {
            if document.db().is_empty() {
                document.set_db(name)?;
            } else if document.db() != name {
                return Err(DocumentStoreError::InvalidDocumentDatabase(
                    document.db().to_string(),
                    name.clone(),
                ));
            }
            Ok(())
        }
        DatabaseScope::Unscoped => {
            if document.db().is_empty() {
                return Err(DocumentStoreError::NoDatabaseSelected(
                    "The given object has no database set".to_string(),
                ));
            }
            Ok(())
        }
    }
}

/// Resolves the database an operation targets.
///
/// # Errors
///
/// * [`DocumentStoreError::InvalidDocumentDatabase`] if a `Fixed` scope is asked for another
///   database
/// * [`DocumentStoreError::NoDatabaseSelected`] if an `Unscoped` scope gets no database
/// * [`DocumentStoreError::InvalidDatabaseName`] if the name is malformed
pub fn resolve_database<'s>(
    scope: &'s DatabaseScope,
    explicit: Option<&'s str>,
) -> DocumentStoreResult<&'s str> {
    match scope {
        DatabaseScope::Fixed(name) => {
            if let Some(explicit) = explicit.filter(|db| *db != name) {
                return Err(DocumentStoreError::InvalidDocumentDatabase(
                    explicit.to_string(),
                    name.clone(),
                ));
            }
            validate_db(name)?;
            Ok(name.as_str())
        }
        DatabaseScope::Unscoped => prepare_database(explicit),
    }
}

/// A repository restricted by a [`DatabaseScope`].
#[derive(Debug)]
pub struct DocumentRepository<'a, B: StoreBackend> {
    scope: DatabaseScope,
    core: CoreDocumentRepository<'a, B>,
}

impl<'a, B: StoreBackend> DocumentRepository<'a, B> {
    /// Creates a repository bound to one database.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::InvalidDatabaseName`] if `db` is malformed.
    pub fn fixed(core: CoreDocumentRepository<'a, B>, db: &str) -> DocumentStoreResult<Self> {
        validate_db(db)?;
        Ok(DocumentRepository {
            scope: DatabaseScope::Fixed(db.to_string()),
            core,
        })
    }

    /// Creates a repository that works across databases.
    pub fn free(core: CoreDocumentRepository<'a, B>) -> Self {
        DocumentRepository {
            scope: DatabaseScope::Unscoped,
            core,
        }
    }

    pub fn scope(&self) -> &DatabaseScope {
        &self.scope
    }

    pub fn core(&self) -> &CoreDocumentRepository<'a, B> {
        &self.core
    }

    /// Returns the database of a `Fixed` repository.
    pub fn database(&self) -> Option<&str> {
        match &self.scope {
            DatabaseScope::Fixed(name) => Some(name.as_str()),
            DatabaseScope::Unscoped => None,
        }
    }

    /// Persists a new document. See [`CoreDocumentRepository::add`].
    pub async fn add(&self, document: &mut Document) -> DocumentStoreResult<()> {
        check_document_database(&self.scope, document)?;
        self.core.add(document).await
    }

    /// Stores changes to a persisted document. See [`CoreDocumentRepository::update`].
    pub async fn update(&self, document: &mut Document) -> DocumentStoreResult<()> {
        check_document_database(&self.scope, document)?;
        self.core.update(document).await
    }

    /// Soft-deletes a document. See [`CoreDocumentRepository::remove`].
    pub async fn remove(&self, document: &mut Document) -> DocumentStoreResult<()> {
        check_document_database(&self.scope, document)?;
        self.core.remove(document).await
    }

    /// Returns every active document of the scoped (or given) database.
    pub async fn find_all(&self, db: Option<&str>) -> DocumentStoreResult<Vec<Document>> {
        let db = resolve_database(&self.scope, db)?;
        self.core.find_by_database(db).await
    }

    /// Counts the active documents of the scoped (or given) database.
    pub async fn count_all(&self, db: Option<&str>) -> DocumentStoreResult<u64> {
        let db = resolve_database(&self.scope, db)?;
        self.core.count_by_database(db).await
    }

    /// Soft-deletes every active document of the scoped (or given) database.
    pub async fn remove_all(&self, db: Option<&str>) -> DocumentStoreResult<usize> {
        let db = resolve_database(&self.scope, db)?;
        self.core.remove_all_from_database(db).await
    }

    /// Finds a document by identifier: an ID for `Fixed` repositories, a GUID otherwise.
    pub async fn find_by_identifier(
        &self,
        identifier: &str,
    ) -> DocumentStoreResult<Option<Document>> {
        match &self.scope {
            DatabaseScope::Fixed(name) => {
                self.core
                    .find_one_by_database_and_id(name, identifier)
                    .await
            }
            DatabaseScope::Unscoped => self.core.find_by_guid(identifier).await,
        }
    }

    /// Finds a document by GUID.
    ///
    /// # Errors
    ///
    /// A `Fixed` repository fails with [`DocumentStoreError::InvalidDocumentDatabase`] for a
    /// GUID of another database.
    pub async fn find_by_guid(&self, guid: &str) -> DocumentStoreResult<Option<Document>> {
        let (db, id) = split_guid(guid)?;
        let db = resolve_database(&self.scope, Some(db))?;
        self.core.find_one_by_database_and_id(db, id).await
    }

    /// Finds a document by database and ID.
    pub async fn find_one_by_database_and_id(
        &self,
        db: &str,
        id: &str,
    ) -> DocumentStoreResult<Option<Document>> {
        let db = resolve_database(&self.scope, Some(db))?;
        self.core.find_one_by_database_and_id(db, id).await
    }

    /// Finds documents matching the given properties.
    ///
    /// A `Fixed` repository restricts the search to its database. An `Unscoped` repository
    /// requires a `db` (or `database`) property; `db` wins when both are given.
    ///
    /// # Errors
    ///
    /// * [`DocumentStoreError::NoDatabaseSelected`] if an `Unscoped` search names no database
    /// * [`DocumentStoreError::InvalidDocumentDatabase`] if a `Fixed` search names another
    ///   database
    pub async fn find_with_properties(
        &self,
        properties: &Map<String, Value>,
        limit: usize,
    ) -> DocumentStoreResult<Vec<Document>> {
        let properties = scoped_properties(&self.scope, properties)?;
        self.core.find_with_properties(&properties, limit).await
    }

    /// Returns every active document regardless of database.
    ///
    /// # Errors
    ///
    /// A `Fixed` repository fails with [`DocumentStoreError::InvalidDocumentDatabase`].
    pub async fn find_all_ignore_database(&self) -> DocumentStoreResult<Vec<Document>> {
        match &self.scope {
            DatabaseScope::Fixed(name) => Err(DocumentStoreError::InvalidDocumentDatabase(
                "*".to_string(),
                name.clone(),
            )),
            DatabaseScope::Unscoped => self.core.find_all_ignore_database().await,
        }
    }
}

fn scoped_properties(
    scope: &DatabaseScope,
    properties: &Map<String, Value>,
) -> DocumentStoreResult<Map<String, Value>> {
    let mut properties = properties.clone();
    let database = properties.remove("database");
    let requested = match properties.remove("db") {
        Some(db) => Some(db),
        None => database,
    };
    let requested = match requested {
        Some(Value::String(db)) => Some(db),
        Some(other) => {
            return Err(DocumentStoreError::InvalidDatabaseName(format!(
                "Database name must be a string, got {other}"
            )));
        }
        None => None,
    };

    let db = match scope {
        DatabaseScope::Unscoped if requested.is_none() => {
            return Err(DocumentStoreError::NoDatabaseSelected(
                "Missing key \"database\"".to_string(),
            ));
        }
        _ => resolve_database(scope, requested.as_deref())?.to_string(),
    };

    if let DatabaseScope::Fixed(name) = scope {
        if let Some(guid) = properties.get("guid").and_then(Value::as_str) {
            let (guid_db, _) = split_guid(guid)?;
            if guid_db != name {
                return Err(DocumentStoreError::InvalidDocumentDatabase(
                    guid_db.to_string(),
                    name.clone(),
                ));
            }
        }
    }

    properties.insert("db".to_string(), Value::String(db));
    Ok(properties)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fixed(name: &str) -> DatabaseScope {
        DatabaseScope::Fixed(name.to_string())
    }

    #[test]
    fn test_fixed_scope_fills_missing_database() {
        let mut document = Document::default();
        document.set_id("x").unwrap();

        check_document_database(&fixed("people"), &mut document).unwrap();

        assert_eq!(document.db(), "people");
    }

    #[test]
    fn test_fixed_scope_rejects_other_database() {
        let mut document = Document::new("orders", "x").unwrap();

        let result = check_document_database(&fixed("people"), &mut document);

        match result {
            Err(DocumentStoreError::InvalidDocumentDatabase(document_db, repository_db)) => {
                assert_eq!(document_db, "orders");
                assert_eq!(repository_db, "people");
            }
            other => panic!("expected InvalidDocumentDatabase, got {:?}", other),
        }
        assert_eq!(document.db(), "orders");
    }

    #[test]
    fn test_unscoped_requires_database() {
        let mut document = Document::default();

        assert!(matches!(
            check_document_database(&DatabaseScope::Unscoped, &mut document),
            Err(DocumentStoreError::NoDatabaseSelected(_))
        ));

        let mut document = Document::new("orders", "x").unwrap();
        check_document_database(&DatabaseScope::Unscoped, &mut document).unwrap();
    }

    #[test]
    fn test_resolve_database() {
        let scope = fixed("people");
        assert_eq!(resolve_database(&scope, None).unwrap(), "people");
        assert_eq!(resolve_database(&scope, Some("people")).unwrap(), "people");
        assert!(matches!(
            resolve_database(&scope, Some("orders")),
            Err(DocumentStoreError::InvalidDocumentDatabase(_, _))
        ));

        let scope = DatabaseScope::Unscoped;
        assert_eq!(resolve_database(&scope, Some("orders")).unwrap(), "orders");
        assert!(matches!(
            resolve_database(&scope, None),
            Err(DocumentStoreError::NoDatabaseSelected(_))
        ));
        assert!(matches!(
            resolve_database(&scope, Some("Orders")),
            Err(DocumentStoreError::InvalidDatabaseName(_))
        ));
    }

    #[test]
    fn test_scoped_properties() {
        let properties = json!({"name": "Alice", "database": "people"});
        let scoped =
            scoped_properties(&DatabaseScope::Unscoped, properties.as_object().unwrap()).unwrap();
        assert_eq!(
            Value::Object(scoped),
            json!({"name": "Alice", "db": "people"})
        );

        let properties = json!({"name": "Alice"});
        assert!(matches!(
            scoped_properties(&DatabaseScope::Unscoped, properties.as_object().unwrap()),
            Err(DocumentStoreError::NoDatabaseSelected(_))
        ));

        let scoped = scoped_properties(&fixed("people"), properties.as_object().unwrap()).unwrap();
        assert_eq!(
            Value::Object(scoped),
            json!({"name": "Alice", "db": "people"})
        );

        let properties = json!({"db": "people", "database": "orders"});
        let scoped =
            scoped_properties(&DatabaseScope::Unscoped, properties.as_object().unwrap()).unwrap();
        assert_eq!(Value::Object(scoped), json!({"db": "people"}));

        let properties = json!({"guid": "orders/1"});
        assert!(matches!(
            scoped_properties(&fixed("people"), properties.as_object().unwrap()),
            Err(DocumentStoreError::InvalidDocumentDatabase(_, _))
        ));
    }
}
