//! Error types and result types for document store operations.
//!
//! Every fallible operation in this crate returns [`DocumentStoreResult<T>`]. Shape violations
//! (`InvalidId`, `InvalidDatabaseName`) and scope violations (`NoDatabaseSelected`,
//! `InvalidDocumentDatabase`) are always raised before the backend is touched.

use bson::error::Error as BsonError;
use serde_json::Error as SerdeJsonError;
use thiserror::Error;

/// Represents all possible errors that can occur when interacting with a document store.
#[derive(Error, Debug)]
pub enum DocumentStoreError {
    /// The given value is not a valid document ID.
    #[error("Invalid ID: {0}")]
    InvalidId(String),
    /// The given value is not a valid database name.
    #[error("Invalid database name: {0}")]
    InvalidDatabaseName(String),
    /// The document payload is malformed or has an unexpected structure.
    #[error("Invalid document: {0}")]
    InvalidDocument(String),
    /// An operation needed a database but none could be resolved.
    #[error("No database selected: {0}")]
    NoDatabaseSelected(String),
    /// The document belongs to a different database than the repository it was handed to.
    /// The first argument is the document's database, the second is the repository's.
    #[error(
        "Document does not belong to this repository. The document's database \"{0}\" does not match the repository's database \"{1}\""
    )]
    InvalidDocumentDatabase(String, String),
    /// A storage row could not be mapped onto a document.
    #[error("Data mapping error: {0}")]
    DataMapping(String),
    /// An active document with the given GUID already exists.
    /// The first argument is the GUID, the second is the table name.
    #[error("Document {0} already exists in table {1}")]
    DocumentAlreadyExists(String, String),
    /// The document has no stored row.
    /// The first argument is the GUID (or surrogate key), the second is the table name.
    #[error("Document not found {0} in table {1}")]
    DocumentNotFound(String, String),
    /// A parameterized predicate was built with the wrong number of parameters.
    #[error(
        "Number of parameters ({parameters}) does not match the number of placeholders ({placeholders})"
    )]
    PlaceholderMismatch {
        /// Number of `?` placeholders in the template.
        placeholders: usize,
        /// Number of parameters supplied.
        parameters: usize,
    },
    /// Serialization/deserialization error when converting between row formats (BSON, JSON).
    #[error("Serialization error: {0}")]
    Serialization(String),
    /// Error during store initialization or connection setup.
    #[error("Initialization error: {0}")]
    Initialization(String),
    /// An error occurred in the underlying storage backend.
    #[error("Backend error: {0}")]
    Backend(String),
}

/// A specialized `Result` type for document store operations.
pub type DocumentStoreResult<T> = Result<T, DocumentStoreError>;

impl From<BsonError> for DocumentStoreError {
    fn from(err: BsonError) -> Self {
        DocumentStoreError::Serialization(err.to_string())
    }
}

impl From<SerdeJsonError> for DocumentStoreError {
    fn from(err: SerdeJsonError) -> Self {
        DocumentStoreError::Serialization(err.to_string())
    }
}
