//! Convenient re-exports of commonly used types from docstore.
//!
//! ```ignore
//! use docstore::prelude::*;
//! ```

pub use docstore_core::{
    backend::{StoreBackend, StoreBackendBuilder},
    database::{Database, DatabaseRepository},
    document::{Document, DocumentStatus, KeyValueCoding},
    error::{DocumentStoreError, DocumentStoreResult},
    filter::DocumentFilter,
    gc::GcService,
    mapper::DataMapper,
    query::{Expr, FieldOp, Filter, Query, QueryBuilder, QueryVisitor, Sort, SortDirection},
    repository::CoreDocumentRepository,
    scope::{DatabaseScope, DocumentRepository},
    store::DocumentStore,
};

pub use crate::rest::{DocumentHandler, RestError};
