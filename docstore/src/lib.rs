//! Main docstore crate providing a unified interface for JSON document storage.
//!
//! This crate is the primary entry point for users of docstore. It re-exports the core types
//! from the sub-crates, provides access to the storage backends and ships a framework-free
//! REST handler layer ([`rest`]) plus the `docstore` command line tool.
//!
//! # Features
//!
//! - **Schema-less documents** - Arbitrary JSON payloads addressed by `(database, id)`
//! - **Database scoping** - Repositories bound to one database or working across all of them
//! - **Soft delete and garbage collection** - Tombstoned documents are purged once old enough
//! - **Multiple backends** - In-memory and MongoDB storage behind one backend trait
//!
//! # Quick Start
//!
//! ```ignore
//! use docstore::{prelude::*, memory::InMemoryStore};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> DocumentStoreResult<()> {
//!     let store = DocumentStore::new(InMemoryStore::builder().build().await?);
//!     let people = store.repository("people")?;
//!
//!     let mut alice = Document::with_data("people", "alice", &json!({"name": "Alice"}))?;
//!     people.add(&mut alice).await?;
//!
//!     let found = people.find_by_identifier("alice").await?;
//!     println!("{:?}", found.map(|doc| doc.value_for_key_path("name")));
//!
//!     people.remove(&mut alice).await?;
//!     store.gc().remove_deleted_documents(7 * 86_400, None).await?;
//!
//!     store.shutdown().await
//! }
//! ```
//!
//! # Backends
//!
//! - [`memory`] - Fast in-memory storage for development and testing
//! - [`mongodb`] - Persistent MongoDB backend (requires `mongodb` feature)

pub mod prelude;
pub mod rest;

pub use docstore_core::{
    backend, codec, database, document, error, filter, gc, mapper, query, repository, scope, store,
};

// Re-export BSON types for convenience
pub use bson;

/// In-memory storage backend implementations.
pub mod memory {
    pub use docstore_memory::{InMemoryStore, InMemoryStoreBuilder};
}

/// MongoDB storage backend implementations.
///
/// This module is only available when the `mongodb` feature is enabled.
#[cfg(feature = "mongodb")]
pub mod mongodb {
    pub use docstore_mongodb::{MongoDbStore, MongoDbStoreBuilder};
}
