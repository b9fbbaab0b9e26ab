//! A schema-less JSON document store with database scoping, soft delete and garbage collection.
//!
//! This crate is the core of the docstore project and provides:
//!
//! - **Documents** ([`document`]) - The document entity, ID / database rules and key-path access
//! - **JSON codec** ([`codec`]) - Serialization of document payloads
//! - **Property filtering** ([`filter`]) - Lazy in-memory matching of documents against constraints
//! - **Queries** ([`query`]) - Backend predicates and the property compiler
//! - **Store backend abstraction** ([`backend`]) - Traits for implementing storage backends
//! - **Data mapping** ([`mapper`]) - Conversion between rows, JSON input and documents
//! - **Repositories** ([`repository`], [`scope`]) - CRUD, soft delete and database scoping
//! - **Garbage collection** ([`gc`]) - Purging of soft-deleted documents
//! - **Database listing** ([`database`]) - The databases present in a table
//! - **Document store** ([`store`]) - Main interface tying a backend to the above
//! - **Error handling** ([`error`]) - Error types and result types
//!
//! # Example
//!
//! ```ignore
//! use docstore_core::{document::{Document, KeyValueCoding}, store::DocumentStore};
//! use serde_json::json;
//!
//! let store = DocumentStore::new(backend);
//! let people = store.repository("people")?;
//!
//! let mut alice = Document::with_data("people", "alice", &json!({"name": "Alice"}))?;
//! people.add(&mut alice).await?;
//!
//! let found = people.find_by_identifier("alice").await?;
//! ```

#[allow(unused_extern_crates)]
extern crate self as docstore_core;

pub mod backend;
pub mod codec;
pub mod database;
pub mod document;
pub mod error;
pub mod filter;
pub mod gc;
pub mod mapper;
pub mod query;
pub mod repository;
pub mod scope;
pub mod store;
