/// Integration tests for the document repositories over the in-memory backend.
///
/// These cover the document lifecycle end to end:
/// - Soft delete hides documents but keeps their rows
/// - GUID lookups agree with `(db, id)` lookups
/// - Fixed repositories reject foreign documents before touching the backend
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use bson::{Bson, Uuid};
use docstore::{memory::InMemoryStore, prelude::*};
use serde_json::{Map, Value, json};

fn properties(value: Value) -> Map<String, Value> {
    value.as_object().cloned().unwrap()
}

async fn seed(store: &DocumentStore<InMemoryStore>) {
    let repository = store.free_repository();

    for (db, id, data) in [
        ("people", "alice", json!({"name": "Alice", "age": 30, "status": "active"})),
        ("people", "bob", json!({"name": "Bob", "age": 25, "status": "inactive"})),
        ("people", "carol", json!({"name": "Carol", "age": 30, "status": "active"})),
        ("orders", "1", json!({"total": 12.5})),
    ] {
        let mut document = Document::with_data(db, id, &data).unwrap();
        repository.add(&mut document).await.unwrap();
    }
}

#[tokio::test]
async fn test_add_assigns_uid_and_timestamps() {
    let store = DocumentStore::new(InMemoryStore::new());
    let people = store.repository("people").unwrap();

    let mut alice = Document::with_data("people", "alice", &json!({"name": "Alice"})).unwrap();
    people.add(&mut alice).await.unwrap();

    assert!(alice.uid().is_some());
    assert!(alice.creation_time() > 0);
    assert_eq!(alice.creation_time(), alice.modification_time());

    let found = people.find_by_identifier("alice").await.unwrap().unwrap();
    assert_eq!(found.uid(), alice.uid());
    assert_eq!(found.value_for_key_path("name").unwrap(), Some(json!("Alice")));
}

#[tokio::test]
async fn test_add_rejects_duplicates() {
    let store = DocumentStore::new(InMemoryStore::new());
    let people = store.repository("people").unwrap();

    let mut alice = Document::new("people", "alice").unwrap();
    people.add(&mut alice).await.unwrap();

    let mut again = Document::new("people", "alice").unwrap();
    assert!(matches!(
        people.add(&mut again).await,
        Err(DocumentStoreError::DocumentAlreadyExists(_, _))
    ));
    assert!(matches!(
        people.add(&mut alice).await,
        Err(DocumentStoreError::DocumentAlreadyExists(_, _))
    ));
}

#[tokio::test]
async fn test_update_persists_payload_changes() {
    let store = DocumentStore::new(InMemoryStore::new());
    let people = store.repository("people").unwrap();

    let mut alice = Document::with_data("people", "alice", &json!({"name": "Alice"})).unwrap();
    people.add(&mut alice).await.unwrap();

    alice.set_value_for_key("age", json!(31)).unwrap();
    people.update(&mut alice).await.unwrap();

    let found = people.find_by_identifier("alice").await.unwrap().unwrap();
    assert_eq!(found.value_for_key("age").unwrap(), Some(json!(31)));
    assert_eq!(found.value_for_key("name").unwrap(), Some(json!("Alice")));

    let mut never_added = Document::new("people", "dave").unwrap();
    assert!(matches!(
        people.update(&mut never_added).await,
        Err(DocumentStoreError::DocumentNotFound(_, _))
    ));
}

#[tokio::test]
async fn test_soft_delete_hides_document_but_keeps_row() {
    let store = DocumentStore::new(InMemoryStore::new());
    let people = store.repository("people").unwrap();

    let mut document = Document::with_data("people", "abc", &json!({"name": "Alice"})).unwrap();
    people.add(&mut document).await.unwrap();
    let uid = *document.uid().unwrap();

    people.remove(&mut document).await.unwrap();

    assert!(document.is_deleted());
    assert_ne!(document.id(), "abc");
    assert!(document.id().starts_with("abc-"));
    assert!(
        people
            .find_one_by_database_and_id("people", "abc")
            .await
            .unwrap()
            .is_none()
    );
    assert_eq!(people.count_all(None).await.unwrap(), 0);

    let rows = store
        .backend()
        .query_rows(
            Query::builder()
                .filter(Filter::eq("uid", uid.to_string()))
                .build(),
            store.table(),
        )
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
    let row = DataMapper::new().map_single_row(&rows[0]).unwrap();
    assert_eq!(row.status(), DocumentStatus::Tombstoned);
    assert_eq!(row.id(), document.id());

    // The original (db, id) can be reused.
    let mut replacement = Document::new("people", "abc").unwrap();
    people.add(&mut replacement).await.unwrap();
    assert_eq!(store.backend().row_count(store.table()).await, 2);
}

#[tokio::test]
async fn test_guid_lookups_agree() {
    let store = DocumentStore::new(InMemoryStore::new());
    seed(&store).await;
    let free = store.free_repository();
    let people = store.repository("people").unwrap();

    let by_pair = free
        .find_one_by_database_and_id("people", "alice")
        .await
        .unwrap()
        .unwrap();
    let by_guid = free.find_by_guid("people/alice").await.unwrap().unwrap();
    let by_identifier = free.find_by_identifier("people/alice").await.unwrap().unwrap();
    let by_fixed = people.find_by_identifier("alice").await.unwrap().unwrap();
    let by_properties = free
        .find_with_properties(&properties(json!({"db": "people", "guid": "people/alice"})), 10)
        .await
        .unwrap();

    for document in [&by_guid, &by_identifier, &by_fixed, &by_properties[0]] {
        assert_eq!(document.uid(), by_pair.uid());
    }
    assert_eq!(by_properties.len(), 1);

    assert!(matches!(
        free.find_by_guid("alice").await,
        Err(DocumentStoreError::InvalidDatabaseName(_))
    ));
}

#[tokio::test]
async fn test_find_with_properties_filters_and_limits() {
    let store = DocumentStore::new(InMemoryStore::new());
    seed(&store).await;
    let people = store.repository("people").unwrap();

    let active = people
        .find_with_properties(&properties(json!({"status": "active"})), 10)
        .await
        .unwrap();
    let ids: Vec<_> = active.iter().map(|document| document.id().to_string()).collect();
    assert_eq!(ids, vec!["alice", "carol"]);

    let limited = people
        .find_with_properties(&properties(json!({"status": "active"})), 1)
        .await
        .unwrap();
    assert_eq!(limited.len(), 1);

    // Loose comparison matches the string "30" against the number 30.
    let thirty = people
        .find_with_properties(&properties(json!({"age": "30"})), 10)
        .await
        .unwrap();
    assert_eq!(thirty.len(), 2);

    let none = people
        .find_with_properties(&properties(json!({"name": "Nobody"})), 10)
        .await
        .unwrap();
    assert!(none.is_empty());
}

#[tokio::test]
async fn test_loose_search_matches_values_spelled_differently() {
    let store = DocumentStore::new(InMemoryStore::new());
    let core = store.core_repository();
    let mut dave =
        Document::with_data("people", "dave", &json!({"active": true, "age": 30})).unwrap();
    core.add(&mut dave).await.unwrap();

    for wanted in [
        json!({"db": "people", "active": "1"}),
        json!({"db": "people", "active": "yes"}),
        json!({"db": "people", "age": "30.0"}),
        json!({"db": "people", "age": "030"}),
    ] {
        let wanted = properties(wanted);
        let unconstrained = core
            .find_with_properties_unconstrained(&wanted, 10)
            .await
            .unwrap();
        let found = core.find_with_properties(&wanted, 10).await.unwrap();

        assert_eq!(unconstrained.len(), 1, "{wanted:?}");
        assert_eq!(found.len(), unconstrained.len(), "{wanted:?}");
    }
}

#[tokio::test]
async fn test_strict_filter_compares_types() {
    let store = DocumentStore::new(InMemoryStore::new()).with_filter(DocumentFilter::strict());
    seed(&store).await;
    let people = store.repository("people").unwrap();

    let thirty = people
        .find_with_properties(&properties(json!({"age": "30"})), 10)
        .await
        .unwrap();
    assert!(thirty.is_empty());

    let thirty = people
        .find_with_properties(&properties(json!({"age": 30})), 10)
        .await
        .unwrap();
    assert_eq!(thirty.len(), 2);
}

#[tokio::test]
async fn test_unscoped_find_with_properties_requires_database() {
    let store = DocumentStore::new(InMemoryStore::new());
    seed(&store).await;
    let free = store.free_repository();

    assert!(matches!(
        free.find_with_properties(&properties(json!({"status": "active"})), 10).await,
        Err(DocumentStoreError::NoDatabaseSelected(_))
    ));

    let found = free
        .find_with_properties(&properties(json!({"database": "people", "status": "active"})), 10)
        .await
        .unwrap();
    assert_eq!(found.len(), 2);
}

#[tokio::test]
async fn test_remove_all_soft_deletes_one_database() {
    let store = DocumentStore::new(InMemoryStore::new());
    seed(&store).await;
    let free = store.free_repository();

    assert_eq!(free.remove_all(Some("people")).await.unwrap(), 3);

    assert_eq!(free.count_all(Some("people")).await.unwrap(), 0);
    assert_eq!(free.count_all(Some("orders")).await.unwrap(), 1);
    assert_eq!(free.find_all_ignore_database().await.unwrap().len(), 1);
    assert_eq!(store.backend().row_count(store.table()).await, 4);
}

#[tokio::test]
async fn test_list_databases() {
    let store = DocumentStore::new(InMemoryStore::new());
    seed(&store).await;

    let databases = store.databases().find_all().await.unwrap();
    let names: Vec<_> = databases.iter().map(|database| database.name.as_str()).collect();

    assert_eq!(names, vec!["orders", "people"]);
    assert!(databases.iter().all(|database| database.creation_time.is_some()));
}

#[tokio::test]
async fn test_repositories_share_a_table() {
    let store = DocumentStore::new(InMemoryStore::new()).with_table("custom");
    seed(&store).await;

    assert_eq!(store.backend().row_count("custom").await, 4);
    assert_eq!(store.backend().row_count("documents").await, 0);
}

/// Backend wrapper counting every call that reaches the store. Updates can be made to fail.
#[derive(Debug, Default)]
struct CountingBackend {
    inner: InMemoryStore,
    calls: AtomicUsize,
    fail_updates: AtomicBool,
}

impl CountingBackend {
    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn record(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl StoreBackend for CountingBackend {
    async fn insert_rows(&self, rows: Vec<(Uuid, Bson)>, table: &str) -> DocumentStoreResult<()> {
        self.record();
        self.inner.insert_rows(rows, table).await
    }

    async fn update_rows(&self, rows: Vec<(Uuid, Bson)>, table: &str) -> DocumentStoreResult<()> {
        self.record();
        if self.fail_updates.load(Ordering::SeqCst) {
            return Err(DocumentStoreError::Backend("update rejected".to_string()));
        }
        self.inner.update_rows(rows, table).await
    }

    async fn delete_rows(&self, filter: Expr, table: &str) -> DocumentStoreResult<u64> {
        self.record();
        self.inner.delete_rows(filter, table).await
    }

    async fn query_rows(&self, query: Query, table: &str) -> DocumentStoreResult<Vec<Bson>> {
        self.record();
        self.inner.query_rows(query, table).await
    }

    async fn count_rows(&self, filter: Option<Expr>, table: &str) -> DocumentStoreResult<u64> {
        self.record();
        self.inner.count_rows(filter, table).await
    }
}

#[tokio::test]
async fn test_fixed_scope_mismatch_never_reaches_backend() {
    let store = DocumentStore::new(CountingBackend::default());
    let orders = store.repository("orders").unwrap();

    let mut invoice = Document::new("invoices", "1").unwrap();
    let result = orders.add(&mut invoice).await;

    match result {
        Err(DocumentStoreError::InvalidDocumentDatabase(document_db, repository_db)) => {
            assert_eq!(document_db, "invoices");
            assert_eq!(repository_db, "orders");
        }
        other => panic!("expected InvalidDocumentDatabase, got {:?}", other),
    }
    assert!(matches!(
        orders.find_by_guid("invoices/1").await,
        Err(DocumentStoreError::InvalidDocumentDatabase(_, _))
    ));
    assert!(matches!(
        orders
            .find_with_properties(&properties(json!({"db": "invoices"})), 10)
            .await,
        Err(DocumentStoreError::InvalidDocumentDatabase(_, _))
    ));
    assert!(matches!(
        orders.find_all_ignore_database().await,
        Err(DocumentStoreError::InvalidDocumentDatabase(_, _))
    ));
    assert_eq!(store.backend().calls(), 0);

    let mut order = Document::new("orders", "1").unwrap();
    orders.add(&mut order).await.unwrap();
    assert!(store.backend().calls() > 0);
}

#[tokio::test]
async fn test_failed_remove_leaves_document_untouched() {
    let store = DocumentStore::new(CountingBackend::default());
    let people = store.repository("people").unwrap();

    let mut alice = Document::with_data("people", "alice", &json!({"name": "Alice"})).unwrap();
    people.add(&mut alice).await.unwrap();
    let before = alice.clone();

    store.backend().fail_updates.store(true, Ordering::SeqCst);
    assert!(matches!(
        people.remove(&mut alice).await,
        Err(DocumentStoreError::Backend(_))
    ));
    assert_eq!(alice.id(), "alice");
    assert!(!alice.is_deleted());
    assert_eq!(alice.modification_time(), before.modification_time());

    store.backend().fail_updates.store(false, Ordering::SeqCst);
    assert!(people.find_by_identifier("alice").await.unwrap().is_some());

    people.remove(&mut alice).await.unwrap();
    assert!(alice.id().starts_with("alice-"));
    assert!(alice.is_deleted());
    assert!(people.find_by_identifier("alice").await.unwrap().is_none());
}

#[tokio::test]
async fn test_remove_of_vanished_row_leaves_document_untouched() {
    let store = DocumentStore::new(InMemoryStore::new());
    let people = store.repository("people").unwrap();

    let mut alice = Document::new("people", "alice").unwrap();
    alice.set_uid(Some(Uuid::new()));

    assert!(matches!(
        people.remove(&mut alice).await,
        Err(DocumentStoreError::DocumentNotFound(_, _))
    ));
    assert_eq!(alice.id(), "alice");
    assert!(!alice.is_deleted());
}
