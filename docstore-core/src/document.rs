//! The document entity and its key / key-path access.
//!
//! A [`Document`] is a JSON payload addressed by a database name and an ID. The payload is
//! stored as serialized JSON text (`dataProtected`) and unpacked lazily on first structured
//! access. Reads and writes by name go through the [`KeyValueCoding`] trait, which resolves
//! declared attributes first and falls back to the payload.
//!
//! # Example
//!
//! ```ignore
//! use docstore_core::document::{Document, KeyValueCoding};
//! use serde_json::json;
//!
//! let mut doc = Document::new("people", "alice")?;
//! doc.set_value_for_key("name", json!("Alice"))?;
//! doc.set_value_for_key("address", json!({"city": "Vienna"}))?;
//!
//! assert_eq!(doc.guid().as_deref(), Some("people/alice"));
//! assert_eq!(doc.value_for_key_path("address.city")?, Some(json!("Vienna")));
//! ```

use bson::Uuid;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::{Map, Value};
use std::sync::OnceLock;

use crate::{
    codec,
    error::{DocumentStoreError, DocumentStoreResult},
};

/// Name of the attribute holding the raw serialized payload.
pub const DATA_PROPERTY_NAME: &str = "dataProtected";

/// Attribute names resolved on the document itself rather than in its payload.
pub const DECLARED_ATTRIBUTES: [&str; 7] = [
    "id",
    "db",
    "deleted",
    "creationTime",
    "modificationTime",
    DATA_PROPERTY_NAME,
    "uid",
];

/// Validates a document ID.
///
/// After stripping `-` and `_` the remainder must be non-empty and ASCII alphanumeric.
///
/// # Errors
///
/// Returns [`DocumentStoreError::InvalidId`] describing the violated rule.
pub fn validate_id(id: &str) -> DocumentStoreResult<()> {
    let clean: String = id.chars().filter(|c| *c != '-' && *c != '_').collect();

    if clean.trim().is_empty() {
        return Err(DocumentStoreError::InvalidId("ID must not be empty".to_string()));
    }
    if !clean.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(DocumentStoreError::InvalidId(format!(
            "ID \"{id}\" must contain only alphanumeric characters, \"-\" and \"_\""
        )));
    }

    Ok(())
}

/// Validates a database name.
///
/// The rules of [`validate_id`] apply, and the name must also be lowercase.
///
/// # Errors
///
/// Returns [`DocumentStoreError::InvalidDatabaseName`] describing the violated rule.
pub fn validate_db(db: &str) -> DocumentStoreResult<()> {
    let clean: String = db.chars().filter(|c| *c != '-' && *c != '_').collect();

    if clean.trim().is_empty() {
        return Err(DocumentStoreError::InvalidDatabaseName(
            "Database name must not be empty".to_string(),
        ));
    }
    if !clean.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(DocumentStoreError::InvalidDatabaseName(format!(
            "Database name \"{db}\" must contain only alphanumeric characters, \"-\" and \"_\""
        )));
    }
    if db.to_lowercase() != db {
        return Err(DocumentStoreError::InvalidDatabaseName(format!(
            "Database name \"{db}\" must be lowercase"
        )));
    }

    Ok(())
}

/// Splits a GUID (`db/id`) into its database and ID parts.
///
/// Only the database part is validated here; the ID is validated when it is used.
///
/// # Errors
///
/// Returns [`DocumentStoreError::InvalidDatabaseName`] if the GUID has no `/` separator or the
/// database part is not a valid name.
pub fn split_guid(guid: &str) -> DocumentStoreResult<(&str, &str)> {
    let (db, id) = guid.split_once('/').ok_or_else(|| {
        DocumentStoreError::InvalidDatabaseName(format!(
            "GUID \"{guid}\" does not contain a database part"
        ))
    })?;
    validate_db(db)?;

    Ok((db, id))
}

/// A value accepted as a document ID: a string or an integer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdValue(String);

impl From<&str> for IdValue {
    fn from(value: &str) -> Self {
        IdValue(value.to_string())
    }
}

impl From<String> for IdValue {
    fn from(value: String) -> Self {
        IdValue(value)
    }
}

impl From<&String> for IdValue {
    fn from(value: &String) -> Self {
        IdValue(value.clone())
    }
}

macro_rules! id_value_from_int {
    ($($t:ty),*) => {
        $(
            impl From<$t> for IdValue {
                fn from(value: $t) -> Self {
                    IdValue(value.to_string())
                }
            }
        )*
    };
}

id_value_from_int!(i32, i64, u32, u64, usize);

/// Lifecycle status of a stored document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentStatus {
    /// Visible to every query.
    Active,
    /// Soft-deleted; hidden from queries until garbage collection purges the row.
    Tombstoned,
}

/// Dynamic, name-based access to a document's attributes and payload.
///
/// Implementors resolve declared attributes in [`value_for_key`](KeyValueCoding::value_for_key)
/// and route unknown names to [`value_for_undefined_key`](KeyValueCoding::value_for_undefined_key).
/// The key-path methods are provided in terms of `value_for_key` and
/// [`unpacked_data`](KeyValueCoding::unpacked_data).
pub trait KeyValueCoding {
    /// Returns the value stored under `key`.
    ///
    /// `None` means the key is absent; `Some(Value::Null)` means it is present and null.
    ///
    /// # Errors
    ///
    /// Returns an error if the payload has to be unpacked and is not valid JSON.
    fn value_for_key(&self, key: &str) -> DocumentStoreResult<Option<Value>>;

    /// Called by `value_for_key` for keys that are neither declared nor in the payload.
    fn value_for_undefined_key(&self, _key: &str) -> Option<Value> {
        None
    }

    /// Stores `value` under `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if a declared attribute rejects the value or the payload cannot hold
    /// the key.
    fn set_value_for_key(&mut self, key: &str, value: Value) -> DocumentStoreResult<()>;

    /// Returns the unpacked payload, decoding it on first access.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::InvalidDocument`] if the payload is not valid JSON.
    fn unpacked_data(&self) -> DocumentStoreResult<Option<&Value>>;

    /// Returns the value at a dotted key path.
    ///
    /// A path without `.` is a plain [`value_for_key`](KeyValueCoding::value_for_key) lookup.
    /// Otherwise the payload is walked one segment at a time; every step needs an object
    /// containing the segment, or the walk yields `None`.
    ///
    /// # Errors
    ///
    /// Returns an error if the payload is not valid JSON.
    fn value_for_key_path(&self, key_path: &str) -> DocumentStoreResult<Option<Value>> {
        if !key_path.contains('.') {
            return self.value_for_key(key_path);
        }

        let mut current = match self.unpacked_data()? {
            Some(data) => data,
            None => return Ok(None),
        };
        for segment in key_path.split('.') {
            match current.as_object().and_then(|object| object.get(segment)) {
                Some(next) => current = next,
                None => return Ok(None),
            }
        }

        Ok(Some(current.clone()))
    }

    /// Returns the value at a dotted key path, or `default` if it is absent or null.
    ///
    /// # Errors
    ///
    /// Returns an error if the payload is not valid JSON.
    fn value_for_key_path_or(&self, key_path: &str, default: Value) -> DocumentStoreResult<Value> {
        Ok(match self.value_for_key_path(key_path)? {
            Some(Value::Null) | None => default,
            Some(value) => value,
        })
    }
}

/// A JSON document addressed by `(db, id)`.
///
/// `uid`, `creation_time` and `modification_time` are owned by the storage layer and set by
/// the repository and data mapper.
#[derive(Debug, Clone, Default)]
pub struct Document {
    uid: Option<Uuid>,
    id: String,
    db: String,
    deleted: bool,
    creation_time: i64,
    modification_time: i64,
    data_protected: Option<String>,
    unpacked: OnceLock<Option<Value>>,
}

impl Document {
    /// Creates a document with a validated database and ID and no payload.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::InvalidDatabaseName`] or [`DocumentStoreError::InvalidId`].
    pub fn new(db: &str, id: impl Into<IdValue>) -> DocumentStoreResult<Self> {
        let mut document = Document::default();
        document.set_db(db)?;
        document.set_id(id)?;
        Ok(document)
    }

    /// Creates a document like [`Document::new`] with the given payload.
    ///
    /// # Errors
    ///
    /// Returns the validation errors of [`Document::new`].
    pub fn with_data(db: &str, id: impl Into<IdValue>, data: &Value) -> DocumentStoreResult<Self> {
        let mut document = Document::new(db, id)?;
        document.set_data_protected(Some(codec::serialize(Some(data))));
        Ok(document)
    }

    pub fn uid(&self) -> Option<&Uuid> {
        self.uid.as_ref()
    }

    pub fn set_uid(&mut self, uid: Option<Uuid>) {
        self.uid = uid;
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Sets the ID. The document is left unchanged if the value is invalid.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::InvalidId`].
    pub fn set_id(&mut self, id: impl Into<IdValue>) -> DocumentStoreResult<()> {
        let IdValue(id) = id.into();
        validate_id(&id)?;
        self.id = id;
        Ok(())
    }

    pub fn db(&self) -> &str {
        &self.db
    }

    /// Sets the database name, stored lower-cased. The document is left unchanged if the
    /// value is invalid.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::InvalidDatabaseName`].
    pub fn set_db(&mut self, db: &str) -> DocumentStoreResult<()> {
        validate_db(db)?;
        self.db = db.to_lowercase();
        Ok(())
    }

    /// Returns `db/id`, or `None` if both parts are empty.
    pub fn guid(&self) -> Option<String> {
        if self.db.is_empty() && self.id.is_empty() {
            None
        } else {
            Some(format!("{}/{}", self.db, self.id))
        }
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted
    }

    pub fn set_deleted(&mut self, deleted: bool) {
        self.deleted = deleted;
    }

    pub fn status(&self) -> DocumentStatus {
        if self.deleted {
            DocumentStatus::Tombstoned
        } else {
            DocumentStatus::Active
        }
    }

    pub fn creation_time(&self) -> i64 {
        self.creation_time
    }

    pub fn set_creation_time(&mut self, timestamp: i64) {
        self.creation_time = timestamp;
    }

    pub fn modification_time(&self) -> i64 {
        self.modification_time
    }

    pub fn set_modification_time(&mut self, timestamp: i64) {
        self.modification_time = timestamp;
    }

    /// Returns the raw serialized payload.
    pub fn data_protected(&self) -> Option<&str> {
        self.data_protected.as_deref()
    }

    /// Replaces the raw serialized payload and drops the unpacked cache.
    pub fn set_data_protected(&mut self, data: Option<String>) {
        self.data_protected = data;
        self.unpacked = OnceLock::new();
    }

    /// Replaces the payload with an already unpacked value.
    pub fn set_data(&mut self, data: Option<Value>) {
        self.data_protected = Some(codec::serialize(data.as_ref()));
        self.unpacked = OnceLock::from(data);
    }

    fn set_payload_key(&mut self, key: &str, value: Value) -> DocumentStoreResult<()> {
        let mut data = match self.unpacked_data()? {
            None => Map::new(),
            Some(Value::Object(object)) => object.clone(),
            Some(_) => {
                return Err(DocumentStoreError::InvalidDocument(format!(
                    "Cannot set key \"{key}\" because the document data is not an object"
                )));
            }
        };
        data.insert(key.to_string(), value);
        self.set_data(Some(Value::Object(data)));
        Ok(())
    }
}

fn expect_timestamp(key: &str, value: &Value) -> DocumentStoreResult<i64> {
    value.as_i64().ok_or_else(|| {
        DocumentStoreError::InvalidDocument(format!("\"{key}\" must be an integer timestamp"))
    })
}

impl KeyValueCoding for Document {
    fn value_for_key(&self, key: &str) -> DocumentStoreResult<Option<Value>> {
        let declared = match key {
            "id" => Some(Value::String(self.id.clone())),
            "db" => Some(Value::String(self.db.clone())),
            "deleted" => Some(Value::Bool(self.deleted)),
            "creationTime" => Some(Value::from(self.creation_time)),
            "modificationTime" => Some(Value::from(self.modification_time)),
            DATA_PROPERTY_NAME => Some(
                self.data_protected
                    .clone()
                    .map(Value::String)
                    .unwrap_or(Value::Null),
            ),
            "uid" => Some(
                self.uid
                    .map(|uid| Value::String(uid.to_string()))
                    .unwrap_or(Value::Null),
            ),
            _ => None,
        };
        if declared.is_some() {
            return Ok(declared);
        }

        let found = self
            .unpacked_data()?
            .and_then(Value::as_object)
            .and_then(|object| object.get(key))
            .cloned();

        Ok(found.or_else(|| self.value_for_undefined_key(key)))
    }

    fn set_value_for_key(&mut self, key: &str, value: Value) -> DocumentStoreResult<()> {
        match key {
            DATA_PROPERTY_NAME => match value {
                Value::Null => self.set_data_protected(None),
                Value::String(raw) => self.set_data_protected(Some(raw)),
                _ => {
                    return Err(DocumentStoreError::InvalidDocument(format!(
                        "\"{DATA_PROPERTY_NAME}\" must be a string"
                    )));
                }
            },
            "id" => match value {
                Value::String(id) => self.set_id(id)?,
                Value::Number(number) if number.is_i64() || number.is_u64() => {
                    self.set_id(number.to_string())?
                }
                other => {
                    return Err(DocumentStoreError::InvalidId(format!(
                        "ID must be either a string or integer value, got {other}"
                    )));
                }
            },
            "db" => match value {
                Value::String(db) => self.set_db(&db)?,
                other => {
                    return Err(DocumentStoreError::InvalidDatabaseName(format!(
                        "Database name must be a string, got {other}"
                    )));
                }
            },
            "deleted" => match value {
                Value::Bool(deleted) => self.deleted = deleted,
                Value::Number(number) => self.deleted = number.as_i64().unwrap_or(0) != 0,
                other => {
                    return Err(DocumentStoreError::InvalidDocument(format!(
                        "\"deleted\" must be a boolean, got {other}"
                    )));
                }
            },
            "creationTime" => self.creation_time = expect_timestamp(key, &value)?,
            "modificationTime" => self.modification_time = expect_timestamp(key, &value)?,
            "uid" => match value {
                Value::Null => self.uid = None,
                Value::String(raw) => {
                    let uid = Uuid::parse_str(&raw).map_err(|e| {
                        DocumentStoreError::InvalidDocument(format!("Invalid uid \"{raw}\": {e}"))
                    })?;
                    self.uid = Some(uid);
                }
                other => {
                    return Err(DocumentStoreError::InvalidDocument(format!(
                        "\"uid\" must be a UUID string, got {other}"
                    )));
                }
            },
            _ => self.set_payload_key(key, value)?,
        }

        Ok(())
    }

    fn unpacked_data(&self) -> DocumentStoreResult<Option<&Value>> {
        if let Some(cached) = self.unpacked.get() {
            return Ok(cached.as_ref());
        }

        let decoded = codec::deserialize(self.data_protected.as_deref())?;
        Ok(self.unpacked.get_or_init(|| decoded).as_ref())
    }
}

fn format_timestamp(timestamp: i64) -> Option<String> {
    DateTime::<Utc>::from_timestamp(timestamp, 0)
        .map(|date| date.to_rfc3339_opts(SecondsFormat::Secs, false))
}

/// Serializes the document as its public JSON shape: the payload's keys, the `id`, and a
/// `_meta` object with `db`, `guid`, `modificationTime` and `creationTime` (ISO-8601).
///
/// A payload that cannot be decoded, or is not an object, contributes no keys.
impl Serialize for Document {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let payload = match self.unpacked_data() {
            Ok(Some(Value::Object(object))) => Some(object),
            _ => None,
        };

        let mut map = serializer.serialize_map(None)?;
        if let Some(object) = payload {
            for (key, value) in object.iter().filter(|(key, _)| !is_meta_key(key)) {
                map.serialize_entry(key, value)?;
            }
        }
        map.serialize_entry("id", &self.id)?;

        let mut meta = Map::new();
        meta.insert("db".to_string(), Value::String(self.db.clone()));
        meta.insert(
            "guid".to_string(),
            self.guid().map(Value::String).unwrap_or(Value::Null),
        );
        meta.insert(
            "modificationTime".to_string(),
            format_timestamp(self.modification_time)
                .map(Value::String)
                .unwrap_or(Value::Null),
        );
        meta.insert(
            "creationTime".to_string(),
            format_timestamp(self.creation_time)
                .map(Value::String)
                .unwrap_or(Value::Null),
        );
        map.serialize_entry("_meta", &meta)?;

        map.end()
    }
}

fn is_meta_key(key: &str) -> bool {
    matches!(key, "id" | "_meta")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_set_id_accepts_valid_values() {
        let mut doc = Document::default();

        doc.set_id("abc-123_x").unwrap();
        assert_eq!(doc.id(), "abc-123_x");

        doc.set_id(42).unwrap();
        assert_eq!(doc.id(), "42");
    }

    #[test]
    fn test_set_id_rejects_invalid_values_without_mutation() {
        let mut doc = Document::new("db", "original").unwrap();

        for invalid in ["", "--", "a b", "a/b", "ä"] {
            let result = doc.set_id(invalid);
            assert!(matches!(result, Err(DocumentStoreError::InvalidId(_))), "{invalid}");
            assert_eq!(doc.id(), "original");
        }
    }

    #[test]
    fn test_set_db_rules() {
        let mut doc = Document::default();

        doc.set_db("my-db_1").unwrap();
        assert_eq!(doc.db(), "my-db_1");

        for invalid in ["", "_", "My-DB", "a.b", "a/b"] {
            let result = doc.set_db(invalid);
            assert!(
                matches!(result, Err(DocumentStoreError::InvalidDatabaseName(_))),
                "{invalid}"
            );
            assert_eq!(doc.db(), "my-db_1");
        }
    }

    #[test]
    fn test_guid() {
        let mut doc = Document::default();
        assert_eq!(doc.guid(), None);

        doc.set_id("x").unwrap();
        assert_eq!(doc.guid().as_deref(), Some("/x"));

        doc.set_db("d").unwrap();
        assert_eq!(doc.guid().as_deref(), Some("d/x"));
    }

    #[test]
    fn test_split_guid() {
        assert_eq!(split_guid("people/alice").unwrap(), ("people", "alice"));
        assert!(matches!(
            split_guid("alice"),
            Err(DocumentStoreError::InvalidDatabaseName(_))
        ));
        assert!(matches!(
            split_guid("People/alice"),
            Err(DocumentStoreError::InvalidDatabaseName(_))
        ));
    }

    #[test]
    fn test_value_for_key_resolution_order() {
        let doc = Document::with_data("db", "doc1", &json!({"id": "shadowed", "name": "n"}))
            .unwrap();

        assert_eq!(doc.value_for_key("id").unwrap(), Some(json!("doc1")));
        assert_eq!(doc.value_for_key("db").unwrap(), Some(json!("db")));
        assert_eq!(doc.value_for_key("deleted").unwrap(), Some(json!(false)));
        assert_eq!(doc.value_for_key("name").unwrap(), Some(json!("n")));
        assert_eq!(doc.value_for_key("missing").unwrap(), None);
    }

    #[test]
    fn test_value_for_undefined_key_hook() {
        struct WithFallback(Document);

        impl KeyValueCoding for WithFallback {
            fn value_for_key(&self, key: &str) -> DocumentStoreResult<Option<Value>> {
                Ok(self
                    .0
                    .value_for_key(key)?
                    .or_else(|| self.value_for_undefined_key(key)))
            }

            fn value_for_undefined_key(&self, key: &str) -> Option<Value> {
                Some(json!(format!("undefined:{key}")))
            }

            fn set_value_for_key(&mut self, key: &str, value: Value) -> DocumentStoreResult<()> {
                self.0.set_value_for_key(key, value)
            }

            fn unpacked_data(&self) -> DocumentStoreResult<Option<&Value>> {
                self.0.unpacked_data()
            }
        }

        let wrapped = WithFallback(Document::new("db", "x").unwrap());
        assert_eq!(
            wrapped.value_for_key("color").unwrap(),
            Some(json!("undefined:color"))
        );
    }

    #[test]
    fn test_key_path_walk() {
        let doc = Document::with_data(
            "db",
            "x",
            &json!({"a": {"b": {"c": 42}, "n": null}, "s": "text"}),
        )
        .unwrap();

        assert_eq!(doc.value_for_key_path("a.b.c").unwrap(), Some(json!(42)));
        assert_eq!(doc.value_for_key_path("a.b.x").unwrap(), None);
        assert_eq!(doc.value_for_key_path("s.length").unwrap(), None);
        assert_eq!(doc.value_for_key_path("a.n").unwrap(), Some(Value::Null));
        assert_eq!(
            doc.value_for_key_path_or("a.b.x", json!("default")).unwrap(),
            json!("default")
        );
        assert_eq!(
            doc.value_for_key_path_or("a.n", json!("default")).unwrap(),
            json!("default")
        );
        assert_eq!(
            doc.value_for_key_path_or("a.b.c", json!("default")).unwrap(),
            json!(42)
        );
    }

    #[test]
    fn test_key_path_on_empty_document() {
        let doc = Document::new("db", "x").unwrap();

        assert_eq!(doc.value_for_key_path("a.b").unwrap(), None);
        assert_eq!(doc.unpacked_data().unwrap(), None);
    }

    #[test]
    fn test_set_value_for_key_writes_through() {
        let mut doc = Document::new("db", "x").unwrap();

        doc.set_value_for_key("name", json!("Alice")).unwrap();
        doc.set_value_for_key("age", json!(30)).unwrap();

        assert_eq!(
            codec::deserialize(doc.data_protected()).unwrap(),
            Some(json!({"name": "Alice", "age": 30}))
        );
        assert_eq!(doc.value_for_key("name").unwrap(), Some(json!("Alice")));
    }

    #[test]
    fn test_raw_payload_write_invalidates_cache() {
        let mut doc = Document::with_data("db", "x", &json!({"v": 1})).unwrap();
        assert_eq!(doc.value_for_key("v").unwrap(), Some(json!(1)));

        doc.set_value_for_key(DATA_PROPERTY_NAME, json!(r#"{"v": 2}"#))
            .unwrap();
        assert_eq!(doc.value_for_key("v").unwrap(), Some(json!(2)));

        doc.set_data_protected(Some(r#"{"v": 3}"#.to_string()));
        assert_eq!(doc.value_for_key("v").unwrap(), Some(json!(3)));
    }

    #[test]
    fn test_declared_attributes_route_through_setters() {
        let mut doc = Document::new("db", "x").unwrap();

        doc.set_value_for_key("id", json!(7)).unwrap();
        assert_eq!(doc.id(), "7");

        doc.set_value_for_key("db", json!("other")).unwrap();
        assert_eq!(doc.db(), "other");

        assert!(doc.set_value_for_key("db", json!("Bad Name")).is_err());
        assert_eq!(doc.db(), "other");

        doc.set_value_for_key("deleted", json!(true)).unwrap();
        assert_eq!(doc.status(), DocumentStatus::Tombstoned);

        doc.set_value_for_key("creationTime", json!(1_700_000_000))
            .unwrap();
        assert_eq!(doc.creation_time(), 1_700_000_000);
        assert_eq!(doc.unpacked_data().unwrap(), None);
    }

    #[test]
    fn test_key_write_on_non_object_payload_fails() {
        let mut doc = Document::with_data("db", "x", &json!([1, 2, 3])).unwrap();

        let result = doc.set_value_for_key("name", json!("value"));
        assert!(matches!(result, Err(DocumentStoreError::InvalidDocument(_))));
    }

    #[test]
    fn test_invalid_payload_surfaces_on_structured_access() {
        let mut doc = Document::new("db", "x").unwrap();
        doc.set_data_protected(Some("{not json".to_string()));

        assert!(matches!(
            doc.value_for_key("name"),
            Err(DocumentStoreError::InvalidDocument(_))
        ));
        assert_eq!(doc.value_for_key("id").unwrap(), Some(json!("x")));
    }

    #[test]
    fn test_serialize_public_shape() {
        let mut doc = Document::with_data("people", "alice", &json!({"name": "Alice"})).unwrap();
        doc.set_creation_time(0);
        doc.set_modification_time(86_400);

        let value = serde_json::to_value(&doc).unwrap();

        assert_eq!(
            value,
            json!({
                "name": "Alice",
                "id": "alice",
                "_meta": {
                    "db": "people",
                    "guid": "people/alice",
                    "modificationTime": "1970-01-02T00:00:00+00:00",
                    "creationTime": "1970-01-01T00:00:00+00:00",
                },
            })
        );
    }
}
