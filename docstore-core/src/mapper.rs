//! Mapping between storage rows, JSON input and [`Document`]s.
//!
//! A row is a BSON document with the columns listed in [`columns`]. The surrogate key is
//! stored as its hyphenated string form so every backend can compare it as plain text.

use bson::{Bson, Document as BsonDocument, Uuid};
use serde_json::{Map, Value};

use crate::{
    document::{DATA_PROPERTY_NAME, Document, KeyValueCoding},
    error::{DocumentStoreError, DocumentStoreResult},
};

/// Row column names.
pub mod columns {
    pub const UID: &str = "uid";
    pub const ID: &str = "id";
    pub const DB: &str = "db";
    pub const DATA_PROTECTED: &str = "data_protected";
    pub const DELETED: &str = "deleted";
    pub const CREATION_TIMESTAMP: &str = "creation_timestamp";
    pub const MODIFICATION_TIMESTAMP: &str = "modification_timestamp";
}

/// Converts rows to documents and back, and hydrates documents from JSON input.
#[derive(Debug, Clone, Copy, Default)]
pub struct DataMapper;

impl DataMapper {
    pub fn new() -> Self {
        DataMapper
    }

    /// Maps a list of rows to documents.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::DataMapping`] for the first malformed row.
    pub fn map(&self, rows: impl IntoIterator<Item = Bson>) -> DocumentStoreResult<Vec<Document>> {
        rows.into_iter()
            .map(|row| self.map_single_row(&row))
            .collect()
    }

    /// Maps one row to a document.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::DataMapping`] if the row is not a document, a column is
    /// missing or has the wrong type, or the stored `id` / `db` are invalid.
    pub fn map_single_row(&self, row: &Bson) -> DocumentStoreResult<Document> {
        let row = row
            .as_document()
            .ok_or_else(|| {
                DocumentStoreError::DataMapping(format!("Row must be a document, got {row}"))
            })?;

        let uid = required_str(row, columns::UID)?;
        let uid = Uuid::parse_str(uid)
            .map_err(|e| DocumentStoreError::DataMapping(format!("Invalid uid \"{uid}\": {e}")))?;

        let mut document = Document::default();
        document.set_uid(Some(uid));
        document
            .set_id(required_str(row, columns::ID)?)
            .map_err(|e| DocumentStoreError::DataMapping(e.to_string()))?;
        document
            .set_db(required_str(row, columns::DB)?)
            .map_err(|e| DocumentStoreError::DataMapping(e.to_string()))?;
        document.set_deleted(match row.get(columns::DELETED) {
            Some(Bson::Boolean(deleted)) => *deleted,
            Some(Bson::Int32(deleted)) => *deleted != 0,
            Some(Bson::Int64(deleted)) => *deleted != 0,
            None | Some(Bson::Null) => false,
            Some(other) => {
                return Err(DocumentStoreError::DataMapping(format!(
                    "Column \"{}\" must be a boolean, got {other}",
                    columns::DELETED
                )));
            }
        });
        document.set_creation_time(timestamp(row, columns::CREATION_TIMESTAMP)?);
        document.set_modification_time(timestamp(row, columns::MODIFICATION_TIMESTAMP)?);
        document.set_data_protected(match row.get(columns::DATA_PROTECTED) {
            Some(Bson::String(data)) => Some(data.clone()),
            None | Some(Bson::Null) => None,
            Some(other) => {
                return Err(DocumentStoreError::DataMapping(format!(
                    "Column \"{}\" must be a string, got {other}",
                    columns::DATA_PROTECTED
                )));
            }
        });

        Ok(document)
    }

    /// Converts a persisted document into its row.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::DataMapping`] if the document has no `uid`.
    pub fn to_row(&self, document: &Document) -> DocumentStoreResult<(Uuid, Bson)> {
        let uid = *document.uid().ok_or_else(|| {
            DocumentStoreError::DataMapping(format!(
                "Document {} has no uid",
                document.guid().unwrap_or_default()
            ))
        })?;

        let mut row = BsonDocument::new();
        row.insert(columns::UID, uid.to_string());
        row.insert(columns::ID, document.id());
        row.insert(columns::DB, document.db());
        row.insert(columns::DATA_PROTECTED, document.data_protected());
        row.insert(columns::DELETED, document.is_deleted());
        row.insert(columns::CREATION_TIMESTAMP, document.creation_time());
        row.insert(columns::MODIFICATION_TIMESTAMP, document.modification_time());

        Ok((uid, Bson::Document(row)))
    }

    /// Creates a document from JSON input. See [`DataMapper::hydrate`].
    ///
    /// # Errors
    ///
    /// Returns the errors of [`DataMapper::hydrate`].
    pub fn map_json(&self, input: Map<String, Value>) -> DocumentStoreResult<Document> {
        let mut document = Document::default();
        self.hydrate(&mut document, input)?;
        Ok(document)
    }

    /// Writes JSON input onto a document.
    ///
    /// The raw payload (`dataProtected`) is applied first so the remaining keys merge into
    /// it. Every other key goes through
    /// [`set_value_for_key`](KeyValueCoding::set_value_for_key), so declared attributes are
    /// validated and unknown keys land in the payload.
    ///
    /// # Errors
    ///
    /// Returns the first error raised by a setter.
    pub fn hydrate(
        &self,
        document: &mut Document,
        mut input: Map<String, Value>,
    ) -> DocumentStoreResult<()> {
        if let Some(raw) = input.remove(DATA_PROPERTY_NAME) {
            document.set_value_for_key(DATA_PROPERTY_NAME, raw)?;
        }

        for (key, value) in input {
            document.set_value_for_key(&key, value)?;
        }

        Ok(())
    }
}

fn required_str<'a>(row: &'a BsonDocument, column: &str) -> DocumentStoreResult<&'a str> {
    match row.get(column) {
        Some(Bson::String(value)) => Ok(value.as_str()),
        Some(other) => Err(DocumentStoreError::DataMapping(format!(
            "Column \"{column}\" must be a string, got {other}"
        ))),
        None => Err(DocumentStoreError::DataMapping(format!(
            "Missing column \"{column}\""
        ))),
    }
}

fn timestamp(row: &BsonDocument, column: &str) -> DocumentStoreResult<i64> {
    match row.get(column) {
        Some(Bson::Int64(value)) => Ok(*value),
        Some(Bson::Int32(value)) => Ok(i64::from(*value)),
        None | Some(Bson::Null) => Ok(0),
        Some(other) => Err(DocumentStoreError::DataMapping(format!(
            "Column \"{column}\" must be an integer, got {other}"
        ))),
    }
}
