//! Framework-free REST handler layer.
//!
//! [`DocumentHandler`] implements the operations behind a document REST resource for one
//! database. Routing and HTTP plumbing are left to the embedding web framework:
//!
//! | Method         | Path                      | Operation                               |
//! |----------------|---------------------------|-----------------------------------------|
//! | `GET`          | `/`                       | [`info`](DocumentHandler::info)         |
//! | `GET`          | `/{db}`                   | [`list_all`](DocumentHandler::list_all) |
//! | `GET`          | `/{db}/_count`            | [`count_all`](DocumentHandler::count_all) |
//! | `POST`         | `/{db}`                   | [`create`](DocumentHandler::create)     |
//! | `GET`          | `/{db}/{id}`              | [`show`](DocumentHandler::show)         |
//! | `PUT` / `POST` | `/{db}/{id}`              | [`create_or_update`](DocumentHandler::create_or_update) |
//! | `PATCH`        | `/{db}/{id}`              | [`update`](DocumentHandler::update)     |
//! | `DELETE`       | `/{db}/{id}`              | [`delete`](DocumentHandler::delete)     |
//! | `GET`          | `/{db}/{id}/{property}`   | [`get_property`](DocumentHandler::get_property) |
//!
//! Documents are rendered through their `Serialize` implementation: the payload's keys, the
//! `id` and a `_meta` object.

use serde_json::{Map, Value};
use thiserror::Error;

use docstore_core::{
    backend::StoreBackend,
    codec,
    document::{DATA_PROPERTY_NAME, Document, KeyValueCoding},
    error::DocumentStoreError,
    mapper::DataMapper,
    scope::DocumentRepository,
    store::DocumentStore,
};

/// Version reported by [`DocumentHandler::info`].
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Request key carrying the identifier of the document being updated.
pub const IDENTIFIER_PROPERTY: &str = "__identity";

/// Document attributes maintained by the repository; request bodies may not set them.
const STORAGE_PROPERTIES: [&str; 3] = ["deleted", "creationTime", "modificationTime"];

/// An error response: an HTTP status code and a message.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{status} {message}")]
pub struct RestError {
    pub status: u16,
    pub message: String,
}

impl RestError {
    pub fn new(status: u16, message: impl Into<String>) -> Self {
        RestError {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        RestError::new(400, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        RestError::new(404, message)
    }
}

impl From<DocumentStoreError> for RestError {
    fn from(err: DocumentStoreError) -> Self {
        let status = match &err {
            DocumentStoreError::InvalidId(_)
            | DocumentStoreError::InvalidDatabaseName(_)
            | DocumentStoreError::InvalidDocument(_)
            | DocumentStoreError::NoDatabaseSelected(_)
            | DocumentStoreError::InvalidDocumentDatabase(_, _) => 400,
            DocumentStoreError::DocumentNotFound(_, _) => 404,
            DocumentStoreError::DocumentAlreadyExists(_, _) => 409,
            DocumentStoreError::DataMapping(_)
            | DocumentStoreError::PlaceholderMismatch { .. }
            | DocumentStoreError::Serialization(_)
            | DocumentStoreError::Initialization(_)
            | DocumentStoreError::Backend(_) => 500,
        };

        RestError::new(status, err.to_string())
    }
}

impl From<serde_json::Error> for RestError {
    fn from(err: serde_json::Error) -> Self {
        RestError::new(500, err.to_string())
    }
}

pub type RestResult<T> = Result<T, RestError>;

/// Handles the REST operations of one database.
#[derive(Debug)]
pub struct DocumentHandler<'a, B: StoreBackend> {
    repository: DocumentRepository<'a, B>,
    mapper: DataMapper,
}

impl<'a, B: StoreBackend> DocumentHandler<'a, B> {
    /// Creates a handler for the database named in the request path.
    ///
    /// # Errors
    ///
    /// Returns a `400` error if `db` is not a valid database name.
    pub fn new(store: &'a DocumentStore<B>, db: &str) -> RestResult<Self> {
        Ok(DocumentHandler {
            repository: store.repository(db)?,
            mapper: DataMapper::new(),
        })
    }

    /// Returns the handled database.
    pub fn database(&self) -> &str {
        self.repository.database().unwrap_or_default()
    }

    pub fn info() -> String {
        format!("Document Storage {VERSION}")
    }

    /// Renders every active document of the database.
    pub async fn list_all(&self) -> RestResult<Value> {
        let documents = self.repository.find_all(None).await?;

        Ok(Value::Array(documents.iter().map(render).collect::<RestResult<Vec<_>>>()?))
    }

    pub async fn count_all(&self) -> RestResult<u64> {
        Ok(self.repository.count_all(None).await?)
    }

    /// Renders one document.
    ///
    /// # Errors
    ///
    /// * `404` if no active document has the given ID
    /// * `500` if the stored payload cannot be decoded
    pub async fn show(&self, identifier: &str) -> RestResult<Value> {
        let document = self.fetch(identifier).await?;

        render(&document)
    }

    /// Returns a single property of a document, or `null` if it has no such property.
    ///
    /// `property` may be a key path. Dashed or underscored names (`creation-time`) are also
    /// tried in camel case (`creationTime`).
    pub async fn get_property(&self, identifier: &str, property: &str) -> RestResult<Value> {
        let document = self.fetch(identifier).await?;

        if let Some(value) = document.value_for_key_path(property)? {
            return Ok(value);
        }

        let key = property_parameter_to_key(property);
        if key != property {
            if let Some(value) = document.value_for_key_path(&key)? {
                return Ok(value);
            }
        }

        Ok(Value::Null)
    }

    /// Creates a document from the request body.
    ///
    /// The body must be an object with an `id`. The document always lands in the handled
    /// database, whatever `db` the body names.
    ///
    /// # Errors
    ///
    /// * `400` for a missing or malformed body or ID, or a body setting storage-owned
    ///   attributes
    /// * `409` if an active document with the same ID exists
    pub async fn create(&self, data: Value) -> RestResult<Value> {
        tracing::debug!(db = self.database(), body = %data, "Create request");

        let mut input = expect_object(data)?;
        reject_properties(&input, &[IDENTIFIER_PROPERTY, "uid"])?;
        check_writable(&input)?;
        match input.get("id") {
            None | Some(Value::Null) => return Err(RestError::bad_request("Missing object ID")),
            Some(Value::String(id)) if id.is_empty() => {
                return Err(RestError::bad_request("Missing object ID"));
            }
            _ => {}
        }
        input.remove("db");

        let mut document = self.mapper.map_json(input)?;
        document.set_db(self.database())?;
        self.repository.add(&mut document).await?;

        render(&document)
    }

    /// Merges the request body into an existing document.
    ///
    /// # Errors
    ///
    /// * `404` if no active document has the given ID
    /// * `400` for a malformed body, a body `id` that differs from `identifier`, or a body
    ///   setting `deleted`, a timestamp or an undecodable `dataProtected`
    pub async fn update(&self, identifier: &str, data: Value) -> RestResult<Value> {
        tracing::debug!(db = self.database(), identifier, body = %data, "Update request");

        let mut input = expect_object(data)?;
        check_identifier(&input, identifier)?;
        check_writable(&input)?;
        for key in [IDENTIFIER_PROPERTY, "id", "uid", "db"] {
            input.remove(key);
        }

        let mut document = self.fetch(identifier).await?;
        self.mapper.hydrate(&mut document, input)?;
        self.repository.update(&mut document).await?;

        render(&document)
    }

    /// Updates the document if it exists, creates it with the given ID otherwise.
    pub async fn create_or_update(&self, identifier: &str, data: Value) -> RestResult<Value> {
        if self.repository.find_by_identifier(identifier).await?.is_some() {
            return self.update(identifier, data).await;
        }

        let mut input = expect_object(data)?;
        check_identifier(&input, identifier)?;
        input.insert("id".to_string(), Value::String(identifier.to_string()));

        self.create(Value::Object(input)).await
    }

    /// Soft-deletes a document.
    ///
    /// # Errors
    ///
    /// Returns a `404` error if no active document has the given ID.
    pub async fn delete(&self, identifier: &str) -> RestResult<Value> {
        tracing::debug!(db = self.database(), identifier, "Delete request");

        let mut document = self.fetch(identifier).await?;
        self.repository.remove(&mut document).await?;

        Ok(Value::String("Deleted".to_string()))
    }

    async fn fetch(&self, identifier: &str) -> RestResult<Document> {
        self.repository
            .find_by_identifier(identifier)
            .await?
            .ok_or_else(|| {
                RestError::not_found(format!("Document {}/{identifier} not found", self.database()))
            })
    }
}

/// Renders a document, failing if its stored payload cannot be decoded.
fn render(document: &Document) -> RestResult<Value> {
    document
        .unpacked_data()
        .map_err(|err| RestError::new(500, err.to_string()))?;

    Ok(serde_json::to_value(document)?)
}

fn reject_properties(input: &Map<String, Value>, keys: &[&str]) -> RestResult<()> {
    match keys.iter().find(|key| input.contains_key(**key)) {
        Some(key) => Err(RestError::bad_request(format!("Invalid property \"{key}\""))),
        None => Ok(()),
    }
}

/// Rejects bodies touching storage-owned attributes or carrying an undecodable raw payload.
fn check_writable(input: &Map<String, Value>) -> RestResult<()> {
    reject_properties(input, &STORAGE_PROPERTIES)?;

    match input.get(DATA_PROPERTY_NAME) {
        None | Some(Value::Null) => Ok(()),
        Some(Value::String(raw)) => match codec::deserialize(Some(raw.as_str()))? {
            None | Some(Value::Object(_)) => Ok(()),
            Some(_) => Err(RestError::bad_request(format!(
                "\"{DATA_PROPERTY_NAME}\" must encode a JSON object"
            ))),
        },
        Some(_) => Err(RestError::bad_request(format!(
            "\"{DATA_PROPERTY_NAME}\" must be a string"
        ))),
    }
}

fn expect_object(data: Value) -> RestResult<Map<String, Value>> {
    match data {
        Value::Object(object) => Ok(object),
        _ => Err(RestError::bad_request("Invalid or missing payload")),
    }
}

fn check_identifier(input: &Map<String, Value>, identifier: &str) -> RestResult<()> {
    let matches = match input.get("id") {
        None | Some(Value::Null) => true,
        Some(Value::String(id)) => id == identifier,
        Some(Value::Number(id)) => id.to_string() == identifier,
        Some(_) => false,
    };

    if matches {
        Ok(())
    } else {
        Err(RestError::bad_request(
            "Property \"id\" is set but does not match the URI's identifier",
        ))
    }
}

fn property_parameter_to_key(parameter: &str) -> String {
    let mut key = String::with_capacity(parameter.len());
    let mut upper = false;

    for c in parameter.chars() {
        if c == '-' || c == '_' {
            upper = true;
        } else if upper {
            key.extend(c.to_uppercase());
            upper = false;
        } else {
            key.push(c);
        }
    }

    key
}
