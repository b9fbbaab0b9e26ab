use async_trait::async_trait;
use bson::{Bson, Document, Uuid, doc};
use futures::{StreamExt, TryStreamExt, stream::iter};
use mongodb::{
    Client, Collection as MongoCollection,
    options::{ClientOptions, FindOptions},
};

use docstore_core::{
    backend::{StoreBackend, StoreBackendBuilder},
    error::{DocumentStoreError, DocumentStoreResult},
    query::{Expr, Query, QueryVisitor, SortDirection},
};

use crate::query::MongoQueryTranslator;

/// Column holding MongoDB's primary key.
const PRIMARY_KEY: &str = "_id";

#[derive(Debug)]
pub struct MongoDbStore {
    client: Client,
    database: String,
}

impl MongoDbStore {
    pub fn new(client: Client, database: String) -> Self {
        Self { client, database }
    }

    pub fn builder(dsn: &str, database: &str) -> MongoDbStoreBuilder {
        MongoDbStoreBuilder::new(dsn, database)
    }

    fn get_collection(&self, table: &str) -> MongoCollection<Document> {
        self.client.database(&self.database).collection(table)
    }

    fn prepare_row(&self, uid: &Uuid, row: &Bson) -> DocumentStoreResult<Document> {
        let mut prepared = row
            .as_document()
            .cloned()
            .ok_or_else(|| {
                DocumentStoreError::InvalidDocument(format!("Row must be a document, got {row}"))
            })?;
        prepared.insert(PRIMARY_KEY, uid.to_string());

        Ok(prepared)
    }

    fn restore_row(&self, mut row: Document) -> Bson {
        row.remove(PRIMARY_KEY);
        Bson::Document(row)
    }

    fn translate(&self, filter: Option<&Expr>) -> DocumentStoreResult<Document> {
        match filter {
            Some(expr) => MongoQueryTranslator.visit_expr(expr),
            None => Ok(doc! {}),
        }
    }
}

fn backend_error(err: mongodb::error::Error) -> DocumentStoreError {
    DocumentStoreError::Backend(err.to_string())
}

#[async_trait]
impl StoreBackend for MongoDbStore {
    async fn insert_rows(&self, rows: Vec<(Uuid, Bson)>, table: &str) -> DocumentStoreResult<()> {
        if rows.is_empty() {
            return Ok(());
        }

        self.get_collection(table)
            .insert_many(
                rows.iter()
                    .map(|(uid, row)| self.prepare_row(uid, row))
                    .collect::<DocumentStoreResult<Vec<Document>>>()?,
            )
            .await
            .map_err(backend_error)?;

        Ok(())
    }

    async fn update_rows(&self, rows: Vec<(Uuid, Bson)>, table: &str) -> DocumentStoreResult<()> {
        iter(rows)
            .then(async |(uid, row)| -> DocumentStoreResult<()> {
                let result = self
                    .get_collection(table)
                    .replace_one(
                        doc! { PRIMARY_KEY: uid.to_string() },
                        self.prepare_row(&uid, &row)?,
                    )
                    .await
                    .map_err(backend_error)?;

                if result.matched_count == 0 {
                    return Err(DocumentStoreError::DocumentNotFound(
                        uid.to_string(),
                        table.to_string(),
                    ));
                }

                Ok(())
            })
            .try_collect::<Vec<_>>()
            .await?;

        Ok(())
    }

    async fn delete_rows(&self, filter: Expr, table: &str) -> DocumentStoreResult<u64> {
        let result = self
            .get_collection(table)
            .delete_many(self.translate(Some(&filter))?)
            .await
            .map_err(backend_error)?;

        tracing::debug!(table, deleted = result.deleted_count, "Deleted rows");

        Ok(result.deleted_count)
    }

    async fn query_rows(&self, query: Query, table: &str) -> DocumentStoreResult<Vec<Bson>> {
        let mut options = FindOptions::default();

        if let Some(limit) = query.limit {
            options.limit = Some(limit as i64);
        }
        if !query.sort.is_empty() {
            let mut sort = Document::new();
            for order in &query.sort {
                sort.insert(
                    order.field.clone(),
                    match order.direction {
                        SortDirection::Asc => 1,
                        SortDirection::Desc => -1,
                    },
                );
            }
            options.sort = Some(sort);
        }

        Ok(self
            .get_collection(table)
            .find(self.translate(query.filter.as_ref())?)
            .with_options(options)
            .await
            .map_err(backend_error)?
            .try_collect::<Vec<Document>>()
            .await
            .map_err(backend_error)?
            .into_iter()
            .map(|row| self.restore_row(row))
            .collect())
    }

    async fn count_rows(&self, filter: Option<Expr>, table: &str) -> DocumentStoreResult<u64> {
        self.get_collection(table)
            .count_documents(self.translate(filter.as_ref())?)
            .await
            .map_err(backend_error)
    }

    async fn shutdown(self) -> DocumentStoreResult<()> {
        self.client.shutdown().await;

        Ok(())
    }
}

pub struct MongoDbStoreBuilder {
    dsn: String,
    database: String,
}

impl MongoDbStoreBuilder {
    pub fn new(dsn: &str, database: &str) -> Self {
        Self {
            dsn: dsn.to_string(),
            database: database.to_string(),
        }
    }
}

#[async_trait]
impl StoreBackendBuilder for MongoDbStoreBuilder {
    type Backend = MongoDbStore;

    async fn build(self) -> DocumentStoreResult<Self::Backend> {
        let options = ClientOptions::parse(&self.dsn)
            .await
            .map_err(|e| DocumentStoreError::Initialization(e.to_string()))?;
        let client = Client::with_options(options)
            .map_err(|e| DocumentStoreError::Initialization(e.to_string()))?;

        tracing::debug!(database = %self.database, "Connected MongoDB backend");

        Ok(MongoDbStore::new(client, self.database))
    }
}
