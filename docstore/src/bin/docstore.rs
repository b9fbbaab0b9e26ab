/// docstore CLI - command line access to a MongoDB-backed document store
///
/// Usage:
///   docstore create <db> <id> [json]     - Create a document (JSON from argument or stdin)
///   docstore read <db> [id]              - Show one document or a whole database
///   docstore read <db>/<id>              - Show one document by GUID
///   docstore list                        - List all databases
///   docstore delete <db> <id>            - Soft-delete a document
///   docstore gc [db] [--min-age <days>]  - Purge soft-deleted documents
use std::{io::IsTerminal, process::ExitCode};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::*;
use serde_json::Value;
use tokio::io::AsyncReadExt;
use tracing_subscriber::EnvFilter;

use docstore::{
    backend::StoreBackendBuilder,
    codec,
    document::{Document, KeyValueCoding},
    mapper::DataMapper,
    mongodb::MongoDbStore,
    repository::DEFAULT_TABLE,
    store::DocumentStore,
};

const SECONDS_PER_DAY: i64 = 60 * 60 * 24;

/// Exit code of `create` when the document already exists.
const EXIT_ALREADY_EXISTS: u8 = 5;

/// docstore - a schema-less JSON document store
#[derive(Parser)]
#[command(name = "docstore")]
#[command(version, about, long_about = None)]
struct Cli {
    /// MongoDB connection string
    #[arg(long, env = "DOCSTORE_DSN", default_value = "mongodb://localhost:27017", global = true)]
    dsn: String,

    /// MongoDB database holding the documents table
    #[arg(long, env = "DOCSTORE_MONGO_DATABASE", default_value = "docstore", global = true)]
    mongo_database: String,

    /// Table (collection) holding the documents
    #[arg(long, env = "DOCSTORE_TABLE", default_value = DEFAULT_TABLE, global = true)]
    table: String,

    /// Only print document headers
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a new document
    ///
    /// Examples:
    ///   docstore create people alice '{"name": "Alice"}'
    ///   echo '{"name": "Bob"}' | docstore create people bob
    Create {
        /// Document database
        database: String,

        /// Document ID
        id: String,

        /// Document JSON data (otherwise read from stdin)
        data: Option<String>,
    },

    /// Read a document or all documents of a database
    ///
    /// Examples:
    ///   docstore read people alice
    ///   docstore read people/alice --key-path address.city
    ///   docstore read people --count
    Read {
        /// Document database, or a GUID (`<db>/<id>`)
        target: String,

        /// Document ID
        id: Option<String>,

        /// Count the documents in the database
        #[arg(short, long)]
        count: bool,

        /// Only print document headers
        #[arg(short, long)]
        short: bool,

        /// Print only the values at these key paths
        #[arg(short = 'k', long = "key-path")]
        key_paths: Vec<String>,
    },

    /// List all databases
    List,

    /// Remove a document from the database
    Delete {
        /// Document database
        database: String,

        /// Document ID
        id: String,
    },

    /// Permanently remove soft-deleted documents
    Gc {
        /// Name of the database
        database: Option<String>,

        /// Minimum age in days of the documents to delete
        #[arg(short = 'a', long, default_value_t = 0)]
        min_age: u32,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("DOCSTORE_LOG").unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    match run(cli).await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{} {err:#}", "Error:".red().bold());
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let backend = MongoDbStore::builder(&cli.dsn, &cli.mongo_database)
        .build()
        .await
        .context("Failed to connect to MongoDB")?;
    let store = DocumentStore::new(backend).with_table(cli.table.as_str());

    let result = execute(&store, cli.command, cli.quiet).await;
    store.shutdown().await.context("Failed to shut down the store")?;

    result
}

async fn execute(
    store: &DocumentStore<MongoDbStore>,
    command: Commands,
    quiet: bool,
) -> Result<ExitCode> {
    let repository = store.free_repository();

    match command {
        Commands::Create { database, id, data } => {
            if repository.find_one_by_database_and_id(&database, &id).await?.is_some() {
                eprintln!("{}", format!("Document {database}/{id} already exists").red());
                return Ok(ExitCode::from(EXIT_ALREADY_EXISTS));
            }

            let data = match data {
                Some(data) => data,
                None => read_stdin().await?,
            };
            let data = codec::deserialize(Some(data.as_str()))?;
            let mut document = build_document(&database, &id, data)?;

            print_document(&document, !quiet, &[])?;
            repository.add(&mut document).await.context("Failed to save document")?;
            println!("{}", "Saved".green());

            Ok(ExitCode::SUCCESS)
        }

        Commands::Read {
            target,
            id,
            count,
            short,
            key_paths,
        } => {
            let show_body = !(quiet || short);

            if count {
                let count = repository.count_all(Some(target.as_str())).await?;
                println!("{count} documents in database");
                return Ok(ExitCode::SUCCESS);
            }

            let document = match id {
                Some(id) => repository.find_one_by_database_and_id(&target, &id).await?,
                None if target.contains('/') => repository.find_by_guid(&target).await?,
                None => {
                    for document in repository.find_all(Some(target.as_str())).await? {
                        print_document(&document, show_body, &key_paths)?;
                    }
                    return Ok(ExitCode::SUCCESS);
                }
            };

            match document {
                Some(document) => {
                    print_document(&document, show_body, &key_paths)?;
                    Ok(ExitCode::SUCCESS)
                }
                None => {
                    eprintln!("{}", "Document not found".red());
                    Ok(ExitCode::FAILURE)
                }
            }
        }

        Commands::List => {
            let databases = store.databases().find_all().await?;
            let width = databases.iter().map(|db| db.name.len()).max().unwrap_or(0);

            for database in databases {
                let created = database
                    .creation_time
                    .map(|time| time.to_rfc2822())
                    .unwrap_or_else(|| "unknown".to_string());
                println!(
                    "{}",
                    format!("Database: {:<width$}\tCreation time: {created}", database.name).green()
                );
            }

            Ok(ExitCode::SUCCESS)
        }

        Commands::Delete { database, id } => {
            let Some(mut document) = repository
                .find_one_by_database_and_id(&database, &id)
                .await?
            else {
                eprintln!("{}", format!("Document {database}/{id} not found").red());
                return Ok(ExitCode::FAILURE);
            };

            print_document(&document, !quiet, &[])?;
            repository.remove(&mut document).await.context("Failed to remove document")?;
            println!("{}", format!("Removed {database}/{id}").green());

            Ok(ExitCode::SUCCESS)
        }

        Commands::Gc { database, min_age } => {
            let gc = store.gc();
            let min_age = i64::from(min_age) * SECONDS_PER_DAY;
            let database = database.as_deref();

            let count = gc.count_deleted_documents(min_age, database).await?;
            let removed = gc.remove_deleted_documents(min_age, database).await?;

            if removed || count == 0 {
                println!("{}", format!("Permanently deleted {count} documents").green());
                Ok(ExitCode::SUCCESS)
            } else {
                eprintln!("{}", format!("Could not permanently delete {count} documents").red());
                Ok(ExitCode::FAILURE)
            }
        }
    }
}

async fn read_stdin() -> Result<String> {
    if std::io::stdin().is_terminal() {
        eprintln!("{}", "Insert JSON formatted document (finish with Ctrl-D):".yellow());
    }

    let mut data = String::new();
    tokio::io::stdin()
        .read_to_string(&mut data)
        .await
        .context("Failed to read document from stdin")?;

    Ok(data)
}

/// Builds a new document from decoded input; the given database and ID take precedence.
fn build_document(db: &str, id: &str, data: Option<Value>) -> Result<Document> {
    let mut document = match data {
        Some(Value::Object(input)) => DataMapper::new().map_json(input)?,
        other => {
            let mut document = Document::default();
            document.set_data(other);
            document
        }
    };
    document.set_db(db)?;
    document.set_id(id)?;

    Ok(document)
}

fn print_document(document: &Document, show_body: bool, key_paths: &[String]) -> Result<()> {
    let id = match document.id() {
        "" => "(Missing ID)",
        id => id,
    };
    println!("{}", format!("Database: {} ID: {id}", document.db()).green());

    if !key_paths.is_empty() {
        for key_path in key_paths {
            println!("Data for key-path {}:", key_path.bold());
            print_json(&document.value_for_key_path(key_path)?.unwrap_or(Value::Null))?;
        }
    } else if show_body {
        print_json(document.unpacked_data()?.unwrap_or(&Value::Null))?;
    }

    Ok(())
}

fn print_json(value: &Value) -> Result<()> {
    println!("{}\n", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_build_document_prefers_arguments() {
        let document =
            build_document("people", "alice", Some(json!({"id": "bob", "age": 30}))).unwrap();

        assert_eq!(document.guid().as_deref(), Some("people/alice"));
        assert_eq!(document.value_for_key("age").unwrap(), Some(json!(30)));
    }

    #[test]
    fn test_build_document_keeps_non_object_payloads() {
        let document = build_document("lists", "one", Some(json!([1, 2]))).unwrap();

        assert_eq!(document.unpacked_data().unwrap(), Some(&json!([1, 2])));
    }

    #[test]
    fn test_build_document_validates_arguments() {
        assert!(build_document("People", "alice", None).is_err());
        assert!(build_document("people", "", None).is_err());
    }
}
