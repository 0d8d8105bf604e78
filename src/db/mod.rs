//! Database abstraction layer.
//!
//! Provides trait-based interfaces for the two supported backends, a
//! relational store and a document store, so handlers can be built over real
//! drivers or in-memory mocks interchangeably.

mod document;
mod mock;
mod mongo;
mod mysql;
mod schema;
mod types;

pub(crate) use document::{json_to_document, json_type_name};
pub use document::{DocumentModification, DocumentOperation};
pub use mock::{MockDocumentClient, MockRelationalClient};
pub use mongo::MongoClient;
pub use mysql::MySqlClient;
pub use schema::{Entity, Field, ForeignKey, SchemaSnapshot};
pub use types::{ColumnInfo, Row, TabularResult, Value};

use crate::config::{DocumentConfig, RelationalConfig};
use crate::error::Result;
use async_trait::async_trait;
use mongodb::bson::Document;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Which of the two supported stores a request is routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendTarget {
    #[default]
    Relational,
    Document,
}

impl BackendTarget {
    /// Returns the target as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Relational => "relational",
            Self::Document => "document",
        }
    }

    /// Returns the product name of the backing store.
    pub fn engine_name(&self) -> &'static str {
        match self {
            Self::Relational => "MySQL",
            Self::Document => "MongoDB",
        }
    }
}

impl FromStr for BackendTarget {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "relational" | "sql" | "mysql" => Ok(Self::Relational),
            "document" | "mongo" | "mongodb" => Ok(Self::Document),
            _ => Err(format!(
                "Unknown backend: {s}. Expected: relational or document"
            )),
        }
    }
}

impl fmt::Display for BackendTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Connects to the relational backend described by `config`.
pub async fn connect_relational(config: &RelationalConfig) -> Result<Arc<dyn RelationalClient>> {
    let client = MySqlClient::connect(config).await?;
    Ok(Arc::new(client))
}

/// Connects to the document backend described by `config`.
pub async fn connect_document(config: &DocumentConfig) -> Result<Arc<dyn DocumentClient>> {
    let client = MongoClient::connect(config).await?;
    Ok(Arc::new(client))
}

/// Interface for relational clients.
///
/// Every statement runs inside its own transaction: committed on success,
/// rolled back on any error.
#[async_trait]
pub trait RelationalClient: Send + Sync {
    /// Introspects tables, columns and foreign keys.
    async fn introspect_schema(&self) -> Result<SchemaSnapshot>;

    /// Runs a row-returning statement.
    async fn fetch_rows(&self, sql: &str) -> Result<TabularResult>;

    /// Runs a modification statement and returns the affected-row count.
    async fn execute_statement(&self, sql: &str) -> Result<u64>;

    /// Closes the connection pool.
    async fn close(&self) -> Result<()>;
}

/// Interface for document-store clients.
#[async_trait]
pub trait DocumentClient: Send + Sync {
    /// Lists collections and samples one document from each.
    async fn introspect_schema(&self) -> Result<SchemaSnapshot>;

    /// Runs an aggregation pipeline and collects its output in order.
    async fn aggregate(&self, collection: &str, pipeline: Vec<Document>) -> Result<Vec<Document>>;

    /// Applies a modification and returns the inserted, modified or deleted count.
    async fn modify(&self, modification: DocumentModification) -> Result<u64>;

    /// Releases the client.
    async fn close(&self) -> Result<()>;
}
