//! MongoDB client implementation.
//!
//! Implements `DocumentClient` over the official driver. Schema inference
//! samples a single document per collection.

use crate::config::DocumentConfig;
use crate::db::{DocumentClient, DocumentModification, Entity, Field, SchemaSnapshot};
use crate::error::{BridgeError, Result};
use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::bson::{doc, Bson, Document};
use mongodb::{Client, Database};
use tracing::debug;

/// MongoDB client bound to one database.
#[derive(Debug, Clone)]
pub struct MongoClient {
    client: Client,
    db: Database,
}

impl MongoClient {
    /// Connects to the configured server and verifies it answers a ping.
    pub async fn connect(config: &DocumentConfig) -> Result<Self> {
        let uri = config.to_uri()?;
        let database = config.database_name()?;

        let client = Client::with_uri_str(&uri)
            .await
            .map_err(|e| BridgeError::connection(format!("Invalid MongoDB address: {e}")))?;
        let db = client.database(database);

        db.run_command(doc! { "ping": 1 }).await.map_err(|e| {
            BridgeError::connection(format!(
                "Cannot reach MongoDB at {}: {e}",
                config.display_string()
            ))
        })?;

        debug!("Connected to {}", config.display_string());
        Ok(Self { client, db })
    }

    fn collection(&self, name: &str) -> mongodb::Collection<Document> {
        self.db.collection::<Document>(name)
    }
}

#[async_trait]
impl DocumentClient for MongoClient {
    async fn introspect_schema(&self) -> Result<SchemaSnapshot> {
        let mut names = self
            .db
            .list_collection_names()
            .await
            .map_err(|e| BridgeError::connection(format!("Failed to list collections: {e}")))?;
        names.sort();

        let mut snapshot = SchemaSnapshot::new(self.db.name());
        for name in names {
            let sample = self
                .collection(&name)
                .find_one(doc! {})
                .await
                .map_err(|e| BridgeError::connection(format!("Failed to sample {name}: {e}")))?;

            let entity = match sample {
                Some(sample) => sample_entity(&name, &sample),
                None => Entity::new(name),
            };
            snapshot.entities.push(entity);
        }
        Ok(snapshot)
    }

    async fn aggregate(&self, collection: &str, pipeline: Vec<Document>) -> Result<Vec<Document>> {
        let cursor = self
            .collection(collection)
            .aggregate(pipeline)
            .await
            .map_err(|e| BridgeError::execution(e.to_string()))?;

        cursor
            .try_collect()
            .await
            .map_err(|e| BridgeError::execution(e.to_string()))
    }

    async fn modify(&self, modification: DocumentModification) -> Result<u64> {
        let coll = self.collection(modification.collection());

        let count = match modification {
            DocumentModification::InsertOne { document, .. } => {
                coll.insert_one(document).await.map(|_| 1)
            }
            DocumentModification::InsertMany { documents, .. } => coll
                .insert_many(documents)
                .await
                .map(|r| r.inserted_ids.len() as u64),
            DocumentModification::UpdateOne { filter, update, .. } => coll
                .update_one(filter, update)
                .await
                .map(|r| r.modified_count),
            DocumentModification::UpdateMany { filter, update, .. } => coll
                .update_many(filter, update)
                .await
                .map(|r| r.modified_count),
            DocumentModification::DeleteOne { filter, .. } => {
                coll.delete_one(filter).await.map(|r| r.deleted_count)
            }
            DocumentModification::DeleteMany { filter, .. } => {
                coll.delete_many(filter).await.map(|r| r.deleted_count)
            }
        };

        count.map_err(|e| BridgeError::execution(e.to_string()))
    }

    async fn close(&self) -> Result<()> {
        self.client.clone().shutdown().await;
        Ok(())
    }
}

/// Builds an entity from a sampled document, keeping key order.
fn sample_entity(name: &str, sample: &Document) -> Entity {
    sample
        .iter()
        .fold(Entity::new(name), |entity, (key, value)| {
            entity.with_field(Field::new(key, bson_type_name(value)))
        })
}

/// Type alias names as used by the `$type` query operator.
fn bson_type_name(value: &Bson) -> &'static str {
    match value {
        Bson::Double(_) => "double",
        Bson::String(_) => "string",
        Bson::Array(_) => "array",
        Bson::Document(_) => "object",
        Bson::Boolean(_) => "bool",
        Bson::Null => "null",
        Bson::Int32(_) => "int",
        Bson::Int64(_) => "long",
        Bson::ObjectId(_) => "objectId",
        Bson::DateTime(_) => "date",
        Bson::Decimal128(_) => "decimal",
        Bson::Binary(_) => "binData",
        Bson::Timestamp(_) => "timestamp",
        Bson::RegularExpression(_) => "regex",
        _ => "other",
    }
}
