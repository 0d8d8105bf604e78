//! Mock backends for testing.
//!
//! In-memory clients that return canned results and record every statement or
//! operation that reaches them.

use super::{
    ColumnInfo, DocumentClient, DocumentModification, RelationalClient, Row, SchemaSnapshot,
    TabularResult, Value,
};
use crate::error::{BridgeError, Result};
use async_trait::async_trait;
use mongodb::bson::Document;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// A mock relational client with canned results.
#[derive(Debug, Clone, Default)]
pub struct MockRelationalClient {
    schema: SchemaSnapshot,
    rows: Option<TabularResult>,
    affected: u64,
    failure: Option<String>,
    delay: Option<Duration>,
    executed: Arc<Mutex<Vec<String>>>,
}

impl MockRelationalClient {
    /// Creates a mock with an empty schema.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the schema returned by introspection.
    pub fn with_schema(mut self, schema: SchemaSnapshot) -> Self {
        self.schema = schema;
        self
    }

    /// Sets the rows returned for every row-returning statement.
    pub fn with_rows(mut self, columns: Vec<ColumnInfo>, rows: Vec<Row>) -> Self {
        self.rows = Some(TabularResult::with_data(columns, rows));
        self
    }

    /// Sets the affected-row count returned for modifications.
    pub fn with_affected(mut self, affected: u64) -> Self {
        self.affected = affected;
        self
    }

    /// Makes every statement fail with the given backend message.
    pub fn failing(mut self, message: impl Into<String>) -> Self {
        self.failure = Some(message.into());
        self
    }

    /// Delays every statement, simulating a slow server.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Returns every statement that reached the backend, in order.
    pub fn executed(&self) -> Vec<String> {
        self.executed
            .lock()
            .map(|log| log.clone())
            .unwrap_or_default()
    }

    async fn record(&self, sql: &str) -> Result<()> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if let Ok(mut log) = self.executed.lock() {
            log.push(sql.to_string());
        }
        match &self.failure {
            Some(message) => Err(BridgeError::execution(message.clone())),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl RelationalClient for MockRelationalClient {
    async fn introspect_schema(&self) -> Result<SchemaSnapshot> {
        Ok(self.schema.clone())
    }

    async fn fetch_rows(&self, sql: &str) -> Result<TabularResult> {
        self.record(sql).await?;
        Ok(self.rows.clone().unwrap_or_else(|| {
            TabularResult::with_data(
                vec![ColumnInfo::new("result", "VARCHAR")],
                vec![vec![Value::String(format!("Mock result for: {sql}"))]],
            )
        }))
    }

    async fn execute_statement(&self, sql: &str) -> Result<u64> {
        self.record(sql).await?;
        Ok(self.affected)
    }

    async fn close(&self) -> Result<()> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        Ok(())
    }
}

/// A mock document client with canned results.
#[derive(Debug, Clone, Default)]
pub struct MockDocumentClient {
    schema: SchemaSnapshot,
    documents: Vec<Document>,
    count: u64,
    failure: Option<String>,
    calls: Arc<Mutex<Vec<String>>>,
}

impl MockDocumentClient {
    /// Creates a mock with an empty schema.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the schema returned by introspection.
    pub fn with_schema(mut self, schema: SchemaSnapshot) -> Self {
        self.schema = schema;
        self
    }

    /// Sets the documents returned by every aggregation.
    pub fn with_documents(mut self, documents: Vec<Document>) -> Self {
        self.documents = documents;
        self
    }

    /// Sets the count returned by every modification.
    pub fn with_count(mut self, count: u64) -> Self {
        self.count = count;
        self
    }

    /// Makes every operation fail with the given backend message.
    pub fn failing(mut self, message: impl Into<String>) -> Self {
        self.failure = Some(message.into());
        self
    }

    /// Returns a description of every call that reached the backend,
    /// e.g. `"aggregate books (2 stages)"` or `"deleteOne books"`.
    pub fn calls(&self) -> Vec<String> {
        self.calls
            .lock()
            .map(|log| log.clone())
            .unwrap_or_default()
    }

    fn record(&self, call: String) -> Result<()> {
        if let Ok(mut log) = self.calls.lock() {
            log.push(call);
        }
        match &self.failure {
            Some(message) => Err(BridgeError::execution(message.clone())),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl DocumentClient for MockDocumentClient {
    async fn introspect_schema(&self) -> Result<SchemaSnapshot> {
        Ok(self.schema.clone())
    }

    async fn aggregate(&self, collection: &str, pipeline: Vec<Document>) -> Result<Vec<Document>> {
        self.record(format!("aggregate {collection} ({} stages)", pipeline.len()))?;
        Ok(self.documents.clone())
    }

    async fn modify(&self, modification: DocumentModification) -> Result<u64> {
        self.record(format!(
            "{} {}",
            modification.operation(),
            modification.collection()
        ))?;
        Ok(self.count)
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mongodb::bson::doc;

    #[tokio::test]
    async fn test_mock_relational_records_statements() {
        let client = MockRelationalClient::new().with_affected(2);

        let result = client.fetch_rows("SELECT 1").await.unwrap();
        assert_eq!(result.rows.len(), 1);

        let affected = client
            .execute_statement("DELETE FROM tracks WHERE id = 1")
            .await
            .unwrap();
        assert_eq!(affected, 2);

        assert_eq!(
            client.executed(),
            vec!["SELECT 1", "DELETE FROM tracks WHERE id = 1"]
        );
    }

    #[tokio::test]
    async fn test_mock_relational_failure() {
        let client = MockRelationalClient::new().failing("Duplicate entry");
        let err = client.execute_statement("INSERT INTO t VALUES (1)").await;
        assert!(matches!(err, Err(BridgeError::Execution(_))));
    }

    #[tokio::test]
    async fn test_mock_document_records_calls() {
        let client = MockDocumentClient::new().with_count(1);
        let modification = DocumentModification::DeleteOne {
            collection: "books".to_string(),
            filter: doc! { "isbn": "12345" },
        };

        assert_eq!(client.modify(modification).await.unwrap(), 1);
        client
            .aggregate("books", vec![doc! { "$limit": 1 }])
            .await
            .unwrap();

        assert_eq!(
            client.calls(),
            vec!["deleteOne books", "aggregate books (1 stages)"]
        );
    }
}
