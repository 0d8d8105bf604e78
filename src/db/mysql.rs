//! MySQL database client implementation.
//!
//! Provides the `MySqlClient` struct that implements the `RelationalClient`
//! trait using sqlx.

use crate::config::RelationalConfig;
use crate::db::{
    ColumnInfo, Entity, Field, ForeignKey, RelationalClient, Row, SchemaSnapshot, TabularResult,
    Value,
};
use crate::error::{BridgeError, Result};
use async_trait::async_trait;
use sqlx::mysql::{MySqlPool, MySqlPoolOptions, MySqlRow};
use sqlx::{Column as SqlxColumn, Executor, Row as SqlxRow, TypeInfo};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Maximum number of connection retry attempts.
const MAX_RETRY_ATTEMPTS: u32 = 3;

/// Base delay between retry attempts (doubles each retry).
const RETRY_BASE_DELAY_MS: u64 = 500;

/// MySQL database client.
#[derive(Debug)]
pub struct MySqlClient {
    pool: MySqlPool,
    max_rows: usize,
}

impl MySqlClient {
    /// Creates a client from an existing connection pool.
    pub fn from_pool(pool: MySqlPool, max_rows: usize) -> Self {
        Self { pool, max_rows }
    }

    /// Connects to the configured server, retrying transient failures.
    pub async fn connect(config: &RelationalConfig) -> Result<Self> {
        let conn_str = config.to_connection_string()?;

        let mut last_error = None;
        let mut delay = Duration::from_millis(RETRY_BASE_DELAY_MS);

        for attempt in 1..=MAX_RETRY_ATTEMPTS {
            debug!("Connection attempt {} of {}", attempt, MAX_RETRY_ATTEMPTS);

            let result = MySqlPoolOptions::new()
                .max_connections(config.max_connections)
                .acquire_timeout(Duration::from_secs(10))
                .connect(&conn_str)
                .await;

            match result {
                Ok(pool) => {
                    debug!("Connected to {}", config.display_string());
                    return Ok(Self::from_pool(pool, config.max_rows));
                }
                Err(e) => {
                    let retry = attempt < MAX_RETRY_ATTEMPTS && is_transient_error(&e);
                    last_error = Some(e);

                    if !retry {
                        break;
                    }
                    warn!(
                        "Connection attempt {} failed (transient error), retrying in {:?}",
                        attempt, delay
                    );
                    tokio::time::sleep(delay).await;
                    delay *= 2;
                }
            }
        }

        match last_error {
            Some(e) => Err(map_connection_error(e, config)),
            None => Err(BridgeError::internal("no connection attempt was made")),
        }
    }
}

#[async_trait]
impl RelationalClient for MySqlClient {
    async fn introspect_schema(&self) -> Result<SchemaSnapshot> {
        let database: Option<String> = sqlx::query_scalar("SELECT DATABASE()")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| BridgeError::connection(format!("Failed to read database name: {e}")))?;

        let mut snapshot = SchemaSnapshot::new(database.unwrap_or_default());
        snapshot.entities = self.fetch_tables().await?;
        snapshot.foreign_keys = self.fetch_foreign_keys().await?;
        Ok(snapshot)
    }

    async fn fetch_rows(&self, sql: &str) -> Result<TabularResult> {
        let start = Instant::now();
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| BridgeError::execution(format_query_error(e)))?;

        let rows = match sqlx::query(sql).fetch_all(&mut *tx).await {
            Ok(rows) => rows,
            Err(e) => {
                rollback(tx).await;
                return Err(BridgeError::execution(format_query_error(e)));
            }
        };

        // An empty result carries no column metadata; ask the server to describe it.
        let columns: Vec<ColumnInfo> = match rows.first() {
            Some(first) => column_info(first),
            None => (&mut *tx)
                .describe(sql)
                .await
                .map(|described| {
                    described
                        .columns()
                        .iter()
                        .map(|col| ColumnInfo::new(col.name(), col.type_info().name()))
                        .collect()
                })
                .unwrap_or_default(),
        };

        tx.commit()
            .await
            .map_err(|e| BridgeError::execution(format_query_error(e)))?;

        let converted: Vec<Row> = rows.iter().map(convert_row).collect();
        let result = TabularResult::with_data(columns, converted)
            .with_execution_time(start.elapsed())
            .truncate(self.max_rows);

        if result.was_truncated {
            warn!(
                "Query returned {} rows, truncating to {} rows",
                result.total_rows, self.max_rows
            );
        }
        Ok(result)
    }

    async fn execute_statement(&self, sql: &str) -> Result<u64> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| BridgeError::execution(format_query_error(e)))?;

        match sqlx::query(sql).execute(&mut *tx).await {
            Ok(done) => {
                tx.commit()
                    .await
                    .map_err(|e| BridgeError::execution(format_query_error(e)))?;
                Ok(done.rows_affected())
            }
            Err(e) => {
                rollback(tx).await;
                Err(BridgeError::execution(format_query_error(e)))
            }
        }
    }

    async fn close(&self) -> Result<()> {
        self.pool.close().await;
        Ok(())
    }
}

impl MySqlClient {
    /// Fetches all base tables of the current database with their columns.
    async fn fetch_tables(&self) -> Result<Vec<Entity>> {
        let table_names: Vec<String> = sqlx::query_scalar(
            r#"
            SELECT CAST(table_name AS CHAR)
            FROM information_schema.tables
            WHERE table_schema = DATABASE() AND table_type = 'BASE TABLE'
            ORDER BY table_name
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| BridgeError::connection(format!("Failed to fetch tables: {e}")))?;

        let mut tables = Vec::with_capacity(table_names.len());
        for table_name in table_names {
            let fields = self.fetch_columns(&table_name).await?;
            let primary_key = self.fetch_primary_key(&table_name).await?;
            tables.push(Entity {
                name: table_name,
                fields,
                primary_key,
            });
        }
        Ok(tables)
    }

    /// Fetches columns for a specific table, in ordinal order.
    async fn fetch_columns(&self, table_name: &str) -> Result<Vec<Field>> {
        let rows: Vec<(String, String, String)> = sqlx::query_as(
            r#"
            SELECT
                CAST(column_name AS CHAR),
                CAST(column_type AS CHAR),
                CAST(is_nullable AS CHAR)
            FROM information_schema.columns
            WHERE table_schema = DATABASE() AND table_name = ?
            ORDER BY ordinal_position
            "#,
        )
        .bind(table_name)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            BridgeError::connection(format!("Failed to fetch columns for {table_name}: {e}"))
        })?;

        Ok(rows
            .into_iter()
            .map(|(name, data_type, is_nullable)| {
                Field::new(name, data_type).nullable(is_nullable == "YES")
            })
            .collect())
    }

    /// Fetches primary key columns for a specific table.
    async fn fetch_primary_key(&self, table_name: &str) -> Result<Vec<String>> {
        sqlx::query_scalar(
            r#"
            SELECT CAST(column_name AS CHAR)
            FROM information_schema.key_column_usage
            WHERE table_schema = DATABASE()
                AND table_name = ?
                AND constraint_name = 'PRIMARY'
            ORDER BY ordinal_position
            "#,
        )
        .bind(table_name)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            BridgeError::connection(format!(
                "Failed to fetch primary key for {table_name}: {e}"
            ))
        })
    }

    /// Fetches all foreign key relationships of the current database.
    async fn fetch_foreign_keys(&self) -> Result<Vec<ForeignKey>> {
        let rows: Vec<(String, String, String, String)> = sqlx::query_as(
            r#"
            SELECT
                CAST(table_name AS CHAR),
                CAST(column_name AS CHAR),
                CAST(referenced_table_name AS CHAR),
                CAST(referenced_column_name AS CHAR)
            FROM information_schema.key_column_usage
            WHERE table_schema = DATABASE()
                AND referenced_table_name IS NOT NULL
            ORDER BY table_name, ordinal_position
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| BridgeError::connection(format!("Failed to fetch foreign keys: {e}")))?;

        Ok(rows
            .into_iter()
            .map(|(from_table, from_column, to_table, to_column)| {
                ForeignKey::new(from_table, from_column, to_table, to_column)
            })
            .collect())
    }
}

async fn rollback(tx: sqlx::Transaction<'_, sqlx::MySql>) {
    if let Err(e) = tx.rollback().await {
        warn!("Rollback failed: {}", e);
    }
}

fn column_info(row: &MySqlRow) -> Vec<ColumnInfo> {
    row.columns()
        .iter()
        .map(|col| ColumnInfo::new(col.name(), col.type_info().name()))
        .collect()
}

/// Converts a sqlx MySqlRow to our Row type.
fn convert_row(row: &MySqlRow) -> Row {
    row.columns()
        .iter()
        .enumerate()
        .map(|(i, col)| convert_value(row, i, col.type_info().name()))
        .collect()
}

/// Converts a single column value, keyed on the driver's type name.
fn convert_value(row: &MySqlRow, index: usize, type_name: &str) -> Value {
    let upper = type_name.to_uppercase();

    if upper.ends_with("UNSIGNED") {
        return row
            .try_get::<Option<u64>, _>(index)
            .ok()
            .flatten()
            .map(|v| match i64::try_from(v) {
                Ok(signed) => Value::Int(signed),
                Err(_) => Value::String(v.to_string()),
            })
            .unwrap_or(Value::Null);
    }

    match upper.as_str() {
        "BOOLEAN" => row
            .try_get::<Option<bool>, _>(index)
            .ok()
            .flatten()
            .map(Value::Bool)
            .unwrap_or(Value::Null),

        "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "BIGINT" => row
            .try_get::<Option<i64>, _>(index)
            .ok()
            .flatten()
            .map(Value::Int)
            .unwrap_or(Value::Null),

        "FLOAT" => row
            .try_get::<Option<f32>, _>(index)
            .ok()
            .flatten()
            .map(|v| Value::Float(v as f64))
            .unwrap_or(Value::Null),

        "DOUBLE" => row
            .try_get::<Option<f64>, _>(index)
            .ok()
            .flatten()
            .map(Value::Float)
            .unwrap_or(Value::Null),

        "DATE" => row
            .try_get::<Option<chrono::NaiveDate>, _>(index)
            .ok()
            .flatten()
            .map(|v| Value::String(v.to_string()))
            .unwrap_or(Value::Null),

        "DATETIME" | "TIMESTAMP" => row
            .try_get::<Option<chrono::NaiveDateTime>, _>(index)
            .ok()
            .flatten()
            .map(|v| Value::String(v.to_string()))
            .unwrap_or(Value::Null),

        "TIME" => row
            .try_get::<Option<chrono::NaiveTime>, _>(index)
            .ok()
            .flatten()
            .map(|v| Value::String(v.to_string()))
            .unwrap_or(Value::Null),

        "BLOB" | "TINYBLOB" | "MEDIUMBLOB" | "LONGBLOB" | "BINARY" | "VARBINARY" | "BIT" => row
            .try_get::<Option<Vec<u8>>, _>(index)
            .ok()
            .flatten()
            .map(Value::Bytes)
            .unwrap_or(Value::Null),

        // DECIMAL travels as text in both protocols, so read it unchecked.
        "DECIMAL" => row
            .try_get_unchecked::<Option<String>, _>(index)
            .ok()
            .flatten()
            .map(Value::String)
            .unwrap_or(Value::Null),

        _ => row
            .try_get::<Option<String>, _>(index)
            .ok()
            .flatten()
            .map(Value::String)
            .unwrap_or(Value::Null),
    }
}

/// Determines if an error is transient and worth retrying.
fn is_transient_error(error: &sqlx::Error) -> bool {
    let error_str = error.to_string().to_lowercase();

    if error_str.contains("access denied") || error_str.contains("unknown database") {
        return false;
    }

    error_str.contains("connection refused")
        || error_str.contains("timed out")
        || error_str.contains("timeout")
        || error_str.contains("temporarily unavailable")
        || error_str.contains("connection reset")
        || error_str.contains("broken pipe")
}

/// Maps sqlx connection errors to user-friendly messages.
fn map_connection_error(error: sqlx::Error, config: &RelationalConfig) -> BridgeError {
    let host = config.host.as_deref().unwrap_or("localhost");
    let port = config.port;
    let user = config.user.as_deref().unwrap_or("unknown");
    let database = config.database.as_deref().unwrap_or("unknown");

    let error_str = error.to_string().to_lowercase();

    if error_str.contains("connection refused") {
        BridgeError::connection(format!(
            "Cannot connect to {host}:{port}. Check that the server is running."
        ))
    } else if error_str.contains("access denied") {
        BridgeError::connection(format!(
            "Authentication failed for user '{user}'. Check your credentials."
        ))
    } else if error_str.contains("unknown database") {
        BridgeError::connection(format!("Database '{database}' does not exist."))
    } else if error_str.contains("timed out") || error_str.contains("timeout") {
        BridgeError::connection(format!(
            "Connection to {host}:{port} timed out. The server may be overloaded or unreachable."
        ))
    } else {
        BridgeError::connection(error.to_string())
    }
}

/// Formats a statement error, keeping the server's code when there is one.
fn format_query_error(error: sqlx::Error) -> String {
    match error.as_database_error() {
        Some(db_error) => match db_error.code() {
            Some(code) => format!("{} (code {})", db_error.message(), code),
            None => db_error.message().to_string(),
        },
        None => error.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // These tests need a running MySQL server and are skipped unless
    // MYSQL_TEST_URL is set.

    async fn get_test_client() -> Option<MySqlClient> {
        let url = std::env::var("MYSQL_TEST_URL").ok()?;
        let config = RelationalConfig::from_connection_string(&url).ok()?;
        MySqlClient::connect(&config).await.ok()
    }

    #[tokio::test]
    async fn test_fetch_rows_reports_columns_in_order() {
        let Some(client) = get_test_client().await else {
            eprintln!("Skipping test: MYSQL_TEST_URL not set");
            return;
        };

        let result = client
            .fetch_rows("SELECT 1 AS num, 'hello' AS greeting")
            .await
            .unwrap();

        assert_eq!(result.column_names(), vec!["num", "greeting"]);
        assert_eq!(result.rows.len(), 1);
        assert_eq!(result.rows[0][1], Value::String("hello".to_string()));

        client.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_execute_statement_error_is_execution_error() {
        let Some(client) = get_test_client().await else {
            eprintln!("Skipping test: MYSQL_TEST_URL not set");
            return;
        };

        let err = client
            .execute_statement("DELETE FROM nonexistent_table_xyz")
            .await
            .unwrap_err();
        assert!(matches!(err, BridgeError::Execution(_)));

        client.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_connection_error_is_connection_error() {
        let config = RelationalConfig {
            host: Some("nonexistent.invalid.host".to_string()),
            database: Some("Music".to_string()),
            ..RelationalConfig::default()
        };

        let err = MySqlClient::connect(&config).await.unwrap_err();
        assert!(matches!(err, BridgeError::Connection(_)));
    }

    #[test]
    fn test_transient_error_detection() {
        let err = sqlx::Error::Protocol("connection refused by peer".to_string());
        assert!(is_transient_error(&err));

        let err = sqlx::Error::Protocol("Access denied for user 'test'".to_string());
        assert!(!is_transient_error(&err));
    }
}
