//! Query execution.
//!
//! Runs a [`ValidatedQuery`] against the backend it was validated for.
//! Relational statements run in their own transaction inside the client;
//! document operations rely on the store's per-document atomicity.

use std::time::Instant;
use tracing::{debug, info};

use crate::db::{DocumentClient, RelationalClient};
use crate::error::{BridgeError, Result};
use crate::safety::{ExecutionPlan, ValidatedQuery};

use super::ExecutionResult;

/// The backend a request executes against.
#[derive(Clone, Copy)]
pub enum Backend<'a> {
    Relational(&'a dyn RelationalClient),
    Document(&'a dyn DocumentClient),
}

/// Executes validated queries.
pub struct Executor<'a> {
    backend: Backend<'a>,
}

impl<'a> Executor<'a> {
    pub fn new(backend: Backend<'a>) -> Self {
        Self { backend }
    }

    /// Executes a validated query.
    ///
    /// Backend failures surface as [`BridgeError::Execution`]; a plan that
    /// does not belong to this backend is an internal error.
    pub async fn execute(&self, query: ValidatedQuery) -> Result<ExecutionResult> {
        let intent = query.intent();
        let (_, plan) = query.into_parts();
        let start = Instant::now();

        let result = match (self.backend, plan) {
            (_, ExecutionPlan::Answer(text)) => ExecutionResult::Text(text),
            (Backend::Relational(client), ExecutionPlan::Fetch(sql)) => {
                ExecutionResult::Tabular(client.fetch_rows(&sql).await?)
            }
            (Backend::Relational(client), ExecutionPlan::Modify(sql)) => {
                ExecutionResult::Count(client.execute_statement(&sql).await?)
            }
            (Backend::Document(client), ExecutionPlan::Aggregate { collection, pipeline }) => {
                ExecutionResult::Documents(client.aggregate(&collection, pipeline).await?)
            }
            (Backend::Document(client), ExecutionPlan::ModifyDocuments(modification)) => {
                ExecutionResult::Count(client.modify(modification).await?)
            }
            (_, plan) => {
                return Err(BridgeError::internal(format!(
                    "plan {plan:?} cannot run on this backend"
                )))
            }
        };

        let elapsed = start.elapsed();
        match &result {
            ExecutionResult::Tabular(t) => {
                info!(intent = %intent, rows = t.rows.len(), elapsed_ms = elapsed.as_millis() as u64, "Query executed")
            }
            ExecutionResult::Documents(d) => {
                info!(intent = %intent, documents = d.len(), elapsed_ms = elapsed.as_millis() as u64, "Query executed")
            }
            ExecutionResult::Count(n) => {
                info!(intent = %intent, affected = n, elapsed_ms = elapsed.as_millis() as u64, "Modification executed")
            }
            ExecutionResult::Text(_) => debug!(intent = %intent, "Schema answer passed through"),
        }

        Ok(result)
    }
}
