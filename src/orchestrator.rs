//! Bounded request orchestration.
//!
//! [`Orchestrator::run_query`] is the single entry point. Each request runs
//! classify, synthesize, validate, execute and normalize on its own spawned
//! task, and the caller waits at most the configured budget.
//!
//! Timeouts detach the task rather than abort it: a statement already sent
//! to a backend may still commit or roll back after the caller has been told
//! the request timed out.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{error, info, info_span, warn, Instrument};

use crate::config::{DocumentConfig, RelationalConfig};
use crate::db::{self, BackendTarget, DocumentClient, RelationalClient, SchemaSnapshot};
use crate::error::{BridgeError, ErrorKind, Result};
use crate::llm::Generator;
use crate::query::normalizer::{self, NormalizedOutput, FALLBACK_REPRESENTATION};
use crate::query::{Backend, Classifier, Executor, Synthesizer};
use crate::safety::Validator;

/// Default wall-clock budget per request.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

static REQUEST_IDS: AtomicU64 = AtomicU64::new(1);

/// A relational connection and the schema snapshot taken when it was opened.
pub struct RelationalHandler {
    client: Arc<dyn RelationalClient>,
    snapshot: Arc<SchemaSnapshot>,
}

impl RelationalHandler {
    /// Wraps a client, introspecting its schema once.
    pub async fn new(client: Arc<dyn RelationalClient>) -> Result<Self> {
        let snapshot = client.introspect_schema().await?;
        info!(
            database = %snapshot.database,
            tables = snapshot.entities.len(),
            "Relational schema loaded"
        );
        Ok(Self::with_snapshot(client, snapshot))
    }

    /// Connects and introspects.
    pub async fn connect(config: &RelationalConfig) -> Result<Self> {
        Self::new(db::connect_relational(config).await?).await
    }

    /// Wraps a client with an existing snapshot.
    pub fn with_snapshot(client: Arc<dyn RelationalClient>, snapshot: SchemaSnapshot) -> Self {
        Self {
            client,
            snapshot: Arc::new(snapshot),
        }
    }

    pub fn snapshot(&self) -> &SchemaSnapshot {
        &self.snapshot
    }
}

/// A document-store connection and the schema snapshot taken when it was opened.
pub struct DocumentHandler {
    client: Arc<dyn DocumentClient>,
    snapshot: Arc<SchemaSnapshot>,
}

impl DocumentHandler {
    /// Wraps a client, sampling its collections once.
    pub async fn new(client: Arc<dyn DocumentClient>) -> Result<Self> {
        let snapshot = client.introspect_schema().await?;
        info!(
            database = %snapshot.database,
            collections = snapshot.entities.len(),
            "Document schema loaded"
        );
        Ok(Self::with_snapshot(client, snapshot))
    }

    /// Connects and introspects.
    pub async fn connect(config: &DocumentConfig) -> Result<Self> {
        Self::new(db::connect_document(config).await?).await
    }

    /// Wraps a client with an existing snapshot.
    pub fn with_snapshot(client: Arc<dyn DocumentClient>, snapshot: SchemaSnapshot) -> Self {
        Self {
            client,
            snapshot: Arc::new(snapshot),
        }
    }

    pub fn snapshot(&self) -> &SchemaSnapshot {
        &self.snapshot
    }
}

/// How a request ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "kind", rename_all = "snake_case")]
pub enum OutcomeStatus {
    Completed,
    Failed(ErrorKind),
    TimedOut,
}

/// The renderable pair returned for every request, successful or not.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrchestrationOutcome {
    pub query_representation: String,
    pub display_result: String,
    pub status: OutcomeStatus,
}

impl OrchestrationOutcome {
    fn completed(output: NormalizedOutput) -> Self {
        Self {
            query_representation: output.query_representation,
            display_result: output.display_result,
            status: OutcomeStatus::Completed,
        }
    }

    fn failed(error: &BridgeError, representation: Option<String>) -> Self {
        let status = match error {
            BridgeError::TimedOut(_) => OutcomeStatus::TimedOut,
            other => OutcomeStatus::Failed(other.kind()),
        };
        Self {
            query_representation: representation
                .unwrap_or_else(|| FALLBACK_REPRESENTATION.to_string()),
            display_result: error.user_message(),
            status,
        }
    }

    /// Returns true if the request completed.
    pub fn is_success(&self) -> bool {
        self.status == OutcomeStatus::Completed
    }
}

/// Runs natural-language requests against the configured backends.
///
/// Cheap to clone; clones share the generator, handlers and validator.
#[derive(Clone)]
pub struct Orchestrator {
    classifier: Classifier,
    synthesizer: Synthesizer,
    validator: Arc<Validator>,
    relational: Option<Arc<RelationalHandler>>,
    document: Option<Arc<DocumentHandler>>,
    timeout: Duration,
}

impl Orchestrator {
    /// Creates an orchestrator with no backends attached.
    pub fn new(generator: Arc<dyn Generator>) -> Self {
        Self {
            classifier: Classifier::new(Arc::clone(&generator)),
            synthesizer: Synthesizer::new(generator),
            validator: Arc::new(Validator::new()),
            relational: None,
            document: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_relational(mut self, handler: RelationalHandler) -> Self {
        self.relational = Some(Arc::new(handler));
        self
    }

    pub fn with_document(mut self, handler: DocumentHandler) -> Self {
        self.document = Some(Arc::new(handler));
        self
    }

    /// Sets the wall-clock budget per request.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_validator(mut self, validator: Validator) -> Self {
        self.validator = Arc::new(validator);
        self
    }

    /// Returns true if a handler is attached for `target`.
    pub fn has_backend(&self, target: BackendTarget) -> bool {
        match target {
            BackendTarget::Relational => self.relational.is_some(),
            BackendTarget::Document => self.document.is_some(),
        }
    }

    /// Runs one instruction and always returns a renderable outcome.
    ///
    /// Returns within the budget (plus scheduling slack). On timeout the
    /// in-flight work is detached, not cancelled.
    pub async fn run_query(&self, instruction: &str, target: BackendTarget) -> OrchestrationOutcome {
        let request_id = REQUEST_IDS.fetch_add(1, Ordering::Relaxed);
        let span = info_span!("request", id = request_id, backend = %target);

        let progress: Arc<Mutex<Option<String>>> = Arc::default();
        let this = self.clone();
        let task_progress = Arc::clone(&progress);
        let instruction_owned = instruction.to_string();

        let handle = tokio::spawn(
            async move {
                this.run_pipeline(&instruction_owned, target, &task_progress)
                    .await
            }
            .instrument(span.clone()),
        );

        let last_representation = || progress.lock().ok().and_then(|p| p.clone());
        let budget = self.timeout;

        async move {
            match tokio::time::timeout(budget, handle).await {
                Ok(Ok(Ok(output))) => {
                    info!("Request completed");
                    OrchestrationOutcome::completed(output)
                }
                Ok(Ok(Err(e))) => {
                    warn!(category = e.category(), error = %e, "Request failed");
                    OrchestrationOutcome::failed(&e, last_representation())
                }
                Ok(Err(join_error)) => {
                    error!(error = %join_error, "Request task aborted");
                    let e = BridgeError::internal(format!("request task failed: {join_error}"));
                    OrchestrationOutcome::failed(&e, last_representation())
                }
                Err(_) => {
                    warn!(budget_secs = budget.as_secs_f64(), "Request timed out; detaching");
                    OrchestrationOutcome::failed(&BridgeError::TimedOut(budget), last_representation())
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn run_pipeline(
        &self,
        instruction: &str,
        target: BackendTarget,
        progress: &Mutex<Option<String>>,
    ) -> Result<NormalizedOutput> {
        let (snapshot, backend) = match target {
            BackendTarget::Relational => {
                let handler = self.relational.as_deref().ok_or_else(|| not_configured(target))?;
                (&*handler.snapshot, Backend::Relational(handler.client.as_ref()))
            }
            BackendTarget::Document => {
                let handler = self.document.as_deref().ok_or_else(|| not_configured(target))?;
                (&*handler.snapshot, Backend::Document(handler.client.as_ref()))
            }
        };

        let intent = self.classifier.classify(instruction, target).await?;
        let query = self.synthesizer.synthesize(instruction, snapshot, intent).await?;
        if let Ok(mut slot) = progress.lock() {
            *slot = Some(query.representation());
        }

        let validated = self.validator.validate(query, intent, snapshot)?;
        let query = validated.query().clone();
        let result = Executor::new(backend).execute(validated).await?;

        Ok(normalizer::normalize(&query, &result))
    }

    /// Closes every attached backend.
    pub async fn close(&self) -> Result<()> {
        if let Some(handler) = &self.relational {
            handler.client.close().await?;
        }
        if let Some(handler) = &self.document {
            handler.client.close().await?;
        }
        Ok(())
    }

    /// Closes the backends, giving up after `grace`.
    ///
    /// A request that timed out may still hold a pooled connection, in which
    /// case `close` waits for it to return. Past the grace period the
    /// connections are left to the process exit.
    pub async fn shutdown(&self, grace: Duration) -> Result<()> {
        match tokio::time::timeout(grace, self.close()).await {
            Ok(result) => result,
            Err(_) => {
                warn!(grace_ms = grace.as_millis() as u64, "Backends did not close in time");
                Ok(())
            }
        }
    }
}

fn not_configured(target: BackendTarget) -> BridgeError {
    BridgeError::config(format!(
        "The {} ({}) backend is not configured.",
        target,
        target.engine_name()
    ))
}
