//! Intent-aware validation and plan construction.

use mongodb::bson::Document;
use serde_json::Value;
use tracing::warn;

use crate::db::{json_to_document, DocumentModification, DocumentOperation, SchemaSnapshot};
use crate::error::Result;
use crate::query::{
    AggregationSpec, DocumentIntent, Intent, ModificationSpec, RelationalIntent, SynthesizedQuery,
};

use super::{ModificationGate, ReadGate, StageAllowList, ValidationError};

/// What the executor will run, fully typed.
#[derive(Debug, Clone, PartialEq)]
pub enum ExecutionPlan {
    /// Row-returning relational statement.
    Fetch(String),
    /// Relational INSERT, UPDATE or DELETE.
    Modify(String),
    Aggregate {
        collection: String,
        pipeline: Vec<Document>,
    },
    ModifyDocuments(DocumentModification),
    /// Pass-through text answer.
    Answer(String),
}

/// A synthesized query that passed validation, with its execution plan.
#[derive(Debug, Clone)]
pub struct ValidatedQuery {
    query: SynthesizedQuery,
    intent: Intent,
    plan: ExecutionPlan,
}

impl ValidatedQuery {
    /// The query as synthesized.
    pub fn query(&self) -> &SynthesizedQuery {
        &self.query
    }

    pub fn intent(&self) -> Intent {
        self.intent
    }

    pub fn plan(&self) -> &ExecutionPlan {
        &self.plan
    }

    /// Splits into the synthesized query and its plan.
    pub fn into_parts(self) -> (SynthesizedQuery, ExecutionPlan) {
        (self.query, self.plan)
    }
}

/// Checks synthesized queries against their intent and the schema snapshot.
#[derive(Debug, Default)]
pub struct Validator {
    reads: ReadGate,
    gate: ModificationGate,
    stages: StageAllowList,
}

impl Validator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the default aggregation stage allow-list.
    pub fn with_allowed_stages(mut self, stages: StageAllowList) -> Self {
        self.stages = stages;
        self
    }

    /// Validates `query` for `intent`. Failures are never coerced into a
    /// different operation.
    pub fn validate(
        &self,
        query: SynthesizedQuery,
        intent: Intent,
        schema: &SchemaSnapshot,
    ) -> Result<ValidatedQuery> {
        match self.plan(&query, intent, schema) {
            Ok(plan) => Ok(ValidatedQuery {
                query,
                intent,
                plan,
            }),
            Err(e) => {
                warn!(intent = %intent, query = %query.representation(), error = %e, "Rejected generated query");
                Err(e.into())
            }
        }
    }

    fn plan(
        &self,
        query: &SynthesizedQuery,
        intent: Intent,
        schema: &SchemaSnapshot,
    ) -> std::result::Result<ExecutionPlan, ValidationError> {
        match (intent, query) {
            (Intent::Relational(RelationalIntent::Select), SynthesizedQuery::SqlText(sql)) => {
                if sql.trim().is_empty() {
                    return Err(ValidationError::EmptyStatement);
                }
                self.reads.check(sql)?;
                Ok(ExecutionPlan::Fetch(sql.clone()))
            }
            (Intent::Relational(RelationalIntent::Modification), SynthesizedQuery::SqlText(sql)) => {
                if sql.trim().is_empty() {
                    return Err(ValidationError::EmptyStatement);
                }
                self.gate.check(sql)?;
                Ok(ExecutionPlan::Modify(sql.clone()))
            }
            (Intent::Document(DocumentIntent::Query), SynthesizedQuery::Aggregation(spec)) => {
                self.plan_aggregation(spec, schema)
            }
            (
                Intent::Document(DocumentIntent::Modification),
                SynthesizedQuery::Modification(spec),
            ) => plan_modification(spec, schema).map(ExecutionPlan::ModifyDocuments),
            (Intent::Document(DocumentIntent::Schema), SynthesizedQuery::SchemaAnswer(text)) => {
                Ok(ExecutionPlan::Answer(text.clone()))
            }
            (intent, other) => Err(ValidationError::IntentMismatch {
                intent,
                found: other.kind_name(),
            }),
        }
    }

    fn plan_aggregation(
        &self,
        spec: &AggregationSpec,
        schema: &SchemaSnapshot,
    ) -> std::result::Result<ExecutionPlan, ValidationError> {
        if !schema.contains(&spec.collection) {
            return Err(ValidationError::UnknownCollection(spec.collection.clone()));
        }
        if spec.pipeline.is_empty() {
            return Err(ValidationError::EmptyPipeline);
        }
        self.stages.check_pipeline(&spec.pipeline, schema)?;

        let pipeline = spec
            .pipeline
            .iter()
            .enumerate()
            .map(|(position, stage)| {
                json_to_document(stage)
                    .map_err(|reason| ValidationError::MalformedStage { position, reason })
            })
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(ExecutionPlan::Aggregate {
            collection: spec.collection.clone(),
            pipeline,
        })
    }
}

fn plan_modification(
    spec: &ModificationSpec,
    schema: &SchemaSnapshot,
) -> std::result::Result<DocumentModification, ValidationError> {
    let operation = DocumentOperation::parse(&spec.operation)
        .ok_or_else(|| ValidationError::UnknownOperation(spec.operation.clone()))?;

    // Inserts may create a collection; updates and deletes need an existing one.
    if !operation.requires_data() && !schema.contains(&spec.collection) {
        return Err(ValidationError::UnknownCollection(spec.collection.clone()));
    }

    let collection = spec.collection.clone();
    let required = |field: &'static str, value: &Option<Value>| {
        value
            .clone()
            .ok_or(ValidationError::MissingField { operation, field })
    };

    let modification = match operation {
        DocumentOperation::InsertOne => DocumentModification::InsertOne {
            collection,
            document: to_document("data", &required("data", &spec.data)?)?,
        },
        DocumentOperation::InsertMany => {
            let data = required("data", &spec.data)?;
            let items = data.as_array().ok_or_else(|| ValidationError::InvalidField {
                field: "data",
                reason: "insertMany expects an array of objects".to_string(),
            })?;
            if items.is_empty() {
                return Err(ValidationError::InvalidField {
                    field: "data",
                    reason: "insertMany needs at least one document".to_string(),
                });
            }
            let documents = items
                .iter()
                .map(|item| to_document("data", item))
                .collect::<std::result::Result<Vec<_>, _>>()?;
            DocumentModification::InsertMany {
                collection,
                documents,
            }
        }
        DocumentOperation::UpdateOne | DocumentOperation::UpdateMany => {
            let filter = to_document("filter", &required("filter", &spec.filter)?)?;
            let update = to_document("update", &required("update", &spec.update)?)?;
            if update.is_empty() {
                return Err(ValidationError::InvalidField {
                    field: "update",
                    reason: "the update document is empty".to_string(),
                });
            }
            if operation == DocumentOperation::UpdateOne {
                DocumentModification::UpdateOne {
                    collection,
                    filter,
                    update,
                }
            } else {
                DocumentModification::UpdateMany {
                    collection,
                    filter,
                    update,
                }
            }
        }
        DocumentOperation::DeleteOne => DocumentModification::DeleteOne {
            collection,
            filter: to_document("filter", &required("filter", &spec.filter)?)?,
        },
        DocumentOperation::DeleteMany => DocumentModification::DeleteMany {
            collection,
            filter: to_document("filter", &required("filter", &spec.filter)?)?,
        },
    };

    Ok(modification)
}

fn to_document(
    field: &'static str,
    value: &Value,
) -> std::result::Result<Document, ValidationError> {
    json_to_document(value).map_err(|reason| ValidationError::InvalidField { field, reason })
}
