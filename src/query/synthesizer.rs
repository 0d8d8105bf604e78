//! Query synthesis.
//!
//! Turns an instruction plus the schema snapshot into one structured
//! [`SynthesizedQuery`]. Generator output is untrusted: a variant is either
//! built completely from well-formed output or not at all.

use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

use crate::db::{json_type_name, SchemaSnapshot};
use crate::error::{BridgeError, Result};
use crate::llm::{parser, prompt, Generator};

use super::{
    AggregationSpec, DocumentIntent, Intent, ModificationSpec, RelationalIntent, SynthesizedQuery,
};

/// Produces a single canonical representation per request; no refinement loop.
#[derive(Clone)]
pub struct Synthesizer {
    generator: Arc<dyn Generator>,
}

impl Synthesizer {
    pub fn new(generator: Arc<dyn Generator>) -> Self {
        Self { generator }
    }

    /// Synthesizes the query for a classified instruction.
    pub async fn synthesize(
        &self,
        instruction: &str,
        schema: &SchemaSnapshot,
        intent: Intent,
    ) -> Result<SynthesizedQuery> {
        let prompt = match intent {
            Intent::Relational(RelationalIntent::Select) => {
                prompt::relational_select(schema, instruction)
            }
            Intent::Relational(RelationalIntent::Modification) => {
                prompt::relational_modification(schema, instruction)
            }
            Intent::Document(DocumentIntent::Query) => prompt::document_query(schema, instruction),
            Intent::Document(DocumentIntent::Modification) => {
                prompt::document_modification(schema, instruction)
            }
            Intent::Document(DocumentIntent::Schema) => {
                prompt::document_schema_question(schema, instruction)
            }
        };

        let start = Instant::now();
        let response = self.generator.generate(&prompt).await?;
        debug!(
            intent = %intent,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Synthesis response received"
        );

        let query = match intent {
            Intent::Relational(_) => SynthesizedQuery::SqlText(parser::strip_fences(&response)),
            Intent::Document(DocumentIntent::Query) => parse_aggregation(&response)?,
            Intent::Document(DocumentIntent::Modification) => parse_modification(&response)?,
            Intent::Document(DocumentIntent::Schema) => {
                let answer = response.trim();
                if answer.is_empty() {
                    return Err(BridgeError::synthesis("the schema answer was empty"));
                }
                SynthesizedQuery::SchemaAnswer(answer.to_string())
            }
        };

        info!(intent = %intent, query = %query.representation(), "Generated {}", query.kind_name());
        Ok(query)
    }
}

/// Parses a `{"collection": ..., "aggregate": [...]}` response.
pub fn parse_aggregation(response: &str) -> Result<SynthesizedQuery> {
    let mut object = parser::parse_json_object(response)?;
    let collection = take_string(&mut object, "collection")?;
    let pipeline = match take_required(&mut object, "aggregate")? {
        Value::Array(stages) => stages,
        other => {
            return Err(BridgeError::synthesis(format!(
                "\"aggregate\" must be an array of stages, found {}",
                json_type_name(&other)
            )))
        }
    };

    Ok(SynthesizedQuery::Aggregation(AggregationSpec {
        collection,
        pipeline,
    }))
}

/// Parses an `{"operation": ..., "collection": ..., ...}` response.
///
/// Only key presence is checked here; whether the operation is known and has
/// the sub-fields it needs is decided by the validator.
pub fn parse_modification(response: &str) -> Result<SynthesizedQuery> {
    let mut object = parser::parse_json_object(response)?;
    let operation = take_string(&mut object, "operation")?;
    let collection = take_string(&mut object, "collection")?;

    Ok(SynthesizedQuery::Modification(ModificationSpec {
        operation,
        collection,
        filter: take_optional(&mut object, "filter"),
        update: take_optional(&mut object, "update"),
        data: take_optional(&mut object, "data"),
    }))
}

fn take_required(object: &mut Map<String, Value>, key: &str) -> Result<Value> {
    object
        .remove(key)
        .ok_or_else(|| BridgeError::synthesis(format!("missing required key \"{key}\"")))
}

fn take_string(object: &mut Map<String, Value>, key: &str) -> Result<String> {
    match take_required(object, key)? {
        Value::String(s) if !s.trim().is_empty() => Ok(s),
        Value::String(_) => Err(BridgeError::synthesis(format!("\"{key}\" is empty"))),
        other => Err(BridgeError::synthesis(format!(
            "\"{key}\" must be a string, found {}",
            json_type_name(&other)
        ))),
    }
}

fn take_optional(object: &mut Map<String, Value>, key: &str) -> Option<Value> {
    object.remove(key).filter(|v| !v.is_null())
}
