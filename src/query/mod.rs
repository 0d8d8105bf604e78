//! The per-request query pipeline.
//!
//! Each request flows strictly through classify, synthesize, validate
//! (see [`crate::safety`]), execute and normalize. The types here are the
//! values handed from one stage to the next.

pub mod classifier;
pub mod executor;
pub mod normalizer;
pub mod synthesizer;

pub use classifier::Classifier;
pub use executor::{Backend, Executor};
pub use normalizer::{normalize, NormalizedOutput};
pub use synthesizer::Synthesizer;

use mongodb::bson::Document;
use serde_json::{Map, Value};
use std::fmt;

use crate::db::{BackendTarget, TabularResult};

/// Relational intents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationalIntent {
    Select,
    Modification,
}

/// Document intents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentIntent {
    Schema,
    Query,
    Modification,
}

/// The classified category of a request, scoped to its backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    Relational(RelationalIntent),
    Document(DocumentIntent),
}

impl Intent {
    /// All intents accepted for a backend, in prompt order.
    pub fn closed_set(target: BackendTarget) -> &'static [Intent] {
        match target {
            BackendTarget::Relational => &[
                Intent::Relational(RelationalIntent::Modification),
                Intent::Relational(RelationalIntent::Select),
            ],
            BackendTarget::Document => &[
                Intent::Document(DocumentIntent::Schema),
                Intent::Document(DocumentIntent::Modification),
                Intent::Document(DocumentIntent::Query),
            ],
        }
    }

    /// The label the generator is asked to answer with.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Relational(RelationalIntent::Select) => "select",
            Self::Relational(RelationalIntent::Modification) => "modification",
            Self::Document(DocumentIntent::Schema) => "schema",
            Self::Document(DocumentIntent::Query) => "query",
            Self::Document(DocumentIntent::Modification) => "modification",
        }
    }

    /// Resolves a normalized label within a backend's closed set.
    pub fn from_label(target: BackendTarget, label: &str) -> Option<Self> {
        Self::closed_set(target)
            .iter()
            .copied()
            .find(|intent| intent.as_str() == label)
    }

    /// Returns the backend this intent belongs to.
    pub fn backend(&self) -> BackendTarget {
        match self {
            Self::Relational(_) => BackendTarget::Relational,
            Self::Document(_) => BackendTarget::Document,
        }
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An aggregation over one collection, as generated.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregationSpec {
    pub collection: String,
    /// Stage objects in generated order.
    pub pipeline: Vec<Value>,
}

/// A document modification, as generated.
///
/// `operation` is kept as raw text here; recognizing it is the validator's job.
#[derive(Debug, Clone, PartialEq)]
pub struct ModificationSpec {
    pub operation: String,
    pub collection: String,
    pub filter: Option<Value>,
    pub update: Option<Value>,
    pub data: Option<Value>,
}

/// The structured representation produced from an instruction.
#[derive(Debug, Clone, PartialEq)]
pub enum SynthesizedQuery {
    /// One SQL statement, opaque text.
    SqlText(String),
    Aggregation(AggregationSpec),
    Modification(ModificationSpec),
    /// Free-text answer to a schema question.
    SchemaAnswer(String),
}

impl SynthesizedQuery {
    /// Text shown to the caller as the query that was run.
    ///
    /// SQL is returned as-is; document queries and modifications are
    /// pretty-printed JSON with a one-space indent.
    pub fn representation(&self) -> String {
        match self {
            Self::SqlText(sql) => sql.clone(),
            Self::Aggregation(spec) => {
                let mut map = Map::new();
                map.insert("collection".into(), Value::String(spec.collection.clone()));
                map.insert("aggregate".into(), Value::Array(spec.pipeline.clone()));
                normalizer::to_pretty_json(&Value::Object(map))
            }
            Self::Modification(spec) => {
                let mut map = Map::new();
                map.insert("operation".into(), Value::String(spec.operation.clone()));
                map.insert("collection".into(), Value::String(spec.collection.clone()));
                for (key, value) in [
                    ("filter", &spec.filter),
                    ("update", &spec.update),
                    ("data", &spec.data),
                ] {
                    if let Some(value) = value {
                        map.insert(key.into(), value.clone());
                    }
                }
                normalizer::to_pretty_json(&Value::Object(map))
            }
            Self::SchemaAnswer(_) => normalizer::SCHEMA_REPRESENTATION.to_string(),
        }
    }

    /// Short variant name for logs and error messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::SqlText(_) => "SQL statement",
            Self::Aggregation(_) => "aggregation",
            Self::Modification(_) => "document modification",
            Self::SchemaAnswer(_) => "schema answer",
        }
    }
}

/// Raw output of the execution stage.
#[derive(Debug, Clone, PartialEq)]
pub enum ExecutionResult {
    Tabular(TabularResult),
    /// Affected rows or documents.
    Count(u64),
    /// Documents in pipeline output order, identifiers still backend-native.
    Documents(Vec<Document>),
    Text(String),
}
