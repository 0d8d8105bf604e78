//! Validation of synthesized queries.
//!
//! Nothing reaches a backend without passing through [`Validator`]: the
//! executor only accepts a [`ValidatedQuery`], which can only be built here.

mod sql;
mod stages;
mod validator;

pub use sql::{ModificationGate, ModificationKind, ReadGate};
pub use stages::{StageAllowList, DEFAULT_ALLOWED_STAGES};
pub use validator::{ExecutionPlan, ValidatedQuery, Validator};

use thiserror::Error;

use crate::db::DocumentOperation;
use crate::error::BridgeError;
use crate::query::Intent;

/// Why a synthesized query was refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("the generated statement is empty")]
    EmptyStatement,

    #[error("only INSERT, UPDATE and DELETE are allowed, got {keyword:?}")]
    NotAModification { keyword: String },

    #[error("only SELECT, WITH, SHOW, DESCRIBE and EXPLAIN are allowed for a select, got {keyword:?}")]
    NotReadOnly { keyword: String },

    #[error("expected exactly one statement, found {0}")]
    MultipleStatements(usize),

    #[error("collection {0:?} does not exist")]
    UnknownCollection(String),

    #[error("the aggregation pipeline is empty")]
    EmptyPipeline,

    #[error("stage {position} is malformed: {reason}")]
    MalformedStage { position: usize, reason: String },

    #[error("stage {position} uses {stage:?}, which is not allowed")]
    StageNotAllowed { position: usize, stage: String },

    #[error("unknown operation {0:?}")]
    UnknownOperation(String),

    #[error("{operation} requires \"{field}\"")]
    MissingField {
        operation: DocumentOperation,
        field: &'static str,
    },

    #[error("\"{field}\" is invalid: {reason}")]
    InvalidField { field: &'static str, reason: String },

    #[error("a {found} does not match the {intent} intent")]
    IntentMismatch { intent: Intent, found: &'static str },
}

impl From<ValidationError> for BridgeError {
    fn from(err: ValidationError) -> Self {
        BridgeError::validation(err.to_string())
    }
}
