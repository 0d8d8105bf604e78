//! Aggregation stage allow-list.
//!
//! Every stage must be an object with exactly one `$`-prefixed key taken from
//! a read-only set. Sub-pipelines inside `$lookup`, `$facet` and `$unionWith`
//! are checked the same way, and collections they reference must exist.

use serde_json::Value;
use std::collections::HashSet;

use crate::db::{json_type_name, SchemaSnapshot};

use super::ValidationError;

/// Read-only stages accepted by default.
pub const DEFAULT_ALLOWED_STAGES: &[&str] = &[
    "$addFields",
    "$bucket",
    "$bucketAuto",
    "$count",
    "$densify",
    "$facet",
    "$fill",
    "$geoNear",
    "$graphLookup",
    "$group",
    "$limit",
    "$lookup",
    "$match",
    "$project",
    "$redact",
    "$replaceRoot",
    "$replaceWith",
    "$sample",
    "$set",
    "$setWindowFields",
    "$skip",
    "$sort",
    "$sortByCount",
    "$unionWith",
    "$unset",
    "$unwind",
];

/// Stages that write and are refused even when configured.
const WRITE_STAGES: &[&str] = &["$out", "$merge"];

/// The set of stage names a pipeline may use.
#[derive(Debug, Clone)]
pub struct StageAllowList {
    allowed: HashSet<String>,
}

impl Default for StageAllowList {
    fn default() -> Self {
        Self::new(DEFAULT_ALLOWED_STAGES.iter().copied())
    }
}

impl StageAllowList {
    /// Builds an allow-list. Write stages are dropped from the input.
    pub fn new<I, S>(stages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let allowed = stages
            .into_iter()
            .map(|s| s.as_ref().trim().to_string())
            .filter(|s| !WRITE_STAGES.contains(&s.as_str()))
            .collect();
        Self { allowed }
    }

    /// Returns true if the stage name is allowed.
    pub fn allows(&self, stage: &str) -> bool {
        self.allowed.contains(stage)
    }

    /// Checks a whole pipeline. `position` in errors is zero-based.
    pub fn check_pipeline(
        &self,
        pipeline: &[Value],
        schema: &SchemaSnapshot,
    ) -> Result<(), ValidationError> {
        for (position, stage) in pipeline.iter().enumerate() {
            self.check_stage(position, stage, schema)?;
        }
        Ok(())
    }

    fn check_stage(
        &self,
        position: usize,
        stage: &Value,
        schema: &SchemaSnapshot,
    ) -> Result<(), ValidationError> {
        let object = stage.as_object().ok_or_else(|| ValidationError::MalformedStage {
            position,
            reason: format!("expected an object, found {}", json_type_name(stage)),
        })?;

        if object.len() != 1 {
            return Err(ValidationError::MalformedStage {
                position,
                reason: format!("expected exactly one stage key, found {}", object.len()),
            });
        }

        let Some((name, body)) = object.iter().next() else {
            return Err(ValidationError::MalformedStage {
                position,
                reason: "empty stage".to_string(),
            });
        };

        if !name.starts_with('$') || !self.allows(name) {
            return Err(ValidationError::StageNotAllowed {
                position,
                stage: name.clone(),
            });
        }

        match name.as_str() {
            "$lookup" | "$graphLookup" => {
                if let Some(from) = body.get("from").and_then(Value::as_str) {
                    self.check_collection(from, schema)?;
                }
                if let Some(Value::Array(inner)) = body.get("pipeline") {
                    self.check_pipeline(inner, schema)?;
                }
            }
            "$unionWith" => match body {
                Value::String(coll) => self.check_collection(coll, schema)?,
                other => {
                    if let Some(coll) = other.get("coll").and_then(Value::as_str) {
                        self.check_collection(coll, schema)?;
                    }
                    if let Some(Value::Array(inner)) = other.get("pipeline") {
                        self.check_pipeline(inner, schema)?;
                    }
                }
            },
            "$facet" => {
                if let Some(facets) = body.as_object() {
                    for inner in facets.values() {
                        if let Value::Array(inner) = inner {
                            self.check_pipeline(inner, schema)?;
                        }
                    }
                }
            }
            _ => {}
        }

        Ok(())
    }

    fn check_collection(&self, name: &str, schema: &SchemaSnapshot) -> Result<(), ValidationError> {
        if schema.contains(name) {
            Ok(())
        } else {
            Err(ValidationError::UnknownCollection(name.to_string()))
        }
    }
}
