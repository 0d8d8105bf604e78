//! Document-store modification primitives.

use mongodb::bson::Document;
use std::fmt;

/// The six recognized document modification operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentOperation {
    InsertOne,
    InsertMany,
    UpdateOne,
    UpdateMany,
    DeleteOne,
    DeleteMany,
}

impl DocumentOperation {
    pub const ALL: [DocumentOperation; 6] = [
        Self::InsertOne,
        Self::InsertMany,
        Self::UpdateOne,
        Self::UpdateMany,
        Self::DeleteOne,
        Self::DeleteMany,
    ];

    /// Returns the wire name of the operation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InsertOne => "insertOne",
            Self::InsertMany => "insertMany",
            Self::UpdateOne => "updateOne",
            Self::UpdateMany => "updateMany",
            Self::DeleteOne => "deleteOne",
            Self::DeleteMany => "deleteMany",
        }
    }

    /// Parses an exact operation name.
    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.as_str() == s)
    }

    /// Whether the operation needs `data` to insert.
    pub fn requires_data(&self) -> bool {
        matches!(self, Self::InsertOne | Self::InsertMany)
    }
}

impl fmt::Display for DocumentOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A fully-typed modification, ready for the driver.
#[derive(Debug, Clone, PartialEq)]
pub enum DocumentModification {
    InsertOne {
        collection: String,
        document: Document,
    },
    InsertMany {
        collection: String,
        documents: Vec<Document>,
    },
    UpdateOne {
        collection: String,
        filter: Document,
        update: Document,
    },
    UpdateMany {
        collection: String,
        filter: Document,
        update: Document,
    },
    DeleteOne {
        collection: String,
        filter: Document,
    },
    DeleteMany {
        collection: String,
        filter: Document,
    },
}

impl DocumentModification {
    /// Returns the operation this modification performs.
    pub fn operation(&self) -> DocumentOperation {
        match self {
            Self::InsertOne { .. } => DocumentOperation::InsertOne,
            Self::InsertMany { .. } => DocumentOperation::InsertMany,
            Self::UpdateOne { .. } => DocumentOperation::UpdateOne,
            Self::UpdateMany { .. } => DocumentOperation::UpdateMany,
            Self::DeleteOne { .. } => DocumentOperation::DeleteOne,
            Self::DeleteMany { .. } => DocumentOperation::DeleteMany,
        }
    }

    /// Returns the target collection.
    pub fn collection(&self) -> &str {
        match self {
            Self::InsertOne { collection, .. }
            | Self::InsertMany { collection, .. }
            | Self::UpdateOne { collection, .. }
            | Self::UpdateMany { collection, .. }
            | Self::DeleteOne { collection, .. }
            | Self::DeleteMany { collection, .. } => collection,
        }
    }
}

/// Converts a JSON object into a BSON document.
pub(crate) fn json_to_document(value: &serde_json::Value) -> std::result::Result<Document, String> {
    if !value.is_object() {
        return Err(format!("expected a JSON object, found {}", json_type_name(value)));
    }
    mongodb::bson::to_document(value).map_err(|e| e.to_string())
}

/// Returns the JSON type name of a value, for error messages.
pub(crate) fn json_type_name(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}
