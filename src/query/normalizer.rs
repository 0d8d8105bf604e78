//! Result normalization.
//!
//! Converts backend-specific results into the two display strings returned
//! to the caller. Rendering is deterministic: the same input always yields
//! the same output.

use mongodb::bson::{Bson, Document};
use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use serde_json::Value as JsonValue;

use crate::db::{TabularResult, Value};

use super::{ExecutionResult, SynthesizedQuery};

/// Query representation for schema answers, where no query runs.
pub const SCHEMA_REPRESENTATION: &str = "The user requested schema information...";

/// Query representation for failures that happened before synthesis.
pub const FALLBACK_REPRESENTATION: &str = "query logic";

/// The caller-facing pair of display strings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedOutput {
    pub query_representation: String,
    pub display_result: String,
}

/// Normalizes an execution result together with the query that produced it.
pub fn normalize(query: &SynthesizedQuery, result: &ExecutionResult) -> NormalizedOutput {
    NormalizedOutput {
        query_representation: query.representation(),
        display_result: render_result(result),
    }
}

/// Renders the display string for an execution result.
pub fn render_result(result: &ExecutionResult) -> String {
    match result {
        ExecutionResult::Tabular(table) => render_table(table),
        ExecutionResult::Count(count) => format!("{count} rows were affected."),
        ExecutionResult::Documents(documents) => render_documents(documents),
        ExecutionResult::Text(text) => text.clone(),
    }
}

/// Pretty-prints JSON with a one-space indent, keeping key order.
pub fn to_pretty_json(value: &JsonValue) -> String {
    let mut buf = Vec::new();
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, PrettyFormatter::with_indent(b" "));
    if value.serialize(&mut ser).is_err() {
        return value.to_string();
    }
    String::from_utf8(buf).unwrap_or_else(|_| value.to_string())
}

/// Renders documents as a JSON array with identifiers stringified.
pub fn render_documents(documents: &[Document]) -> String {
    let values = documents
        .iter()
        .map(|doc| Bson::Document(stringify_ids(doc)).into_relaxed_extjson())
        .collect();
    to_pretty_json(&JsonValue::Array(values))
}

/// Replaces every ObjectId, at any depth, with its hex string.
pub fn stringify_ids(document: &Document) -> Document {
    document
        .iter()
        .map(|(key, value)| (key.clone(), stringify_bson(value)))
        .collect()
}

fn stringify_bson(value: &Bson) -> Bson {
    match value {
        Bson::ObjectId(oid) => Bson::String(oid.to_hex()),
        Bson::Document(doc) => Bson::Document(stringify_ids(doc)),
        Bson::Array(items) => Bson::Array(items.iter().map(stringify_bson).collect()),
        other => other.clone(),
    }
}

/// Renders a GitHub-style Markdown table.
///
/// Columns keep their reported order and rows their backend order. Numeric
/// columns, headers included, are right-aligned.
pub fn render_table(table: &TabularResult) -> String {
    let headers: Vec<String> = table.columns.iter().map(|c| escape_cell(&c.name)).collect();
    if headers.is_empty() {
        return String::new();
    }

    let cells: Vec<Vec<String>> = table
        .rows
        .iter()
        .map(|row| {
            (0..headers.len())
                .map(|i| row.get(i).map(|v| escape_cell(&v.to_display_string())).unwrap_or_default())
                .collect()
        })
        .collect();

    let widths: Vec<usize> = headers
        .iter()
        .enumerate()
        .map(|(i, h)| {
            cells
                .iter()
                .map(|row| row[i].chars().count())
                .chain(std::iter::once(h.chars().count()))
                .max()
                .unwrap_or(0)
        })
        .collect();

    let numeric: Vec<bool> = (0..headers.len())
        .map(|i| is_numeric_column(&table.rows, i))
        .collect();

    let mut out = String::new();
    out.push_str(&format_line(&headers, &widths, &numeric));
    out.push('\n');
    let rule: Vec<String> = widths.iter().map(|w| "-".repeat(w + 2)).collect();
    out.push('|');
    out.push_str(&rule.join("|"));
    out.push('|');

    for row in &cells {
        out.push('\n');
        out.push_str(&format_line(row, &widths, &numeric));
    }

    if let Some(warning) = table.truncation_warning() {
        out.push_str("\n\n");
        out.push_str(&warning);
    }

    out
}

fn format_line(cells: &[String], widths: &[usize], numeric: &[bool]) -> String {
    let padded: Vec<String> = cells
        .iter()
        .zip(widths)
        .zip(numeric)
        .map(|((cell, &width), &right)| {
            if right {
                format!(" {cell:>width$} ")
            } else {
                format!(" {cell:<width$} ")
            }
        })
        .collect();
    format!("|{}|", padded.join("|"))
}

fn is_numeric_column(rows: &[Vec<Value>], index: usize) -> bool {
    let mut values = rows
        .iter()
        .filter_map(|row| row.get(index))
        .filter(|v| !v.is_null())
        .peekable();
    values.peek().is_some() && values.all(Value::is_numeric)
}

fn escape_cell(text: &str) -> String {
    text.replace('|', "\\|").replace(['\r', '\n'], " ")
}
