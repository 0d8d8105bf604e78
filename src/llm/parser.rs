//! Response parsing for generator outputs.
//!
//! Generated text is untrusted: it may be wrapped in markdown fences, carry a
//! language tag, or not be what was asked for at all.

use regex::Regex;
use serde_json::{Map, Value};
use std::sync::LazyLock;

use crate::db::json_type_name;
use crate::error::{BridgeError, Result};

/// A fence opener at line start or a closer at line end. A word after the
/// opener is a language tag only if it is `sql`/`json` or ends the line.
static FENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^```(?:(?i:sql|json)\b|[A-Za-z]+[ \t]*$)?|```$").expect("Invalid regex")
});

/// Removes markdown code fences and surrounding whitespace.
///
/// ```
/// use nlq_bridge::llm::parser::strip_fences;
///
/// assert_eq!(strip_fences("```sql\nSELECT 1;\n```"), "SELECT 1;");
/// assert_eq!(strip_fences("  SELECT 1;  "), "SELECT 1;");
/// ```
pub fn strip_fences(response: &str) -> String {
    FENCE
        .replace_all(response.trim(), "")
        .trim()
        .to_string()
}

/// Normalizes a one-word label answer: trimmed and lowercased.
pub fn normalize_label(response: &str) -> String {
    response.trim().to_lowercase()
}

/// Parses a generator response as a single JSON object.
///
/// Returns a synthesis error when the text is not JSON or when the JSON
/// is not an object.
pub fn parse_json_object(response: &str) -> Result<Map<String, Value>> {
    let text = strip_fences(response);
    let value: Value = serde_json::from_str(&text)
        .map_err(|e| BridgeError::synthesis(format!("response is not valid JSON: {e}")))?;

    match value {
        Value::Object(map) => Ok(map),
        other => Err(BridgeError::synthesis(format!(
            "expected a JSON object, found {}",
            json_type_name(&other)
        ))),
    }
}
