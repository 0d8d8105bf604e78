//! Prompt construction for generator requests.
//!
//! Every prompt embeds the schema snapshot so the generator only refers to
//! entities that exist, and quotes the instruction verbatim.

use regex::{Captures, Regex};
use std::sync::LazyLock;

use crate::db::SchemaSnapshot;

/// Placeholders recognized in templates. Substitution is single-pass, so
/// placeholder-like text inside an instruction is never expanded.
static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{(database|schema|instruction)\}").expect("Invalid regex"));

const RELATIONAL_CLASSIFY_TEMPLATE: &str = r#"You determine the type of SQL operation a natural language instruction asks for.

Classify the instruction as one of:
- "modification" (if it involves INSERT, UPDATE, DELETE, CREATE, DROP, ALTER)
- "select" (if it involves reading data with SELECT)

Only return "modification" or "select". Do not explain or provide SQL code.

Instruction: "{instruction}""#;

const RELATIONAL_SELECT_TEMPLATE: &str = r#"You convert natural language instructions into SQL SELECT queries.

MySQL database: {database}
Tables and their columns:
{schema}

Notes:
- Related data may be split across tables. If a column is not in one table, JOIN the table that has it through a shared key.
- Always qualify columns with their table name (e.g. tracks.name).
- Return a single valid MySQL SELECT query that answers the instruction using only the schema above.
- Return only the SQL query, without explanation or formatting.

Instruction: "{instruction}""#;

const RELATIONAL_MODIFICATION_TEMPLATE: &str = r#"You convert natural language instructions into SQL data modification statements.

MySQL database: {database}
Tables and their columns:
{schema}

Rules:
- Generate exactly one INSERT, UPDATE or DELETE statement for MySQL.
- Use valid data types for all fields. If a value is not given, use a reasonable mock value.
- Return only the SQL statement, without explanation or markdown.

Instruction: "{instruction}""#;

const DOCUMENT_CLASSIFY_TEMPLATE: &str = r#"You determine the type of MongoDB operation a natural language instruction asks for.

Classify the instruction as one of:
- "schema" (if it asks about the database structure: which collections exist, which attributes a collection has, or other metadata)
- "modification" (if it involves adding, inserting, updating, or deleting data)
- "query" (if it involves finding, retrieving, joining, or aggregating data)

Only return "schema", "modification", or "query". Do not explain.

Instruction: "{instruction}""#;

const DOCUMENT_QUERY_TEMPLATE: &str = r#"You convert natural language questions into MongoDB aggregation queries.

MongoDB database: {database}
Collections and their attributes:
{schema}

Pick the collection the question is about. Build the pipeline from these stages:
- $lookup to combine data from several collections
- $group to compute averages, counts, sums or other groupings
- $match to filter documents
- $sort to order results (1 ascending, -1 descending)
- $skip to skip results
- $limit to limit results
- $project to select fields

Order stages correctly. For the Nth highest value use $sort, then $skip, then $limit.

Return only a JSON object with this structure:
{
  "collection": "name_of_selected_collection",
  "aggregate": [ { "$stage": { ... } } ]
}

Question: "{instruction}""#;

const DOCUMENT_MODIFICATION_TEMPLATE: &str = r#"You convert natural language instructions into MongoDB data modification operations.

MongoDB database: {database}
Collections and their attributes:
{schema}

If values like IDs or ISBNs are required, generate valid-looking dummy values (e.g. '1', 'ISBN001'), never placeholders like 'unique_id'.

Return only a JSON object with this structure:
{
  "operation": "insertOne" | "insertMany" | "updateOne" | "updateMany" | "deleteOne" | "deleteMany",
  "collection": "collection_name",
  "filter": { required for update and delete },
  "update": { required for update },
  "data": { required for insert; an array of objects for insertMany }
}

Instruction: "{instruction}""#;

const DOCUMENT_SCHEMA_TEMPLATE: &str = r#"You answer questions about the structure of a MongoDB database.

Database: {database}
Collections and their attributes:
{schema}

Question: "{instruction}"

Answer briefly using only the information above. If the question is not about the database structure, respond with "Unable to process query.""#;

fn fill(template: &str, database: &str, schema: &str, instruction: &str) -> String {
    PLACEHOLDER
        .replace_all(template, |caps: &Captures| match &caps[1] {
            "database" => database.to_string(),
            "schema" => schema.to_string(),
            _ => instruction.to_string(),
        })
        .into_owned()
}

/// Prompt asking for a `select` / `modification` label.
pub fn relational_classification(instruction: &str) -> String {
    fill(RELATIONAL_CLASSIFY_TEMPLATE, "", "", instruction)
}

/// Prompt asking for a single SELECT statement.
pub fn relational_select(schema: &SchemaSnapshot, instruction: &str) -> String {
    fill(
        RELATIONAL_SELECT_TEMPLATE,
        &schema.database,
        &schema.format_for_relational_prompt(),
        instruction,
    )
}

/// Prompt asking for a single INSERT, UPDATE or DELETE statement.
pub fn relational_modification(schema: &SchemaSnapshot, instruction: &str) -> String {
    fill(
        RELATIONAL_MODIFICATION_TEMPLATE,
        &schema.database,
        &schema.format_for_relational_prompt(),
        instruction,
    )
}

/// Prompt asking for a `schema` / `query` / `modification` label.
pub fn document_classification(instruction: &str) -> String {
    fill(DOCUMENT_CLASSIFY_TEMPLATE, "", "", instruction)
}

/// Prompt asking for a `{collection, aggregate}` JSON object.
pub fn document_query(schema: &SchemaSnapshot, instruction: &str) -> String {
    fill(
        DOCUMENT_QUERY_TEMPLATE,
        &schema.database,
        &schema.format_for_document_prompt(),
        instruction,
    )
}

/// Prompt asking for a modification JSON object.
pub fn document_modification(schema: &SchemaSnapshot, instruction: &str) -> String {
    fill(
        DOCUMENT_MODIFICATION_TEMPLATE,
        &schema.database,
        &schema.format_for_document_prompt(),
        instruction,
    )
}

/// Prompt asking for a prose answer about the schema.
pub fn document_schema_question(schema: &SchemaSnapshot, instruction: &str) -> String {
    fill(
        DOCUMENT_SCHEMA_TEMPLATE,
        &schema.database,
        &schema.format_for_document_prompt(),
        instruction,
    )
}
