//! Relational statement gates.
//!
//! A generated modification must start with INSERT, UPDATE or DELETE, and a
//! select must start with a read-only keyword. When sqlparser (MySQL dialect)
//! can parse the statement, it must also be exactly one statement of that
//! kind.

use sqlparser::ast::{SetExpr, Statement};
use sqlparser::dialect::MySqlDialect;
use sqlparser::parser::Parser;
use std::fmt;
use tracing::debug;

use super::ValidationError;

/// The data modification statements that may reach the relational backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModificationKind {
    Insert,
    Update,
    Delete,
}

impl ModificationKind {
    /// Matches a leading keyword, case-insensitively.
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        match keyword.to_ascii_uppercase().as_str() {
            "INSERT" => Some(Self::Insert),
            "UPDATE" => Some(Self::Update),
            "DELETE" => Some(Self::Delete),
            _ => None,
        }
    }

    fn matches(&self, statement: &Statement) -> bool {
        matches!(
            (self, statement),
            (Self::Insert, Statement::Insert(_))
                | (Self::Update, Statement::Update { .. })
                | (Self::Delete, Statement::Delete(_))
        )
    }
}

impl fmt::Display for ModificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Insert => write!(f, "INSERT"),
            Self::Update => write!(f, "UPDATE"),
            Self::Delete => write!(f, "DELETE"),
        }
    }
}

/// Returns the first word of a statement.
fn leading_keyword(sql: &str) -> &str {
    let trimmed = sql.trim_start();
    let end = trimmed
        .find(|c: char| !c.is_ascii_alphabetic())
        .unwrap_or(trimmed.len());
    &trimmed[..end]
}

/// Keywords a row-returning statement may start with.
const READ_KEYWORDS: &[&str] = &["SELECT", "WITH", "SHOW", "DESCRIBE", "DESC", "EXPLAIN"];

/// The keyword to report for a rejected statement.
fn reported_keyword(sql: &str, keyword: &str) -> String {
    if keyword.is_empty() {
        sql.trim().chars().take(20).collect()
    } else {
        keyword.to_ascii_uppercase()
    }
}

/// Fallback for statements sqlparser cannot parse: refuse anything stacked.
fn reject_stacked(sql: &str, error: &sqlparser::parser::ParserError) -> Result<(), ValidationError> {
    debug!(error = %error, "Statement did not parse");
    if sql.trim().trim_end_matches(';').contains(';') {
        return Err(ValidationError::MultipleStatements(2));
    }
    Ok(())
}

fn is_read_only_body(body: &SetExpr) -> bool {
    match body {
        SetExpr::Select(_) | SetExpr::Values(_) | SetExpr::Table(_) => true,
        SetExpr::Query(query) => is_read_only_body(&query.body),
        SetExpr::SetOperation { left, right, .. } => {
            is_read_only_body(left) && is_read_only_body(right)
        }
        _ => false,
    }
}

/// Checks a generated row-returning statement.
#[derive(Debug)]
pub struct ReadGate {
    dialect: MySqlDialect,
}

impl Default for ReadGate {
    fn default() -> Self {
        Self::new()
    }
}

impl ReadGate {
    pub fn new() -> Self {
        Self {
            dialect: MySqlDialect {},
        }
    }

    /// Accepts one SELECT, WITH, SHOW, DESCRIBE or EXPLAIN statement.
    pub fn check(&self, sql: &str) -> Result<(), ValidationError> {
        let keyword = leading_keyword(sql).to_ascii_uppercase();
        if !READ_KEYWORDS.contains(&keyword.as_str()) {
            return Err(ValidationError::NotReadOnly {
                keyword: reported_keyword(sql, &keyword),
            });
        }

        match Parser::parse_sql(&self.dialect, sql) {
            Ok(statements) => {
                if statements.len() != 1 {
                    return Err(ValidationError::MultipleStatements(statements.len()));
                }
                let read_only = match &statements[0] {
                    Statement::Query(query) => is_read_only_body(&query.body),
                    // EXPLAIN ANALYZE runs the wrapped statement.
                    Statement::Explain { statement, .. } => {
                        matches!(statement.as_ref(), Statement::Query(query) if is_read_only_body(&query.body))
                    }
                    _ => !matches!(keyword.as_str(), "SELECT" | "WITH"),
                };
                if !read_only {
                    return Err(ValidationError::NotReadOnly { keyword });
                }
                Ok(())
            }
            Err(e) => reject_stacked(sql, &e),
        }
    }
}

/// Checks a generated relational modification statement.
#[derive(Debug)]
pub struct ModificationGate {
    dialect: MySqlDialect,
}

impl Default for ModificationGate {
    fn default() -> Self {
        Self::new()
    }
}

impl ModificationGate {
    pub fn new() -> Self {
        Self {
            dialect: MySqlDialect {},
        }
    }

    /// Returns the statement kind, or why the statement must not run.
    pub fn check(&self, sql: &str) -> Result<ModificationKind, ValidationError> {
        let keyword = leading_keyword(sql);
        let kind = ModificationKind::from_keyword(keyword).ok_or_else(|| {
            ValidationError::NotAModification {
                keyword: reported_keyword(sql, keyword),
            }
        })?;

        match Parser::parse_sql(&self.dialect, sql) {
            Ok(statements) => {
                if statements.len() != 1 {
                    return Err(ValidationError::MultipleStatements(statements.len()));
                }
                if !kind.matches(&statements[0]) {
                    return Err(ValidationError::NotAModification {
                        keyword: keyword.to_ascii_uppercase(),
                    });
                }
            }
            // MySQL accepts syntax sqlparser does not; the keyword gate stands.
            Err(e) => reject_stacked(sql, &e)?,
        }

        Ok(kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn check(sql: &str) -> Result<ModificationKind, ValidationError> {
        ModificationGate::new().check(sql)
    }

    #[test]
    fn test_insert_update_delete_pass() {
        assert_eq!(
            check("INSERT INTO tracks (name) VALUES ('Intro')").unwrap(),
            ModificationKind::Insert
        );
        assert_eq!(
            check("update tracks set name = 'Outro' where id = 1").unwrap(),
            ModificationKind::Update
        );
        assert_eq!(
            check("DELETE FROM tracks WHERE id = 1;").unwrap(),
            ModificationKind::Delete
        );
    }

    #[test]
    fn test_leading_whitespace_is_ignored() {
        assert!(check("\n  DELETE FROM tracks WHERE id = 1").is_ok());
    }

    #[test]
    fn test_schema_operations_rejected() {
        for sql in [
            "DROP TABLE tracks",
            "CREATE TABLE t (id INT)",
            "ALTER TABLE tracks ADD COLUMN x INT",
            "TRUNCATE TABLE tracks",
        ] {
            assert!(
                matches!(check(sql), Err(ValidationError::NotAModification { .. })),
                "{sql} should be rejected"
            );
        }
    }

    #[test]
    fn test_select_rejected() {
        let err = check("SELECT * FROM tracks").unwrap_err();
        assert_eq!(
            err,
            ValidationError::NotAModification {
                keyword: "SELECT".to_string()
            }
        );
    }

    #[test]
    fn test_stacked_statements_rejected() {
        let err = check("DELETE FROM tracks WHERE id = 1; DROP TABLE tracks").unwrap_err();
        assert_eq!(err, ValidationError::MultipleStatements(2));
    }

    #[test]
    fn test_keyword_prefix_is_not_enough() {
        // "deleted" is not DELETE
        assert!(check("deleted_tracks").is_err());
    }

    #[test]
    fn test_empty_statement_rejected() {
        assert!(check("").is_err());
        assert!(check("   ").is_err());
    }

    fn check_read(sql: &str) -> Result<(), ValidationError> {
        ReadGate::new().check(sql)
    }

    #[test]
    fn test_read_statements_pass() {
        for sql in [
            "SELECT tracks.name FROM tracks",
            "select count(*) from tracks;",
            "WITH long AS (SELECT * FROM tracks WHERE duration > 600) SELECT name FROM long",
            "SELECT name FROM tracks UNION SELECT title FROM albums",
            "SHOW TABLES",
            "DESCRIBE tracks",
            "EXPLAIN SELECT * FROM tracks",
        ] {
            assert!(check_read(sql).is_ok(), "{sql} should pass");
        }
    }

    #[test]
    fn test_ddl_rejected_for_reads() {
        for sql in [
            "DROP TABLE tracks",
            "CREATE TABLE t (id INT)",
            "ALTER TABLE tracks ADD COLUMN x INT",
            "TRUNCATE TABLE tracks",
        ] {
            assert!(
                matches!(check_read(sql), Err(ValidationError::NotReadOnly { .. })),
                "{sql} should be rejected"
            );
        }
    }

    #[test]
    fn test_writes_rejected_for_reads() {
        let err = check_read("DELETE FROM tracks").unwrap_err();
        assert_eq!(
            err,
            ValidationError::NotReadOnly {
                keyword: "DELETE".to_string()
            }
        );
    }

    #[test]
    fn test_explain_analyze_of_write_rejected() {
        let err = check_read("EXPLAIN ANALYZE DELETE FROM tracks WHERE id = 1").unwrap_err();
        assert_eq!(
            err,
            ValidationError::NotReadOnly {
                keyword: "EXPLAIN".to_string()
            }
        );
    }

    #[test]
    fn test_select_followed_by_drop_rejected() {
        let err = check_read("SELECT * FROM tracks; DROP TABLE tracks").unwrap_err();
        assert_eq!(err, ValidationError::MultipleStatements(2));
    }
}
