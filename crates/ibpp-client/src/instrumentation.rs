//! Tracing instrumentation for database operations.
//!
//! Spans follow the OpenTelemetry database semantic conventions so that a
//! `tracing` subscriber bridging to OpenTelemetry exports them unchanged:
//!
//! - `db.system`: "firebird"
//! - `db.name`: Database path or alias
//! - `db.statement`: SQL statement (sanitized if configured)
//! - `db.operation`: Statement kind (SELECT, INSERT, etc.)
//! - `db.rows_affected`: Rows touched by an action statement
//!
//! SQL text is passed through a [`SanitizationConfig`] before it is
//! recorded, so literal values do not leak into logs by default.

use tracing::Span;

/// Database system identifier for Firebird.
pub const DB_SYSTEM: &str = "firebird";

/// Span names for database operations.
pub mod span_names {
    /// Span name for attaching to a database.
    pub const CONNECT: &str = "ibpp.connect";
    /// Span name for detaching from a database.
    pub const DISCONNECT: &str = "ibpp.disconnect";
    /// Span name for statement preparation.
    pub const PREPARE: &str = "ibpp.prepare";
    /// Span name for statement execution.
    pub const EXECUTE: &str = "ibpp.execute";
    /// Span name for starting a transaction.
    pub const START_TRANSACTION: &str = "ibpp.start_transaction";
    /// Span name for committing a transaction.
    pub const COMMIT: &str = "ibpp.commit";
    /// Span name for rolling back a transaction.
    pub const ROLLBACK: &str = "ibpp.rollback";
    /// Span name for service manager actions.
    pub const SERVICE: &str = "ibpp.service";
}

/// Attribute keys following OpenTelemetry semantic conventions.
pub mod attributes {
    /// Database system type.
    pub const DB_SYSTEM: &str = "db.system";
    /// Database name.
    pub const DB_NAME: &str = "db.name";
    /// SQL statement (may be sanitized).
    pub const DB_STATEMENT: &str = "db.statement";
    /// Database operation type.
    pub const DB_OPERATION: &str = "db.operation";
    /// Number of rows affected.
    pub const DB_ROWS_AFFECTED: &str = "db.rows_affected";
}

/// Configuration for SQL statement sanitization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SanitizationConfig {
    /// Whether to sanitize SQL statements.
    pub enabled: bool,
    /// Maximum length of statement to record.
    pub max_length: usize,
    /// Placeholder to use for sanitized values.
    pub placeholder: String,
}

impl Default for SanitizationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_length: 2048,
            placeholder: "?".to_string(),
        }
    }
}

impl SanitizationConfig {
    /// Create a configuration that doesn't sanitize statements.
    #[must_use]
    pub fn no_sanitization() -> Self {
        Self {
            enabled: false,
            max_length: usize::MAX,
            placeholder: String::new(),
        }
    }

    /// Sanitize a SQL statement according to the configuration.
    #[must_use]
    pub fn sanitize(&self, sql: &str) -> String {
        if !self.enabled {
            return truncate_string(sql, self.max_length);
        }

        let sanitized = sanitize_sql(sql, &self.placeholder);
        truncate_string(&sanitized, self.max_length)
    }
}

/// Replace string and numeric literals with `placeholder`.
///
/// Double quotes delimit identifiers in dialect 3, so only single-quoted
/// text is treated as a literal.
fn sanitize_sql(sql: &str, placeholder: &str) -> String {
    let mut result = String::with_capacity(sql.len());
    let mut chars = sql.chars().peekable();
    let mut in_string = false;

    while let Some(c) = chars.next() {
        if in_string {
            if c == '\'' {
                // Doubled quote inside a literal
                if chars.peek() == Some(&'\'') {
                    chars.next();
                    continue;
                }
                in_string = false;
                result.push_str(placeholder);
            }
            continue;
        }

        if c == '\'' {
            in_string = true;
            continue;
        }

        if c.is_ascii_digit() && !result.ends_with(|ch: char| ch.is_alphanumeric() || ch == '_' || ch == '$') {
            while chars
                .peek()
                .is_some_and(|ch| ch.is_ascii_digit() || *ch == '.')
            {
                chars.next();
            }
            result.push_str(placeholder);
            continue;
        }

        result.push(c);
    }

    if in_string {
        result.push_str(placeholder);
    }

    result
}

/// Truncate a string to a maximum length, on a character boundary.
fn truncate_string(s: &str, max_len: usize) -> String {
    if s.len() <= max_len {
        return s.to_string();
    }
    let mut end = max_len.saturating_sub(3);
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &s[..end])
}

/// Extract the operation type from a SQL statement.
#[must_use]
pub fn extract_operation(sql: &str) -> &'static str {
    let sql_upper = sql.trim_start().to_uppercase();

    if sql_upper.starts_with("SELECT") || sql_upper.starts_with("WITH") {
        "SELECT"
    } else if sql_upper.starts_with("INSERT") {
        "INSERT"
    } else if sql_upper.starts_with("UPDATE OR INSERT") || sql_upper.starts_with("MERGE") {
        "MERGE"
    } else if sql_upper.starts_with("UPDATE") {
        "UPDATE"
    } else if sql_upper.starts_with("DELETE") {
        "DELETE"
    } else if sql_upper.starts_with("EXECUTE PROCEDURE") {
        "EXECUTE"
    } else if sql_upper.starts_with("EXECUTE BLOCK") {
        "BLOCK"
    } else if sql_upper.starts_with("SET GENERATOR") {
        "SET GENERATOR"
    } else if sql_upper.starts_with("SAVEPOINT") || sql_upper.starts_with("RELEASE SAVEPOINT") {
        "SAVEPOINT"
    } else if sql_upper.starts_with("COMMIT") {
        "COMMIT"
    } else if sql_upper.starts_with("ROLLBACK") {
        "ROLLBACK"
    } else if sql_upper.starts_with("CREATE") || sql_upper.starts_with("RECREATE") {
        "CREATE"
    } else if sql_upper.starts_with("ALTER") {
        "ALTER"
    } else if sql_upper.starts_with("DROP") {
        "DROP"
    } else {
        "OTHER"
    }
}

/// Span covering an attach or create.
pub(crate) fn connect_span(database: &str) -> Span {
    tracing::info_span!(
        "ibpp.connect",
        db.system = DB_SYSTEM,
        db.name = %database,
    )
}

/// Span covering a detach and the cascade before it.
pub(crate) fn disconnect_span(database: &str) -> Span {
    tracing::info_span!(
        "ibpp.disconnect",
        db.system = DB_SYSTEM,
        db.name = %database,
    )
}

/// Span covering a prepare or execute of `sql`.
pub(crate) fn statement_span(name: &'static str, config: &SanitizationConfig, sql: &str) -> Span {
    match name {
        span_names::PREPARE => tracing::debug_span!(
            "ibpp.prepare",
            db.system = DB_SYSTEM,
            db.operation = extract_operation(sql),
            db.statement = %config.sanitize(sql),
        ),
        _ => tracing::debug_span!(
            "ibpp.execute",
            db.system = DB_SYSTEM,
            db.operation = extract_operation(sql),
            db.statement = %config.sanitize(sql),
            db.rows_affected = tracing::field::Empty,
        ),
    }
}

/// Span covering a transaction boundary.
pub(crate) fn transaction_span(name: &'static str) -> Span {
    match name {
        span_names::COMMIT => tracing::debug_span!("ibpp.commit", db.system = DB_SYSTEM),
        span_names::ROLLBACK => tracing::debug_span!("ibpp.rollback", db.system = DB_SYSTEM),
        _ => tracing::debug_span!("ibpp.start_transaction", db.system = DB_SYSTEM),
    }
}

/// Span covering a service manager action.
pub(crate) fn service_span(action: &'static str) -> Span {
    tracing::debug_span!("ibpp.service", db.system = DB_SYSTEM, db.operation = action)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_sql_strings() {
        let sql = "SELECT * FROM users WHERE name = 'John'";
        let sanitized = sanitize_sql(sql, "?");
        assert_eq!(sanitized, "SELECT * FROM users WHERE name = ?");
    }

    #[test]
    fn test_sanitize_sql_numbers() {
        let sql = "SELECT * FROM users WHERE id = 123";
        let sanitized = sanitize_sql(sql, "?");
        assert_eq!(sanitized, "SELECT * FROM users WHERE id = ?");
    }

    #[test]
    fn test_sanitize_sql_escaped_quotes() {
        let sql = "SELECT * FROM users WHERE name = 'O''Brien'";
        let sanitized = sanitize_sql(sql, "?");
        assert_eq!(sanitized, "SELECT * FROM users WHERE name = ?");
    }

    #[test]
    fn test_sanitize_keeps_quoted_identifiers_and_system_names() {
        let sql = "SELECT \"Col1\" FROM RDB$RELATIONS WHERE x = 1.5";
        let sanitized = sanitize_sql(sql, "?");
        assert_eq!(sanitized, "SELECT \"Col1\" FROM RDB$RELATIONS WHERE x = ?");
    }

    #[test]
    fn test_extract_operation() {
        assert_eq!(extract_operation("SELECT * FROM users"), "SELECT");
        assert_eq!(extract_operation("  insert INTO users VALUES (1)"), "INSERT");
        assert_eq!(extract_operation("UPDATE users SET name = 'x'"), "UPDATE");
        assert_eq!(extract_operation("UPDATE OR INSERT INTO t VALUES (1)"), "MERGE");
        assert_eq!(extract_operation("DELETE FROM users"), "DELETE");
        assert_eq!(extract_operation("EXECUTE PROCEDURE sp_test"), "EXECUTE");
        assert_eq!(extract_operation("SET GENERATOR g TO 0"), "SET GENERATOR");
        assert_eq!(extract_operation("CREATE TABLE test"), "CREATE");
        assert_eq!(extract_operation("GRANT ALL ON t TO u"), "OTHER");
    }

    #[test]
    fn test_truncate_string() {
        assert_eq!(truncate_string("short", 10), "short");
        assert_eq!(truncate_string("this is a long string", 10), "this is...");
        assert_eq!(truncate_string("ééééé", 6), "é...");
    }

    #[test]
    fn test_sanitization_config() {
        let config = SanitizationConfig::default();
        assert!(config.enabled);
        assert_eq!(config.sanitize("SELECT 'x'"), "SELECT ?");

        let config = SanitizationConfig::no_sanitization();
        assert!(!config.enabled);
        assert_eq!(config.sanitize("SELECT 'x'"), "SELECT 'x'");
    }
}
