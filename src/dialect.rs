//! Per-backend SQL syntax rules.
//!
//! A [`Dialect`] is a set of pure functions: identifier quoting, pagination
//! clauses, the current-timestamp expression, parameter naming, and literal
//! formatting. The rest of the crate never hardcodes backend syntax.

use crate::types::{DatabaseType, SqlValue};

/// Syntax rules distinguishing one backend from another.
pub trait Dialect: Send + Sync + std::fmt::Debug {
    fn database_type(&self) -> DatabaseType;

    /// The character opening a quoted identifier.
    fn quote_open(&self) -> char;

    /// The character closing a quoted identifier.
    fn quote_close(&self) -> char;

    /// Quote an identifier.
    ///
    /// Idempotent: an already-quoted name is re-quoted to the same text, and
    /// non-identifier tokens (numeric literals, `*`, expressions containing
    /// operators, parentheses, spaces or quote characters) pass through
    /// unchanged. Pre-existing `[...]` bracket quoting is stripped before the
    /// dialect-native quoting is applied.
    fn quote_identifier(&self, name: &str) -> String {
        requote(name, self.quote_open(), self.quote_close())
    }

    /// Pagination clause for the given skip/take counts, without leading
    /// space. `None` when neither count is set.
    fn pagination_clause(&self, skip: Option<u64>, take: Option<u64>) -> Option<String>;

    /// The current-timestamp expression.
    fn now_expression(&self) -> &'static str;

    /// Name of the n-th auto-generated parameter, as it appears in SQL text.
    fn parameter_name(&self, ordinal: usize) -> String {
        format!("@p{ordinal}")
    }

    /// Prefix applied to bare parameter names when they are bound.
    fn parameter_prefix(&self) -> char {
        '@'
    }

    /// Render a value as an inline SQL literal.
    fn format_literal(&self, value: &SqlValue) -> String {
        match value {
            SqlValue::Null => "NULL".to_string(),
            SqlValue::Int(i) => i.to_string(),
            SqlValue::Float(f) => f.to_string(),
            SqlValue::Bool(b) => if *b { "1" } else { "0" }.to_string(),
            SqlValue::Text(s) => format!("'{}'", s.replace('\'', "''")),
            SqlValue::Char(c) => format!("'{}'", c.to_string().replace('\'', "''")),
            SqlValue::Timestamp(dt) => format!("'{}'", dt.format("%Y-%m-%d %H:%M:%S")),
            SqlValue::Json(j) => format!("'{}'", j.to_string().replace('\'', "''")),
            SqlValue::Blob(b) => {
                let hex: String = b.iter().map(|byte| format!("{byte:02x}")).collect();
                format!("x'{hex}'")
            }
        }
    }

    /// Statement opening a transaction.
    fn begin_transaction_statement(&self) -> &'static str;

    /// Statement retrieving the last inserted row id, when the backend needs
    /// one appended after an insert. `None` means the driver exposes the id
    /// natively and no extra statement is issued.
    fn last_insert_id_statement(&self) -> Option<&'static str>;
}

/// `MySQL` syntax: backtick quoting, `LIMIT skip,take`, `now()`.
#[derive(Debug, Default, Clone, Copy)]
pub struct MySqlDialect;

impl Dialect for MySqlDialect {
    fn database_type(&self) -> DatabaseType {
        DatabaseType::MySql
    }

    fn quote_open(&self) -> char {
        '`'
    }

    fn quote_close(&self) -> char {
        '`'
    }

    fn pagination_clause(&self, skip: Option<u64>, take: Option<u64>) -> Option<String> {
        match (skip, take) {
            (Some(s), Some(t)) => Some(format!("limit {s},{t}")),
            (None, Some(t)) => Some(format!("limit {t}")),
            // LIMIT requires a row count; a bare skip uses the largest one.
            (Some(s), None) => Some(format!("limit {s},{}", u64::MAX)),
            (None, None) => None,
        }
    }

    fn now_expression(&self) -> &'static str {
        "now()"
    }

    fn begin_transaction_statement(&self) -> &'static str {
        "START TRANSACTION"
    }

    fn last_insert_id_statement(&self) -> Option<&'static str> {
        // mysql exposes last_insert_id() on the connection itself.
        None
    }
}

/// `SQLite` syntax: double-quote quoting, `LIMIT take OFFSET skip`,
/// `datetime('now')`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SqliteDialect;

impl Dialect for SqliteDialect {
    fn database_type(&self) -> DatabaseType {
        DatabaseType::Sqlite
    }

    fn quote_open(&self) -> char {
        '"'
    }

    fn quote_close(&self) -> char {
        '"'
    }

    fn pagination_clause(&self, skip: Option<u64>, take: Option<u64>) -> Option<String> {
        match (skip, take) {
            (Some(s), Some(t)) => Some(format!("limit {t} offset {s}")),
            (None, Some(t)) => Some(format!("limit {t}")),
            (Some(s), None) => Some(format!("limit -1 offset {s}")),
            (None, None) => None,
        }
    }

    fn now_expression(&self) -> &'static str {
        "datetime('now')"
    }

    fn begin_transaction_statement(&self) -> &'static str {
        "BEGIN"
    }

    fn last_insert_id_statement(&self) -> Option<&'static str> {
        Some("select last_insert_rowid()")
    }
}

/// Strip any existing quoting, then reapply native quoting when the token is
/// a plain identifier. Everything else passes through untouched.
fn requote(name: &str, open: char, close: char) -> String {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return String::new();
    }

    let inner = strip_quoting(trimmed, open, close);

    if is_plain_identifier(inner) {
        format!("{open}{inner}{close}")
    } else {
        trimmed.to_string()
    }
}

fn strip_quoting(token: &str, open: char, close: char) -> &str {
    let bytes = token.as_bytes();
    if bytes.len() >= 2 {
        let first = bytes[0] as char;
        let last = bytes[bytes.len() - 1] as char;
        if (first == '[' && last == ']') || (first == open && last == close) {
            return &token[1..token.len() - 1];
        }
    }
    token
}

/// Plain identifiers are alphanumeric/underscore/dollar runs that are not
/// pure numeric literals.
fn is_plain_identifier(token: &str) -> bool {
    !token.is_empty()
        && token
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
        && !token.chars().all(|c| c.is_ascii_digit())
}
