use chrono::NaiveDateTime;
use clap::ValueEnum;
use serde_json::Value as JsonValue;

/// Values that can be stored in a database row or used as command parameters.
///
/// One enum is shared across backends so the builder, executor, and reader
/// never branch on driver types:
/// ```rust
/// use sql_dataport::prelude::*;
///
/// let params = vec![
///     SqlValue::Int(1),
///     SqlValue::Text("alice".into()),
///     SqlValue::Bool(true),
/// ];
/// # let _ = params;
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    /// Integer value (64-bit)
    Int(i64),
    /// Floating point value (64-bit)
    Float(f64),
    /// Text/string value
    Text(String),
    /// Single character, produced for fixed-width `char(1)` columns
    Char(char),
    /// Boolean value
    Bool(bool),
    /// Timestamp value
    Timestamp(NaiveDateTime),
    /// NULL value
    Null,
    /// JSON value
    Json(JsonValue),
    /// Binary data
    Blob(Vec<u8>),
}

impl SqlValue {
    /// Check if this value is NULL
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    #[must_use]
    pub fn as_int(&self) -> Option<&i64> {
        if let SqlValue::Int(value) = self {
            Some(value)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        if let SqlValue::Text(value) = self {
            Some(value)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_char(&self) -> Option<char> {
        if let SqlValue::Char(value) = self {
            Some(*value)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_bool(&self) -> Option<&bool> {
        if let SqlValue::Bool(value) = self {
            return Some(value);
        } else if let Some(i) = self.as_int() {
            if *i == 1 {
                return Some(&true);
            } else if *i == 0 {
                return Some(&false);
            }
        }
        None
    }

    #[must_use]
    pub fn as_timestamp(&self) -> Option<NaiveDateTime> {
        if let SqlValue::Timestamp(value) = self {
            return Some(*value);
        } else if let Some(s) = self.as_text() {
            // Try "YYYY-MM-DD HH:MM:SS"
            if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
                return Some(dt);
            }
            // Try "YYYY-MM-DD HH:MM:SS.SSS"
            if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S.%3f") {
                return Some(dt);
            }
        }
        None
    }

    #[must_use]
    pub fn as_float(&self) -> Option<f64> {
        if let SqlValue::Float(value) = self {
            Some(*value)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_blob(&self) -> Option<&[u8]> {
        if let SqlValue::Blob(bytes) = self {
            Some(bytes)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_json(&self) -> Option<&JsonValue> {
        if let SqlValue::Json(value) = self {
            Some(value)
        } else {
            None
        }
    }
}

/// The declared kind of a parameter or binder target.
///
/// Used for zero-value semantics (a null backend result materializes as the
/// kind's zero when the target is a value kind) and for generic coercion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SqlKind {
    Int,
    Float,
    Text,
    Char,
    Bool,
    Timestamp,
    Json,
    Blob,
}

impl SqlKind {
    /// The zero value for value kinds, `Null` for reference-like kinds.
    #[must_use]
    pub fn zero_value(self) -> SqlValue {
        match self {
            SqlKind::Int => SqlValue::Int(0),
            SqlKind::Float => SqlValue::Float(0.0),
            SqlKind::Bool => SqlValue::Bool(false),
            SqlKind::Char => SqlValue::Char('\0'),
            SqlKind::Text | SqlKind::Timestamp | SqlKind::Json | SqlKind::Blob => SqlValue::Null,
        }
    }
}

/// The database type supported by this crate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum)]
pub enum DatabaseType {
    /// `MySQL` database
    MySql,
    /// `SQLite` database
    Sqlite,
}

/// Generic value coercion, the "type-conversion collaborator" the reader and
/// binder delegate to. JSON decode goes through `serde_json`.
pub mod coerce {
    use super::{JsonValue, SqlKind, SqlValue};

    #[must_use]
    pub fn to_i64(value: &SqlValue) -> Option<i64> {
        match value {
            SqlValue::Int(i) => Some(*i),
            SqlValue::Float(f) => Some(*f as i64),
            SqlValue::Bool(b) => Some(i64::from(*b)),
            SqlValue::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    #[must_use]
    pub fn to_f64(value: &SqlValue) -> Option<f64> {
        match value {
            SqlValue::Float(f) => Some(*f),
            SqlValue::Int(i) => Some(*i as f64),
            SqlValue::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Render any value as display text. `Null` renders as the empty string.
    #[must_use]
    pub fn to_text(value: &SqlValue) -> String {
        match value {
            SqlValue::Text(s) => s.clone(),
            SqlValue::Char(c) => c.to_string(),
            SqlValue::Int(i) => i.to_string(),
            SqlValue::Float(f) => f.to_string(),
            SqlValue::Bool(b) => b.to_string(),
            SqlValue::Timestamp(dt) => dt.format("%Y-%m-%d %H:%M:%S").to_string(),
            SqlValue::Json(j) => j.to_string(),
            SqlValue::Blob(b) => b.iter().map(|byte| format!("{byte:02x}")).collect(),
            SqlValue::Null => String::new(),
        }
    }

    /// Attempt a JSON decode; text that is not valid JSON yields `None`.
    #[must_use]
    pub fn to_json(value: &SqlValue) -> Option<JsonValue> {
        match value {
            SqlValue::Json(j) => Some(j.clone()),
            SqlValue::Text(s) => serde_json::from_str(s).ok(),
            _ => None,
        }
    }

    /// Lift a JSON value into the shared value enum.
    #[must_use]
    pub fn from_json(value: &JsonValue) -> SqlValue {
        match value {
            JsonValue::Null => SqlValue::Null,
            JsonValue::Bool(b) => SqlValue::Bool(*b),
            JsonValue::Number(n) => n.as_i64().map_or_else(
                || n.as_f64().map_or(SqlValue::Null, SqlValue::Float),
                SqlValue::Int,
            ),
            JsonValue::String(s) => SqlValue::Text(s.clone()),
            JsonValue::Array(_) | JsonValue::Object(_) => SqlValue::Json(value.clone()),
        }
    }

    /// Coerce a value to the requested kind.
    ///
    /// A `Null` input becomes the kind's zero value, so binder targets with
    /// value kinds never observe the backend null marker.
    #[must_use]
    pub fn to_kind(value: &SqlValue, kind: SqlKind) -> SqlValue {
        if value.is_null() {
            return kind.zero_value();
        }
        match kind {
            SqlKind::Int => to_i64(value).map_or(SqlValue::Null, SqlValue::Int),
            SqlKind::Float => to_f64(value).map_or(SqlValue::Null, SqlValue::Float),
            SqlKind::Bool => value
                .as_bool()
                .copied()
                .map_or(SqlValue::Null, SqlValue::Bool),
            SqlKind::Char => {
                let text = to_text(value);
                text.chars().next().map_or(SqlValue::Null, SqlValue::Char)
            }
            SqlKind::Text => SqlValue::Text(to_text(value)),
            SqlKind::Timestamp => value
                .as_timestamp()
                .map_or(SqlValue::Null, SqlValue::Timestamp),
            SqlKind::Json => to_json(value).map_or_else(
                || SqlValue::Text(to_text(value)),
                SqlValue::Json,
            ),
            SqlKind::Blob => match value {
                SqlValue::Blob(b) => SqlValue::Blob(b.clone()),
                other => SqlValue::Blob(to_text(other).into_bytes()),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bool_from_int() {
        assert_eq!(SqlValue::Int(1).as_bool(), Some(&true));
        assert_eq!(SqlValue::Int(0).as_bool(), Some(&false));
        assert_eq!(SqlValue::Int(5).as_bool(), None);
    }

    #[test]
    fn timestamp_from_text() {
        let v = SqlValue::Text("2024-01-03 10:30:00".into());
        assert_eq!(
            v.as_timestamp(),
            NaiveDateTime::parse_from_str("2024-01-03 10:30:00", "%Y-%m-%d %H:%M:%S").ok()
        );
    }

    #[test]
    fn null_coerces_to_zero_for_value_kinds() {
        assert_eq!(coerce::to_kind(&SqlValue::Null, SqlKind::Int), SqlValue::Int(0));
        assert_eq!(
            coerce::to_kind(&SqlValue::Null, SqlKind::Bool),
            SqlValue::Bool(false)
        );
        assert_eq!(coerce::to_kind(&SqlValue::Null, SqlKind::Text), SqlValue::Null);
    }

    #[test]
    fn json_decode_falls_back_to_text() {
        let v = SqlValue::Text("not json".into());
        assert_eq!(
            coerce::to_kind(&v, SqlKind::Json),
            SqlValue::Text("not json".into())
        );
        let ok = SqlValue::Text(r#"{"a":1}"#.into());
        assert_eq!(
            coerce::to_kind(&ok, SqlKind::Json),
            SqlValue::Json(serde_json::json!({"a":1}))
        );
    }
}
