//! Typed result materialization.
//!
//! Rows are materialized up front by the driver glue; the [`Reader`] is a
//! forward-only cursor over them that owns the physical command (and its
//! pooled connection) until closed.

use std::sync::Arc;

use crate::command::PhysicalSlot;
use crate::pool::ConnectionPool;
use crate::types::{SqlKind, SqlValue, coerce};

/// Metadata for one result column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnInfo {
    pub name: String,
    /// Declared backend type name, when the driver reports one.
    pub type_name: Option<String>,
}

/// One fully materialized result set.
#[derive(Debug, Clone, Default)]
pub struct MaterializedResult {
    pub columns: Vec<ColumnInfo>,
    pub rows: Vec<Vec<SqlValue>>,
}

/// Forward-only cursor over one or more result sets.
///
/// Lookup by invalid name or out-of-range ordinal yields `None`/`Null`
/// sentinels rather than panicking.
#[derive(Debug)]
pub struct Reader {
    sets: Vec<MaterializedResult>,
    set_index: usize,
    row: Option<usize>,
    pool: Option<Arc<ConnectionPool>>,
    slot: Option<PhysicalSlot>,
}

impl Reader {
    pub(crate) fn new(
        sets: Vec<MaterializedResult>,
        pool: Option<Arc<ConnectionPool>>,
        slot: Option<PhysicalSlot>,
    ) -> Self {
        Self {
            sets,
            set_index: 0,
            row: None,
            pool,
            slot,
        }
    }

    /// Build a reader over rows that are already in memory, with no attached
    /// physical command.
    #[must_use]
    pub fn from_result(result: MaterializedResult) -> Self {
        Self::new(vec![result], None, None)
    }

    fn current_set(&self) -> Option<&MaterializedResult> {
        self.sets.get(self.set_index)
    }

    #[must_use]
    pub fn field_count(&self) -> usize {
        self.current_set().map_or(0, |s| s.columns.len())
    }

    /// Ordinal of a column by name; blank or unknown names yield `None`.
    #[must_use]
    pub fn ordinal(&self, name: &str) -> Option<usize> {
        if name.is_empty() {
            return None;
        }
        self.current_set()?
            .columns
            .iter()
            .position(|c| c.name.eq_ignore_ascii_case(name))
    }

    /// Column name at an ordinal; out of range yields `None`.
    #[must_use]
    pub fn field_name(&self, ordinal: usize) -> Option<&str> {
        self.current_set()?
            .columns
            .get(ordinal)
            .map(|c| c.name.as_str())
    }

    /// Declared backend type name at an ordinal.
    #[must_use]
    pub fn field_type_name(&self, ordinal: usize) -> Option<&str> {
        self.current_set()?
            .columns
            .get(ordinal)?
            .type_name
            .as_deref()
    }

    /// Advance to the next row. Returns `false` past the end.
    pub fn read(&mut self) -> bool {
        let len = self.current_set().map_or(0, |s| s.rows.len());
        let next = self.row.map_or(0, |r| r + 1);
        if next < len {
            self.row = Some(next);
            true
        } else {
            self.row = Some(len);
            false
        }
    }

    /// Advance to the next result set. Returns `false` when none remains.
    pub fn next_result(&mut self) -> bool {
        if self.set_index + 1 < self.sets.len() {
            self.set_index += 1;
            self.row = None;
            true
        } else {
            false
        }
    }

    fn current_row(&self) -> Option<&Vec<SqlValue>> {
        let set = self.current_set()?;
        set.rows.get(self.row?)
    }

    /// Raw value at an ordinal on the current row, with the backend special
    /// cases applied: null markers map to `Null`, `char(1)` columns
    /// materialize as a character, timestamp/rowversion byte columns are
    /// byte-reversed, and declared-JSON text is decoded.
    #[must_use]
    pub fn get_value(&self, ordinal: usize) -> SqlValue {
        let Some(value) = self.current_row().and_then(|row| row.get(ordinal)) else {
            return SqlValue::Null;
        };
        let decl = self
            .field_type_name(ordinal)
            .map(|t| t.to_ascii_lowercase().replace(' ', ""));
        apply_special_cases(value, decl.as_deref())
    }

    /// Value by column name; unknown names yield `Null`.
    #[must_use]
    pub fn get_by_name(&self, name: &str) -> SqlValue {
        self.ordinal(name)
            .map_or(SqlValue::Null, |i| self.get_value(i))
    }

    /// Value at an ordinal coerced to a target kind via the generic
    /// type-conversion path.
    #[must_use]
    pub fn get_value_as(&self, ordinal: usize, kind: SqlKind) -> SqlValue {
        coerce::to_kind(&self.get_value(ordinal), kind)
    }

    /// Release the physical command and its connection. Idempotent.
    pub fn close(&mut self) {
        if let (Some(slot), Some(pool)) = (self.slot.take(), self.pool.take()) {
            if let Some(conn) = slot.take_connection() {
                pool.release(conn);
            }
        }
    }
}

impl Drop for Reader {
    fn drop(&mut self) {
        self.close();
    }
}

fn apply_special_cases(value: &SqlValue, decl: Option<&str>) -> SqlValue {
    match (value, decl) {
        (SqlValue::Null, _) => SqlValue::Null,
        (SqlValue::Text(s), Some(d)) if is_single_char_type(d) => s
            .chars()
            .next()
            .map_or(SqlValue::Null, SqlValue::Char),
        (SqlValue::Text(s), Some(d)) if d.contains("json") => serde_json::from_str(s)
            .map_or_else(|_| SqlValue::Text(s.clone()), SqlValue::Json),
        (SqlValue::Blob(b), Some(d)) if d.contains("timestamp") || d.contains("rowversion") => {
            let mut reversed = b.clone();
            reversed.reverse();
            SqlValue::Blob(reversed)
        }
        (other, _) => other.clone(),
    }
}

fn is_single_char_type(decl: &str) -> bool {
    matches!(decl, "char(1)" | "nchar(1)" | "character(1)")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> MaterializedResult {
        MaterializedResult {
            columns: vec![
                ColumnInfo {
                    name: "flag".into(),
                    type_name: Some("char(1)".into()),
                },
                ColumnInfo {
                    name: "doc".into(),
                    type_name: Some("json".into()),
                },
                ColumnInfo {
                    name: "version".into(),
                    type_name: Some("timestamp".into()),
                },
                ColumnInfo {
                    name: "plain".into(),
                    type_name: Some("text".into()),
                },
            ],
            rows: vec![vec![
                SqlValue::Text("Y".into()),
                SqlValue::Text(r#"{"a":1}"#.into()),
                SqlValue::Blob(vec![1, 2, 3]),
                SqlValue::Null,
            ]],
        }
    }

    #[test]
    fn special_case_coercions() {
        let mut r = Reader::from_result(sample());
        assert!(r.read());
        assert_eq!(r.get_value(0), SqlValue::Char('Y'));
        assert_eq!(r.get_value(1), SqlValue::Json(serde_json::json!({"a":1})));
        assert_eq!(r.get_value(2), SqlValue::Blob(vec![3, 2, 1]));
        assert_eq!(r.get_value(3), SqlValue::Null);
    }

    #[test]
    fn invalid_lookups_yield_sentinels() {
        let mut r = Reader::from_result(sample());
        assert!(r.read());
        assert_eq!(r.ordinal(""), None);
        assert_eq!(r.ordinal("nope"), None);
        assert_eq!(r.field_name(99), None);
        assert_eq!(r.get_value(99), SqlValue::Null);
        assert_eq!(r.get_by_name("nope"), SqlValue::Null);
    }

    #[test]
    fn cursor_is_forward_only() {
        let mut r = Reader::from_result(sample());
        assert_eq!(r.get_value(0), SqlValue::Null); // before first read
        assert!(r.read());
        assert!(!r.read());
        assert!(!r.read());
        assert!(!r.next_result());
    }

    #[test]
    fn json_decode_failure_falls_back_to_text() {
        let result = MaterializedResult {
            columns: vec![ColumnInfo {
                name: "doc".into(),
                type_name: Some("json".into()),
            }],
            rows: vec![vec![SqlValue::Text("not json".into())]],
        };
        let mut r = Reader::from_result(result);
        r.read();
        assert_eq!(r.get_value(0), SqlValue::Text("not json".into()));
    }
}
