//! `SQLite` driver glue over rusqlite.

use rusqlite::ToSql;
use rusqlite::types::{Value, ValueRef};

use crate::error::DataAccessError;
use crate::reader::{ColumnInfo, MaterializedResult};
use crate::types::SqlValue;

/// Open a database file; `:memory:` and `file:` URIs pass straight through.
pub(crate) fn open(path: &str) -> Result<rusqlite::Connection, DataAccessError> {
    rusqlite::Connection::open(path).map_err(|e| {
        DataAccessError::ConnectionError(format!("failed to open sqlite database `{path}`: {e}"))
    })
}

/// Bind a middleware value to a `SQLite` value.
pub(crate) fn convert_value(value: &SqlValue) -> Value {
    match value {
        SqlValue::Int(i) => Value::Integer(*i),
        SqlValue::Float(f) => Value::Real(*f),
        SqlValue::Text(s) => Value::Text(s.clone()),
        SqlValue::Char(c) => Value::Text(c.to_string()),
        SqlValue::Bool(b) => Value::Integer(i64::from(*b)),
        SqlValue::Timestamp(dt) => Value::Text(dt.format("%F %T%.f").to_string()),
        SqlValue::Null => Value::Null,
        SqlValue::Json(j) => Value::Text(j.to_string()),
        SqlValue::Blob(bytes) => Value::Blob(bytes.clone()),
    }
}

fn extract_value(row: &rusqlite::Row, idx: usize) -> Result<SqlValue, DataAccessError> {
    match row.get_ref(idx) {
        Err(e) => Err(DataAccessError::SqliteError(e)),
        Ok(ValueRef::Null) => Ok(SqlValue::Null),
        Ok(ValueRef::Integer(i)) => Ok(SqlValue::Int(i)),
        Ok(ValueRef::Real(f)) => Ok(SqlValue::Float(f)),
        Ok(ValueRef::Text(bytes)) => {
            Ok(SqlValue::Text(String::from_utf8_lossy(bytes).into_owned()))
        }
        Ok(ValueRef::Blob(b)) => Ok(SqlValue::Blob(b.to_vec())),
    }
}

/// Named parameters present in the text, with the dialect prefix applied.
/// rusqlite rejects bindings for names the statement does not use, so the
/// list is filtered against the SQL first.
fn bind_pairs(sql: &str, params: &[(String, SqlValue)]) -> Vec<(String, Value)> {
    params
        .iter()
        .filter(|(name, _)| name_in_sql(sql, name))
        .map(|(name, value)| (name.clone(), convert_value(value)))
        .collect()
}

fn name_in_sql(sql: &str, prefixed_name: &str) -> bool {
    let mut start = 0;
    while let Some(found) = sql[start..].find(prefixed_name) {
        let at = start + found;
        let end = at + prefixed_name.len();
        let boundary = sql[end..]
            .chars()
            .next()
            .is_none_or(|c| !(c.is_ascii_alphanumeric() || c == '_'));
        if boundary {
            return true;
        }
        start = end;
    }
    false
}

/// Run a query and materialize every row up front.
pub(crate) fn run_query(
    conn: &rusqlite::Connection,
    sql: &str,
    params: &[(String, SqlValue)],
) -> Result<MaterializedResult, DataAccessError> {
    let mut stmt = conn.prepare(sql)?;

    let columns: Vec<ColumnInfo> = stmt
        .columns()
        .iter()
        .map(|c| ColumnInfo {
            name: c.name().to_string(),
            type_name: c.decl_type().map(str::to_string),
        })
        .collect();

    let pairs = bind_pairs(sql, params);
    let refs: Vec<(&str, &dyn ToSql)> = pairs
        .iter()
        .map(|(name, value)| (name.as_str(), value as &dyn ToSql))
        .collect();

    let mut rows = stmt.query(&refs[..])?;
    let mut result = MaterializedResult {
        columns,
        rows: Vec::new(),
    };
    while let Some(row) = rows.next()? {
        let mut values = Vec::with_capacity(result.columns.len());
        for i in 0..result.columns.len() {
            values.push(extract_value(row, i)?);
        }
        result.rows.push(values);
    }

    Ok(result)
}

/// Run a DML statement and return the affected-row count.
pub(crate) fn run_execute(
    conn: &rusqlite::Connection,
    sql: &str,
    params: &[(String, SqlValue)],
) -> Result<usize, DataAccessError> {
    let mut stmt = conn.prepare(sql)?;
    let pairs = bind_pairs(sql, params);
    let refs: Vec<(&str, &dyn ToSql)> = pairs
        .iter()
        .map(|(name, value)| (name.as_str(), value as &dyn ToSql))
        .collect();
    Ok(stmt.execute(&refs[..])?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn binds_only_names_present_in_sql() {
        let params = vec![
            ("@p1".to_string(), SqlValue::Int(1)),
            ("@p2".to_string(), SqlValue::Int(2)),
        ];
        let pairs = bind_pairs("select @p1", &params);
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].0, "@p1");
    }

    #[test]
    fn name_matching_respects_word_boundaries() {
        assert!(!name_in_sql("select @p10", "@p1"));
        assert!(name_in_sql("select @p1, @p10", "@p1"));
    }

    #[test]
    fn query_round_trip_on_memory_db() {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        conn.execute_batch("create table t(a int, b text)").unwrap();
        run_execute(
            &conn,
            "insert into t(a, b) values(@p1, @p2)",
            &[
                ("@p1".to_string(), SqlValue::Int(7)),
                ("@p2".to_string(), SqlValue::Text("x".into())),
            ],
        )
        .unwrap();
        let result = run_query(&conn, "select a, b from t", &[]).unwrap();
        assert_eq!(result.rows.len(), 1);
        assert_eq!(result.rows[0][0], SqlValue::Int(7));
        assert_eq!(result.columns[0].name, "a");
    }
}
