//! `MySQL` driver glue over the `mysql` crate.
//!
//! The driver speaks positional `?` placeholders only, so dialect-named
//! parameters (`@p1`) are rewritten back to positional form here, at the
//! wire boundary, in order of appearance.

use mysql::consts::ColumnType;
use mysql::prelude::Queryable;
use mysql::{Params, Value};

use crate::error::DataAccessError;
use crate::params::{ParamDirection, ParameterList, utf8_len};
use crate::reader::{ColumnInfo, MaterializedResult};
use crate::types::SqlValue;

pub(crate) fn open(url: &str) -> Result<mysql::Conn, DataAccessError> {
    let opts = mysql::Opts::from_url(url).map_err(|e| {
        DataAccessError::ConnectionError(format!("invalid mysql connection string: {e}"))
    })?;
    mysql::Conn::new(opts).map_err(|e| {
        DataAccessError::ConnectionError(format!("failed to connect to mysql: {e}"))
    })
}

pub(crate) fn change_database(conn: &mut mysql::Conn, database: &str) -> Result<(), DataAccessError> {
    conn.query_drop(format!("use `{database}`"))?;
    Ok(())
}

/// Apply a per-statement execution ceiling, in seconds.
pub(crate) fn set_timeout(conn: &mut mysql::Conn, seconds: i32) -> Result<(), DataAccessError> {
    let millis = i64::from(seconds) * 1000;
    conn.query_drop(format!("set session max_execution_time={millis}"))?;
    Ok(())
}

/// Bind a middleware value to a wire value.
pub(crate) fn convert_value(value: &SqlValue) -> Value {
    match value {
        SqlValue::Int(i) => Value::Int(*i),
        SqlValue::Float(f) => Value::Double(*f),
        SqlValue::Text(s) => Value::Bytes(s.clone().into_bytes()),
        SqlValue::Char(c) => Value::Bytes(c.to_string().into_bytes()),
        SqlValue::Bool(b) => Value::Int(i64::from(*b)),
        SqlValue::Timestamp(dt) => Value::Bytes(dt.format("%F %T%.f").to_string().into_bytes()),
        SqlValue::Null => Value::NULL,
        SqlValue::Json(j) => Value::Bytes(j.to_string().into_bytes()),
        SqlValue::Blob(bytes) => Value::Bytes(bytes.clone()),
    }
}

fn extract_value(value: Value, binary: bool) -> SqlValue {
    match value {
        Value::NULL => SqlValue::Null,
        Value::Int(i) => SqlValue::Int(i),
        Value::UInt(u) => SqlValue::Int(i64::try_from(u).unwrap_or(i64::MAX)),
        Value::Float(f) => SqlValue::Float(f64::from(f)),
        Value::Double(d) => SqlValue::Float(d),
        Value::Bytes(b) if binary => SqlValue::Blob(b),
        Value::Bytes(b) => SqlValue::Text(String::from_utf8_lossy(&b).into_owned()),
        Value::Date(y, mo, d, h, mi, s, us) => chrono::NaiveDate::from_ymd_opt(
            i32::from(y),
            u32::from(mo),
            u32::from(d),
        )
        .and_then(|date| date.and_hms_micro_opt(u32::from(h), u32::from(mi), u32::from(s), us))
        .map_or(SqlValue::Null, SqlValue::Timestamp),
        Value::Time(neg, days, h, mi, s, us) => {
            let sign = if neg { "-" } else { "" };
            let hours = u32::from(h) + days * 24;
            SqlValue::Text(format!("{sign}{hours:02}:{mi:02}:{s:02}.{us:06}"))
        }
    }
}

fn is_binary_column(column_type: ColumnType) -> bool {
    matches!(
        column_type,
        ColumnType::MYSQL_TYPE_TINY_BLOB
            | ColumnType::MYSQL_TYPE_MEDIUM_BLOB
            | ColumnType::MYSQL_TYPE_LONG_BLOB
            | ColumnType::MYSQL_TYPE_BLOB
    )
}

/// Rewrite dialect-named placeholders to positional `?`, producing the wire
/// values in order of appearance. Names inside quoted literals and `--` or
/// `/* */` comments are untouched; skipped regions are copied through as
/// string slices so multi-byte text survives intact.
fn to_positional(sql: &str, params: &[(String, SqlValue)]) -> (String, Vec<Value>) {
    let mut out = String::with_capacity(sql.len());
    let mut values = Vec::new();
    let bytes = sql.as_bytes();
    let mut idx = 0;

    while idx < bytes.len() {
        let start = idx;
        match bytes[idx] {
            quote @ (b'\'' | b'"' | b'`') => {
                idx += 1;
                while idx < bytes.len() && bytes[idx] != quote {
                    idx += 1;
                }
                idx = (idx + 1).min(bytes.len());
                out.push_str(&sql[start..idx]);
            }
            b'-' if bytes.get(idx + 1) == Some(&b'-') => {
                while idx < bytes.len() && bytes[idx] != b'\n' {
                    idx += 1;
                }
                out.push_str(&sql[start..idx]);
            }
            b'/' if bytes.get(idx + 1) == Some(&b'*') => {
                idx += 2;
                while idx < bytes.len() && !(bytes[idx] == b'*' && bytes.get(idx + 1) == Some(&b'/'))
                {
                    idx += 1;
                }
                idx = (idx + 2).min(bytes.len());
                out.push_str(&sql[start..idx]);
            }
            b'@' => {
                let end = idx
                    + 1
                    + sql[idx + 1..]
                        .bytes()
                        .take_while(|c| c.is_ascii_alphanumeric() || *c == b'_')
                        .count();
                let candidate = &sql[idx..end];
                if let Some((_, value)) = params.iter().find(|(name, _)| name == candidate) {
                    out.push('?');
                    values.push(convert_value(value));
                } else {
                    out.push_str(candidate);
                }
                idx = end;
            }
            b => {
                idx += utf8_len(b);
                out.push_str(&sql[start..idx]);
            }
        }
    }

    (out, values)
}

pub(crate) fn run_query(
    conn: &mut mysql::Conn,
    sql: &str,
    params: &[(String, SqlValue)],
) -> Result<MaterializedResult, DataAccessError> {
    let (positional, values) = to_positional(sql, params);
    let result = conn.exec_iter(positional, Params::Positional(values))?;

    let columns: Vec<ColumnInfo> = result
        .columns()
        .as_ref()
        .iter()
        .map(|c| ColumnInfo {
            name: c.name_str().into_owned(),
            type_name: Some(format!("{:?}", c.column_type())),
        })
        .collect();
    let binary: Vec<bool> = result
        .columns()
        .as_ref()
        .iter()
        .map(|c| is_binary_column(c.column_type()))
        .collect();

    let mut materialized = MaterializedResult {
        columns,
        rows: Vec::new(),
    };
    for row in result {
        let row = row?;
        let values: Vec<SqlValue> = row
            .unwrap()
            .into_iter()
            .enumerate()
            .map(|(i, v)| extract_value(v, binary.get(i).copied().unwrap_or(false)))
            .collect();
        materialized.rows.push(values);
    }
    Ok(materialized)
}

pub(crate) fn run_execute(
    conn: &mut mysql::Conn,
    sql: &str,
    params: &[(String, SqlValue)],
) -> Result<usize, DataAccessError> {
    let (positional, values) = to_positional(sql, params);
    conn.exec_drop(positional, Params::Positional(values))?;
    Ok(usize::try_from(conn.affected_rows()).unwrap_or(usize::MAX))
}

/// Run a multi-statement script one statement at a time.
pub(crate) fn run_batch(conn: &mut mysql::Conn, sql: &str) -> Result<(), DataAccessError> {
    for statement in split_statements(sql) {
        conn.query_drop(statement)?;
    }
    Ok(())
}

/// Split on `;` outside quoted literals and comments.
fn split_statements(sql: &str) -> Vec<&str> {
    let bytes = sql.as_bytes();
    let mut statements = Vec::new();
    let mut start = 0;
    let mut idx = 0;

    while idx < bytes.len() {
        match bytes[idx] {
            quote @ (b'\'' | b'"' | b'`') => {
                idx += 1;
                while idx < bytes.len() && bytes[idx] != quote {
                    idx += 1;
                }
                idx += 1;
            }
            b'-' if bytes.get(idx + 1) == Some(&b'-') => {
                while idx < bytes.len() && bytes[idx] != b'\n' {
                    idx += 1;
                }
            }
            b'/' if bytes.get(idx + 1) == Some(&b'*') => {
                idx += 2;
                while idx < bytes.len() && !(bytes[idx] == b'*' && bytes.get(idx + 1) == Some(&b'/'))
                {
                    idx += 1;
                }
                idx = (idx + 2).min(bytes.len());
            }
            b';' => {
                let piece = sql[start..idx].trim();
                if !piece.is_empty() {
                    statements.push(piece);
                }
                idx += 1;
                start = idx;
            }
            _ => idx += 1,
        }
    }
    let tail = sql[start..].trim();
    if !tail.is_empty() {
        statements.push(tail);
    }
    statements
}

/// Call a stored procedure through session variables: inputs are assigned,
/// the procedure is invoked over the variables, and output-direction values
/// are selected back into the parameter list.
pub(crate) fn call_procedure(
    conn: &mut mysql::Conn,
    name: &str,
    params: &mut ParameterList,
) -> Result<(), DataAccessError> {
    let slots: Vec<String> = params
        .iter()
        .filter(|p| !p.is_return_slot())
        .map(|p| format!("@{}", p.name))
        .collect();

    for p in params.iter().filter(|p| !p.is_return_slot()) {
        if p.direction == ParamDirection::Input {
            conn.exec_drop(
                format!("set @{} = ?", p.name),
                Params::Positional(vec![convert_value(&p.value)]),
            )?;
        } else {
            conn.query_drop(format!("set @{} = null", p.name))?;
        }
    }

    conn.query_drop(format!("call `{name}`({})", slots.join(", ")))?;

    let outputs: Vec<String> = params
        .iter()
        .filter(|p| p.direction == ParamDirection::Output)
        .map(|p| p.name.clone())
        .collect();
    for output in outputs {
        let row: Option<Value> = conn.query_first(format!("select @{output}"))?;
        if let Some(param) = params.get_mut(&output) {
            param.value = row.map_or(SqlValue::Null, |v| extract_value(v, false));
        }
    }
    Ok(())
}
