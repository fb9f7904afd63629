//! Ordered, named command parameters.
//!
//! A parameter carries a name (blank names mark the return-value slot), a
//! value, a declared kind, a direction, and an ordered overlay of
//! backend-specific overrides applied after core binding.

use crate::error::DataAccessError;
use crate::types::{SqlKind, SqlValue};

/// Direction of a command parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamDirection {
    Input,
    Output,
    ReturnValue,
}

/// One command parameter.
#[derive(Debug, Clone)]
pub struct Parameter {
    /// Bare name, without the dialect prefix. Blank marks the return slot.
    pub name: String,
    pub value: SqlValue,
    pub declared_kind: SqlKind,
    pub direction: ParamDirection,
    /// Ordered (key, value) overrides applied after core binding.
    pub overrides: Vec<(String, String)>,
}

impl Parameter {
    #[must_use]
    pub fn new(name: impl Into<String>, value: SqlValue) -> Self {
        let declared_kind = kind_of(&value);
        Self {
            name: name.into(),
            value,
            declared_kind,
            direction: ParamDirection::Input,
            overrides: Vec::new(),
        }
    }

    #[must_use]
    pub fn output(name: impl Into<String>, declared_kind: SqlKind) -> Self {
        Self {
            name: name.into(),
            value: SqlValue::Null,
            declared_kind,
            direction: ParamDirection::Output,
            overrides: Vec::new(),
        }
    }

    /// The anonymous return-value slot.
    #[must_use]
    pub fn return_slot() -> Self {
        Self {
            name: String::new(),
            value: SqlValue::Null,
            declared_kind: SqlKind::Int,
            direction: ParamDirection::ReturnValue,
            overrides: Vec::new(),
        }
    }

    #[must_use]
    pub fn is_return_slot(&self) -> bool {
        self.name.is_empty() || self.direction == ParamDirection::ReturnValue
    }

    /// Append a backend-specific override.
    pub fn push_override(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.overrides.push((key.into(), value.into()));
    }

    /// Validate that the value can serve as the declared kind.
    ///
    /// # Errors
    ///
    /// Returns a `ParameterError` when the value cannot be coerced.
    pub fn check_binding(&self) -> Result<(), DataAccessError> {
        use crate::types::coerce;
        if self.value.is_null() {
            return Ok(());
        }
        let ok = match self.declared_kind {
            SqlKind::Int => coerce::to_i64(&self.value).is_some(),
            SqlKind::Float => coerce::to_f64(&self.value).is_some(),
            SqlKind::Bool => self.value.as_bool().is_some(),
            SqlKind::Timestamp => self.value.as_timestamp().is_some(),
            SqlKind::Json => coerce::to_json(&self.value).is_some(),
            SqlKind::Text | SqlKind::Char | SqlKind::Blob => true,
        };
        if ok {
            Ok(())
        } else {
            Err(DataAccessError::parameter(
                self.name.clone(),
                format!(
                    "value {:?} cannot be bound as {:?}",
                    self.value, self.declared_kind
                ),
            ))
        }
    }
}

fn kind_of(value: &SqlValue) -> SqlKind {
    match value {
        SqlValue::Int(_) => SqlKind::Int,
        SqlValue::Float(_) => SqlKind::Float,
        SqlValue::Char(_) => SqlKind::Char,
        SqlValue::Bool(_) => SqlKind::Bool,
        SqlValue::Timestamp(_) => SqlKind::Timestamp,
        SqlValue::Json(_) => SqlKind::Json,
        SqlValue::Blob(_) => SqlKind::Blob,
        SqlValue::Text(_) | SqlValue::Null => SqlKind::Text,
    }
}

/// Ordered list of parameters with unique names.
#[derive(Debug, Clone, Default)]
pub struct ParameterList {
    items: Vec<Parameter>,
}

impl ParameterList {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a parameter; a parameter with the same name is replaced in place,
    /// keeping the original ordinal position.
    pub fn push(&mut self, parameter: Parameter) {
        if let Some(existing) = self
            .items
            .iter_mut()
            .find(|p| !p.name.is_empty() && p.name == parameter.name)
        {
            *existing = parameter;
        } else {
            self.items.push(parameter);
        }
    }

    /// Convenience: add an input parameter from a name and value.
    pub fn add(&mut self, name: impl Into<String>, value: SqlValue) {
        self.push(Parameter::new(name, value));
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Parameter> {
        self.items.iter().find(|p| p.name == name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Parameter> {
        self.items.iter_mut().find(|p| p.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Parameter> {
        self.items.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Parameter> {
        self.items.iter_mut()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Input-direction parameters in declaration order.
    pub fn inputs(&self) -> impl Iterator<Item = &Parameter> {
        self.items
            .iter()
            .filter(|p| p.direction == ParamDirection::Input)
    }

    #[must_use]
    pub fn return_slot(&self) -> Option<&Parameter> {
        self.items.iter().find(|p| p.is_return_slot())
    }

    /// Append a return-value slot if the list has none yet.
    pub fn ensure_return_slot(&mut self) {
        if self.return_slot().is_none() {
            self.items.push(Parameter::return_slot());
        }
    }

    /// Validate every parameter binding.
    ///
    /// # Errors
    ///
    /// Propagates the first `ParameterError`.
    pub fn check_bindings(&self) -> Result<(), DataAccessError> {
        for p in &self.items {
            p.check_binding()?;
        }
        Ok(())
    }
}

/// Whether the SQL text uses bare positional `?` placeholders (outside string
/// literals and comments).
#[must_use]
pub fn has_positional_placeholders(sql: &str) -> bool {
    let mut found = false;
    scan_placeholders(sql, |_| {
        found = true;
        None
    });
    found
}

/// Rewrite positional `?` placeholders to dialect parameter names, in
/// declaration order of the input parameters.
///
/// # Errors
///
/// Returns a `ParameterError` when the text contains more `?` markers than
/// there are input parameters.
pub fn rewrite_positional(
    sql: &str,
    prefix: char,
    params: &ParameterList,
) -> Result<String, DataAccessError> {
    let names: Vec<&str> = params.inputs().map(|p| p.name.as_str()).collect();
    let mut next = 0usize;
    let mut overflow = false;
    let rewritten = scan_placeholders(sql, |_| {
        if next < names.len() {
            let replacement = format!("{prefix}{}", names[next]);
            next += 1;
            Some(replacement)
        } else {
            overflow = true;
            None
        }
    });
    if overflow {
        return Err(DataAccessError::parameter(
            "?",
            format!("more positional placeholders than parameters in `{sql}`"),
        ));
    }
    Ok(rewritten)
}

/// Walk the SQL byte-by-byte, skipping single/double-quoted literals and
/// `--`/`/* */` comments, invoking `replace` for each bare `?`.
fn scan_placeholders(sql: &str, mut replace: impl FnMut(usize) -> Option<String>) -> String {
    #[derive(Clone, Copy)]
    enum State {
        Normal,
        SingleQuoted,
        DoubleQuoted,
        LineComment,
        BlockComment,
    }

    let bytes = sql.as_bytes();
    let mut out = String::with_capacity(sql.len());
    let mut state = State::Normal;
    let mut idx = 0;
    let mut ordinal = 0usize;

    while idx < bytes.len() {
        let b = bytes[idx];
        match state {
            State::Normal => match b {
                b'\'' => state = State::SingleQuoted,
                b'"' => state = State::DoubleQuoted,
                b'-' if bytes.get(idx + 1) == Some(&b'-') => state = State::LineComment,
                b'/' if bytes.get(idx + 1) == Some(&b'*') => state = State::BlockComment,
                b'?' => {
                    if let Some(replacement) = replace(ordinal) {
                        out.push_str(&replacement);
                        ordinal += 1;
                        idx += 1;
                        continue;
                    }
                    ordinal += 1;
                }
                _ => {}
            },
            State::SingleQuoted => {
                if b == b'\'' {
                    if bytes.get(idx + 1) == Some(&b'\'') {
                        out.push(b as char);
                        idx += 1;
                    } else {
                        state = State::Normal;
                    }
                }
            }
            State::DoubleQuoted => {
                if b == b'"' {
                    state = State::Normal;
                }
            }
            State::LineComment => {
                if b == b'\n' {
                    state = State::Normal;
                }
            }
            State::BlockComment => {
                if b == b'*' && bytes.get(idx + 1) == Some(&b'/') {
                    out.push('*');
                    idx += 1;
                    state = State::Normal;
                }
            }
        }
        // Multi-byte UTF-8 sequences are copied through untouched.
        let ch_len = utf8_len(b);
        out.push_str(&sql[idx..idx + ch_len]);
        idx += ch_len;
    }

    out
}

pub(crate) fn utf8_len(first_byte: u8) -> usize {
    match first_byte {
        b if b < 0x80 => 1,
        b if b >= 0xF0 => 4,
        b if b >= 0xE0 => 3,
        _ => 2,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn list(names: &[&str]) -> ParameterList {
        let mut l = ParameterList::new();
        for n in names {
            l.add(*n, SqlValue::Int(1));
        }
        l
    }

    #[test]
    fn rewrites_in_declaration_order() {
        let params = list(&["p1", "p2"]);
        let sql = "select * from t where a = ? and b = ?";
        let out = rewrite_positional(sql, '@', &params).unwrap();
        assert_eq!(out, "select * from t where a = @p1 and b = @p2");
    }

    #[test]
    fn skips_literals_and_comments() {
        let params = list(&["p1"]);
        let sql = "select '?' -- ?\n from t where a = ?";
        let out = rewrite_positional(sql, '@', &params).unwrap();
        assert_eq!(out, "select '?' -- ?\n from t where a = @p1");
    }

    #[test]
    fn too_many_placeholders_is_an_error() {
        let params = list(&["p1"]);
        let err = rewrite_positional("? ?", '@', &params).unwrap_err();
        assert!(matches!(err, DataAccessError::ParameterError { .. }));
    }

    #[test]
    fn detects_positional_style() {
        assert!(has_positional_placeholders("select ?"));
        assert!(!has_positional_placeholders("select '?'"));
        assert!(!has_positional_placeholders("select @p1"));
    }

    #[test]
    fn duplicate_names_replace_in_place() {
        let mut l = ParameterList::new();
        l.add("a", SqlValue::Int(1));
        l.add("b", SqlValue::Int(2));
        l.add("a", SqlValue::Int(9));
        assert_eq!(l.len(), 2);
        assert_eq!(l.get("a").unwrap().value, SqlValue::Int(9));
        assert_eq!(l.iter().next().unwrap().name, "a");
    }

    #[test]
    fn return_slot_is_appended_once() {
        let mut l = list(&["p1"]);
        l.ensure_return_slot();
        l.ensure_return_slot();
        assert_eq!(l.len(), 2);
        assert!(l.return_slot().is_some());
    }

    #[test]
    fn outputs_are_excluded_from_inputs() {
        let mut l = ParameterList::new();
        l.add("p1", SqlValue::Int(1));
        l.push(Parameter::output("o1", SqlKind::Text));
        l.push(Parameter::return_slot());
        let names: Vec<&str> = l.inputs().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["p1"]);
        assert_eq!(l.get("o1").unwrap().direction, ParamDirection::Output);
    }

    #[test]
    fn overrides_keep_insertion_order() {
        let mut p = Parameter::new("p1", SqlValue::Int(1));
        p.push_override("charset", "utf8");
        p.push_override("collation", "binary");
        assert_eq!(p.overrides[0].0, "charset");
        assert_eq!(p.overrides[1].0, "collation");
    }

    #[test]
    fn bad_binding_is_surfaced() {
        let mut p = Parameter::new("n", SqlValue::Text("abc".into()));
        p.declared_kind = SqlKind::Int;
        assert!(p.check_binding().is_err());
    }
}
