use crate::builder::CommandTextBuilder;
use crate::dialect::Dialect;
use crate::error::DataAccessError;
use crate::types::SqlValue;

/// Value assigned to one column of an insert or update.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum FieldValue {
    /// Rendered through the dialect's literal formatter.
    Literal(SqlValue),
    /// Emitted verbatim (e.g. the dialect's now-expression).
    Expression(String),
}

impl FieldValue {
    pub(crate) fn render(&self, dialect: &dyn Dialect) -> String {
        match self {
            FieldValue::Literal(value) => dialect.format_literal(value),
            FieldValue::Expression(expr) => expr.clone(),
        }
    }
}

/// Mutable structured representation of one INSERT statement.
///
/// Raw SQL handed to [`InsertCommandBuilder::from_sql`] is a pass-through:
/// only SELECT text is decomposed, everything else re-emits verbatim.
#[derive(Debug, Clone, PartialEq)]
pub struct InsertCommandBuilder {
    pub table: String,
    pub(crate) columns: Vec<(String, FieldValue)>,
    raw: Option<String>,
}

impl InsertCommandBuilder {
    #[must_use]
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            columns: Vec::new(),
            raw: None,
        }
    }

    /// Wrap an existing INSERT statement verbatim.
    #[must_use]
    pub fn from_sql(sql: impl Into<String>) -> Self {
        Self {
            table: String::new(),
            columns: Vec::new(),
            raw: Some(sql.into()),
        }
    }

    /// Assign a column value; re-assigning a column replaces it in place.
    #[must_use]
    pub fn set(mut self, field: impl Into<String>, value: SqlValue) -> Self {
        self.put(field.into(), FieldValue::Literal(value));
        self
    }

    /// Assign a column a verbatim SQL expression.
    #[must_use]
    pub fn set_expression(mut self, field: impl Into<String>, expr: impl Into<String>) -> Self {
        self.put(field.into(), FieldValue::Expression(expr.into()));
        self
    }

    fn put(&mut self, field: String, value: FieldValue) {
        if let Some(existing) = self.columns.iter_mut().find(|(f, _)| *f == field) {
            existing.1 = value;
        } else {
            self.columns.push((field, value));
        }
    }
}

impl CommandTextBuilder for InsertCommandBuilder {
    fn build_command_text(&self, dialect: &dyn Dialect) -> Result<String, DataAccessError> {
        if let Some(raw) = &self.raw {
            return Ok(raw.clone());
        }
        if self.table.trim().is_empty() {
            return Err(DataAccessError::parse(
                "insert",
                "insert builder has no target table",
            ));
        }
        if self.columns.is_empty() {
            return Err(DataAccessError::parse(
                "insert",
                "insert builder has no column assignments",
            ));
        }

        let fields: Vec<String> = self
            .columns
            .iter()
            .map(|(f, _)| dialect.quote_identifier(f))
            .collect();
        let values: Vec<String> = self.columns.iter().map(|(_, v)| v.render(dialect)).collect();

        Ok(format!(
            "insert into {}({}) values({})",
            dialect.quote_identifier(&self.table),
            fields.join(", "),
            values.join(", ")
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::{MySqlDialect, SqliteDialect};

    #[test]
    fn emits_quoted_columns_and_literals() {
        let b = InsertCommandBuilder::new("account")
            .set("name", SqlValue::Text("alice".into()))
            .set("active", SqlValue::Bool(true))
            .set_expression("created", MySqlDialect.now_expression());
        let sql = b.build_command_text(&MySqlDialect).unwrap();
        assert_eq!(
            sql,
            "insert into `account`(`name`, `active`, `created`) values('alice', 1, now())"
        );
    }

    #[test]
    fn raw_text_passes_through() {
        let b = InsertCommandBuilder::from_sql("insert into t(a) values(1)");
        assert_eq!(
            b.build_command_text(&SqliteDialect).unwrap(),
            "insert into t(a) values(1)"
        );
    }

    #[test]
    fn reassignment_replaces_in_place() {
        let b = InsertCommandBuilder::new("t")
            .set("a", SqlValue::Int(1))
            .set("b", SqlValue::Int(2))
            .set("a", SqlValue::Int(9));
        let sql = b.build_command_text(&SqliteDialect).unwrap();
        assert_eq!(sql, "insert into \"t\"(\"a\", \"b\") values(9, 2)");
    }
}
