use crate::builder::insert::FieldValue;
use crate::builder::{CommandTextBuilder, WhereOperator, join_where};
use crate::dialect::Dialect;
use crate::error::DataAccessError;
use crate::types::SqlValue;

/// Mutable structured representation of one UPDATE statement.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateCommandBuilder {
    pub table: String,
    pub(crate) assignments: Vec<(String, FieldValue)>,
    pub where_fragments: Vec<String>,
    pub where_operator: WhereOperator,
    raw: Option<String>,
}

impl UpdateCommandBuilder {
    #[must_use]
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            assignments: Vec::new(),
            where_fragments: Vec::new(),
            where_operator: WhereOperator::And,
            raw: None,
        }
    }

    /// Wrap an existing UPDATE statement verbatim.
    #[must_use]
    pub fn from_sql(sql: impl Into<String>) -> Self {
        Self {
            table: String::new(),
            assignments: Vec::new(),
            where_fragments: Vec::new(),
            where_operator: WhereOperator::And,
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

    /// Append a where-clause fragment.
    #[must_use]
    pub fn query(mut self, fragment: impl Into<String>) -> Self {
        self.where_fragments.push(fragment.into());
        self
    }

    #[must_use]
    pub fn where_operator(mut self, operator: WhereOperator) -> Self {
        self.where_operator = operator;
        self
    }

    fn put(&mut self, field: String, value: FieldValue) {
        if let Some(existing) = self.assignments.iter_mut().find(|(f, _)| *f == field) {
            existing.1 = value;
        } else {
            self.assignments.push((field, value));
        }
    }
}

impl CommandTextBuilder for UpdateCommandBuilder {
    fn build_command_text(&self, dialect: &dyn Dialect) -> Result<String, DataAccessError> {
        if let Some(raw) = &self.raw {
            return Ok(raw.clone());
        }
        if self.table.trim().is_empty() {
            return Err(DataAccessError::parse(
                "update",
                "update builder has no target table",
            ));
        }
        if self.assignments.is_empty() {
            return Err(DataAccessError::parse(
                "update",
                "update builder has no assignments",
            ));
        }

        let sets: Vec<String> = self
            .assignments
            .iter()
            .map(|(f, v)| format!("{} = {}", dialect.quote_identifier(f), v.render(dialect)))
            .collect();

        let mut text = format!(
            "update {} set {}",
            dialect.quote_identifier(&self.table),
            sets.join(", ")
        );

        let where_clause = join_where(&self.where_fragments, self.where_operator);
        if !where_clause.is_empty() {
            text.push_str(" where ");
            text.push_str(&where_clause);
        }

        Ok(text)
    }
}
