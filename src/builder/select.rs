use crate::builder::{CommandTextBuilder, WhereOperator, join_where};
use crate::dialect::Dialect;
use crate::error::DataAccessError;

/// Mutable structured representation of one SELECT statement.
///
/// Built either by direct mutation or by parsing raw SQL text via
/// [`SelectCommandBuilder::from_sql`]; parse and re-emit are round-trip
/// stable for any accepted input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectCommandBuilder {
    /// Target table name (unquoted), or a verbatim table expression when
    /// `custom_table_expression` is set.
    pub table: String,
    /// When set, `table` is emitted verbatim instead of being quoted.
    pub custom_table_expression: bool,
    /// Field list; defaults to `*`.
    pub fields: Vec<String>,
    /// Where-clause fragments, joined by `where_operator` on emission.
    pub where_fragments: Vec<String>,
    pub where_operator: WhereOperator,
    /// Free-text SQL between the table name and `where`, typically join
    /// clauses. Deliberately opaque: preserved, never parsed.
    pub where_before: String,
    /// Order-by fragments.
    pub order_by: Vec<String>,
    pub skip: Option<u64>,
    pub take: Option<u64>,
}

impl SelectCommandBuilder {
    #[must_use]
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            custom_table_expression: false,
            fields: vec!["*".to_string()],
            where_fragments: Vec::new(),
            where_operator: WhereOperator::And,
            where_before: String::new(),
            order_by: Vec::new(),
            skip: None,
            take: None,
        }
    }

    /// Decompose raw SQL text into builder state.
    ///
    /// # Errors
    ///
    /// Returns a `ParseError` when the text lacks the `select` or `from`
    /// keyword.
    pub fn from_sql(sql: &str) -> Result<Self, DataAccessError> {
        super::parse::parse_select(sql, false)
    }

    /// Like [`Self::from_sql`], but the table expression is kept verbatim
    /// (quote characters are not stripped).
    ///
    /// # Errors
    ///
    /// Same failure modes as [`Self::from_sql`].
    pub fn from_sql_custom_table(sql: &str) -> Result<Self, DataAccessError> {
        super::parse::parse_select(sql, true)
    }

    /// Replace the field list.
    #[must_use]
    pub fn select_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields = fields.into_iter().map(Into::into).collect();
        if self.fields.is_empty() {
            self.fields.push("*".to_string());
        }
        self
    }

    /// Append a where-clause fragment.
    #[must_use]
    pub fn query(mut self, fragment: impl Into<String>) -> Self {
        self.where_fragments.push(fragment.into());
        self
    }

    /// Append an order-by fragment.
    #[must_use]
    pub fn sort(mut self, fragment: impl Into<String>) -> Self {
        self.order_by.push(fragment.into());
        self
    }

    /// Set the free-text reference/join descriptor emitted between the table
    /// name and the where clause.
    #[must_use]
    pub fn reference(mut self, text: impl Into<String>) -> Self {
        self.where_before = text.into();
        self
    }

    #[must_use]
    pub fn skip(mut self, skip: u64) -> Self {
        self.skip = Some(skip);
        self
    }

    #[must_use]
    pub fn take(mut self, take: u64) -> Self {
        self.take = Some(take);
        self
    }

    #[must_use]
    pub fn where_operator(mut self, operator: WhereOperator) -> Self {
        self.where_operator = operator;
        self
    }
}

impl CommandTextBuilder for SelectCommandBuilder {
    fn build_command_text(&self, dialect: &dyn Dialect) -> Result<String, DataAccessError> {
        if self.table.trim().is_empty() {
            return Err(DataAccessError::parse(
                "select",
                "select builder has no target table",
            ));
        }

        let table = if self.custom_table_expression {
            self.table.clone()
        } else {
            dialect.quote_identifier(&self.table)
        };

        let mut text = format!("select {} from {}", self.fields.join(", "), table);

        if !self.where_before.trim().is_empty() {
            text.push(' ');
            text.push_str(self.where_before.trim());
        }

        let where_clause = join_where(&self.where_fragments, self.where_operator);
        if !where_clause.is_empty() {
            text.push_str(" where ");
            text.push_str(&where_clause);
        }

        if !self.order_by.is_empty() {
            text.push_str(" order by ");
            text.push_str(&self.order_by.join(", "));
        }

        if let Some(pagination) = dialect.pagination_clause(self.skip, self.take) {
            text.push(' ');
            text.push_str(&pagination);
        }

        Ok(text)
    }
}
