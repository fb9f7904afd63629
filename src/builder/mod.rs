//! Structured command builders.
//!
//! Each builder is a mutable representation of one statement that can emit
//! dialect-correct SQL. The select builder can additionally ingest raw SQL
//! text, decomposing it back into structured state (see [`parse`]).

mod insert;
mod parse;
mod select;
mod update;

pub use insert::InsertCommandBuilder;
pub use select::SelectCommandBuilder;
pub use update::UpdateCommandBuilder;

use crate::dialect::Dialect;
use crate::error::DataAccessError;

/// Boolean operator joining where-clause fragments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WhereOperator {
    #[default]
    And,
    Or,
}

impl WhereOperator {
    #[must_use]
    pub fn keyword(self) -> &'static str {
        match self {
            WhereOperator::And => "and",
            WhereOperator::Or => "or",
        }
    }
}

/// Common contract: emit dialect-correct SQL from structured state.
pub trait CommandTextBuilder {
    /// Emit the SQL text for the owning dialect.
    ///
    /// # Errors
    ///
    /// Returns a `ParseError` when the builder state is incomplete (for
    /// example, no target table).
    fn build_command_text(&self, dialect: &dyn Dialect) -> Result<String, DataAccessError>;
}

pub(crate) fn join_where(fragments: &[String], operator: WhereOperator) -> String {
    fragments
        .iter()
        .map(|f| f.trim())
        .filter(|f| !f.is_empty())
        .collect::<Vec<_>>()
        .join(&format!(" {} ", operator.keyword()))
}
