use thiserror::Error;

/// Crate-wide error type.
///
/// Parse and execution variants carry the offending SQL text so failures can
/// be diagnosed without walking into the backend driver.
#[derive(Debug, Error)]
pub enum DataAccessError {
    #[cfg(feature = "sqlite")]
    #[error(transparent)]
    SqliteError(#[from] rusqlite::Error),

    #[cfg(feature = "mysql")]
    #[error(transparent)]
    MySqlError(#[from] mysql::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("SQL parse error in `{sql}`: {message}")]
    ParseError { sql: String, message: String },

    #[error("Parameter `{name}`: {message}")]
    ParameterError { name: String, message: String },

    #[error("SQL execution error in `{sql}`: {message}")]
    ExecutionError { sql: String, message: String },

    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    #[error("Other database error: {0}")]
    Other(String),
}

impl DataAccessError {
    /// Shorthand for a parse failure tied to a piece of SQL text.
    pub fn parse(sql: impl Into<String>, message: impl Into<String>) -> Self {
        DataAccessError::ParseError {
            sql: sql.into(),
            message: message.into(),
        }
    }

    /// Shorthand for an execution failure tied to a piece of SQL text.
    pub fn execution(sql: impl Into<String>, message: impl Into<String>) -> Self {
        DataAccessError::ExecutionError {
            sql: sql.into(),
            message: message.into(),
        }
    }

    /// Shorthand for a parameter binding failure.
    pub fn parameter(name: impl Into<String>, message: impl Into<String>) -> Self {
        DataAccessError::ParameterError {
            name: name.into(),
            message: message.into(),
        }
    }
}
