//! The top-level data-access entry point.
//!
//! A [`DataContext`] pairs a connection pool with the dialect of its
//! provider; commands created through it inherit both.

use std::sync::Arc;

use crate::builder::CommandTextBuilder;
use crate::command::Command;
use crate::connection::Connection;
use crate::dialect::Dialect;
use crate::error::DataAccessError;
use crate::pool::ConnectionPool;
use crate::provider::{self, ConnectOptions, Provider};
use crate::types::DatabaseType;

/// One logical database: a pool of connections plus the dialect used to
/// render SQL against it.
#[derive(Debug, Clone)]
pub struct DataContext {
    pool: Arc<ConnectionPool>,
    dialect: Arc<dyn Dialect>,
}

impl DataContext {
    /// Open a context through the provider registry.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` when no provider is registered under the name.
    pub fn open(provider_name: &str, connection_string: &str) -> Result<Self, DataAccessError> {
        provider::register_builtin_providers();
        let provider = provider::provider(provider_name).ok_or_else(|| {
            DataAccessError::ConfigError(format!("no provider registered as `{provider_name}`"))
        })?;
        Ok(Self::with_provider(&provider, connection_string))
    }

    /// Open a context through the registry from structured options.
    ///
    /// # Errors
    ///
    /// Propagates registry lookup and option-translation failures.
    pub fn open_with_options(
        provider_name: &str,
        options: &ConnectOptions,
    ) -> Result<Self, DataAccessError> {
        provider::register_builtin_providers();
        let provider = provider::provider(provider_name).ok_or_else(|| {
            DataAccessError::ConfigError(format!("no provider registered as `{provider_name}`"))
        })?;
        let connection_string = provider.connection_string(options)?;
        Ok(Self::with_provider(&provider, &connection_string))
    }

    /// Build a context over an explicit provider instance.
    #[must_use]
    pub fn with_provider(provider: &Arc<dyn Provider>, connection_string: &str) -> Self {
        Self {
            dialect: provider.create_dialect(),
            pool: Arc::new(ConnectionPool::new(provider.clone(), connection_string)),
        }
    }

    /// Build a context sharing an existing connection's provider and
    /// connection string. The connection itself is not adopted; the context
    /// pools its own.
    #[must_use]
    pub fn from_connection(connection: &Connection) -> Self {
        Self::with_provider(connection.provider(), connection.connection_string())
    }

    #[must_use]
    pub fn pool(&self) -> &Arc<ConnectionPool> {
        &self.pool
    }

    #[must_use]
    pub fn dialect(&self) -> &Arc<dyn Dialect> {
        &self.dialect
    }

    #[must_use]
    pub fn database_type(&self) -> DatabaseType {
        self.pool.provider().database_type()
    }

    /// Create a command over raw text.
    #[must_use]
    pub fn command(&self, text: impl Into<String>) -> Command {
        Command::new(self.pool.clone(), self.dialect.clone(), text)
    }

    /// Create a command by rendering a builder against this context's
    /// dialect.
    ///
    /// # Errors
    ///
    /// Propagates builder emission failures.
    pub fn command_from(
        &self,
        builder: &dyn CommandTextBuilder,
    ) -> Result<Command, DataAccessError> {
        let text = builder.build_command_text(self.dialect.as_ref())?;
        Ok(self.command(text))
    }

    /// Run a multi-statement script on a pooled connection.
    ///
    /// # Errors
    ///
    /// Propagates backend failures.
    pub fn execute_batch(&self, sql: &str) -> Result<(), DataAccessError> {
        let mut conn = self.pool.acquire()?;
        let result = conn.execute_batch(sql);
        self.pool.release(conn);
        result
    }
}
