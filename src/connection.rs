//! Logical connections over the backend drivers.

use std::sync::Arc;

use tracing::debug;

use crate::error::DataAccessError;
use crate::provider::Provider;
use crate::reader::MaterializedResult;
use crate::transaction::Transaction;
use crate::types::SqlValue;

/// The live backend-driver handle, as opposed to the logical [`Connection`]
/// that may outlive several of them.
pub enum PhysicalConnection {
    #[cfg(feature = "sqlite")]
    Sqlite(rusqlite::Connection),
    #[cfg(feature = "mysql")]
    MySql(mysql::Conn),
}

impl std::fmt::Debug for PhysicalConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            #[cfg(feature = "sqlite")]
            Self::Sqlite(_) => f.debug_tuple("Sqlite").finish(),
            #[cfg(feature = "mysql")]
            Self::MySql(_) => f.debug_tuple("MySql").finish(),
        }
    }
}

impl PhysicalConnection {
    pub(crate) fn query(
        &mut self,
        sql: &str,
        params: &[(String, SqlValue)],
    ) -> Result<MaterializedResult, DataAccessError> {
        match self {
            #[cfg(feature = "sqlite")]
            Self::Sqlite(conn) => crate::sqlite::run_query(conn, sql, params),
            #[cfg(feature = "mysql")]
            Self::MySql(conn) => crate::mysql::run_query(conn, sql, params),
        }
    }

    pub(crate) fn execute(
        &mut self,
        sql: &str,
        params: &[(String, SqlValue)],
    ) -> Result<usize, DataAccessError> {
        match self {
            #[cfg(feature = "sqlite")]
            Self::Sqlite(conn) => crate::sqlite::run_execute(conn, sql, params),
            #[cfg(feature = "mysql")]
            Self::MySql(conn) => crate::mysql::run_execute(conn, sql, params),
        }
    }

    pub(crate) fn execute_batch(&mut self, sql: &str) -> Result<(), DataAccessError> {
        match self {
            #[cfg(feature = "sqlite")]
            Self::Sqlite(conn) => Ok(conn.execute_batch(sql)?),
            #[cfg(feature = "mysql")]
            Self::MySql(conn) => crate::mysql::run_batch(conn, sql),
        }
    }

    /// Driver-native last-inserted-id, when the backend tracks one.
    pub(crate) fn last_insert_id(&mut self) -> Option<i64> {
        match self {
            #[cfg(feature = "sqlite")]
            Self::Sqlite(conn) => Some(conn.last_insert_rowid()),
            #[cfg(feature = "mysql")]
            Self::MySql(conn) => {
                let id = conn.last_insert_id();
                (id != 0).then_some(id as i64)
            }
        }
    }

    /// Apply a per-command timeout; values of zero or below keep the backend
    /// default.
    pub(crate) fn set_timeout(&mut self, seconds: i32) -> Result<(), DataAccessError> {
        if seconds <= 0 {
            return Ok(());
        }
        match self {
            #[cfg(feature = "sqlite")]
            Self::Sqlite(conn) => {
                conn.busy_timeout(std::time::Duration::from_secs(seconds as u64))?;
                Ok(())
            }
            #[cfg(feature = "mysql")]
            Self::MySql(conn) => crate::mysql::set_timeout(conn, seconds),
        }
    }
}

/// Logical connection: wraps one physical backend connection plus its
/// connection string, current/original database names, and the optional
/// attached transaction.
#[derive(Debug)]
pub struct Connection {
    provider: Arc<dyn Provider>,
    pub(crate) physical: Option<PhysicalConnection>,
    connection_string: String,
    database: String,
    original_database: String,
    transaction: Option<Transaction>,
}

impl Connection {
    pub(crate) fn new(provider: Arc<dyn Provider>, connection_string: impl Into<String>) -> Self {
        let connection_string = connection_string.into();
        let database = provider.initial_database(&connection_string);
        Self {
            provider,
            physical: None,
            connection_string,
            original_database: database.clone(),
            database,
            transaction: None,
        }
    }

    #[must_use]
    pub fn is_open(&self) -> bool {
        self.physical.is_some()
    }

    #[must_use]
    pub fn provider(&self) -> &Arc<dyn Provider> {
        &self.provider
    }

    #[must_use]
    pub fn connection_string(&self) -> &str {
        &self.connection_string
    }

    #[must_use]
    pub fn database(&self) -> &str {
        &self.database
    }

    #[must_use]
    pub fn original_database(&self) -> &str {
        &self.original_database
    }

    #[must_use]
    pub fn transaction(&self) -> Option<&Transaction> {
        self.transaction.as_ref()
    }

    /// Open the physical connection. No-op when already open.
    ///
    /// # Errors
    ///
    /// Returns a `ConnectionError` when the backend is unreachable.
    pub fn open(&mut self) -> Result<(), DataAccessError> {
        if self.physical.is_none() {
            self.physical = Some(
                self.provider
                    .open_physical(&self.connection_string, &self.database)?,
            );
        }
        Ok(())
    }

    /// Close the physical connection. No-op when already closed. Any attached
    /// transaction is detached without touching the backend (the driver rolls
    /// back on drop).
    pub fn close(&mut self) {
        self.physical = None;
        self.transaction = None;
    }

    /// Switch to another database, or back to the original when `name` is
    /// `None`. Reopens the physical connection if needed.
    ///
    /// # Errors
    ///
    /// Propagates backend failures from the switch.
    pub fn change_database(&mut self, name: Option<&str>) -> Result<(), DataAccessError> {
        let target = name.unwrap_or(&self.original_database).to_string();
        self.open()?;
        // SQLite has no database-switch statement; the database is the file
        // itself, so reopen against the new path instead.
        let reopen = match self.physical.as_ref() {
            #[cfg(feature = "sqlite")]
            Some(PhysicalConnection::Sqlite(_)) => true,
            _ => false,
        };
        if reopen {
            self.physical = Some(self.provider.open_physical(&self.connection_string, &target)?);
        } else {
            match self.physical.as_mut() {
                #[cfg(feature = "mysql")]
                Some(PhysicalConnection::MySql(conn)) => {
                    crate::mysql::change_database(conn, &target)?;
                }
                _ => {
                    return Err(DataAccessError::ConnectionError(
                        "connection is not open".to_string(),
                    ));
                }
            }
        }
        self.database = target;
        Ok(())
    }

    /// Begin a transaction. If one is already active, it is returned as-is
    /// rather than failing.
    ///
    /// # Errors
    ///
    /// Propagates backend failures from the begin statement.
    pub fn begin_transaction(&mut self) -> Result<&Transaction, DataAccessError> {
        let already_active = self.transaction.as_ref().is_some_and(Transaction::is_active);
        if already_active {
            debug!("begin_transaction: transaction already active, returning existing");
        } else {
            self.open()?;
            let begin = self.provider.create_dialect().begin_transaction_statement();
            self.raw_execute(begin)?;
            let mut tx = Transaction::new();
            tx.activate();
            self.transaction = Some(tx);
        }
        self.transaction
            .as_ref()
            .ok_or_else(|| DataAccessError::Other("transaction was not attached".to_string()))
    }

    /// Commit the attached transaction. No-op when none is active.
    ///
    /// # Errors
    ///
    /// Propagates backend failures from the commit statement.
    pub fn commit(&mut self) -> Result<(), DataAccessError> {
        self.finish_transaction(true)
    }

    /// Roll back the attached transaction. No-op when none is active.
    ///
    /// # Errors
    ///
    /// Propagates backend failures from the rollback statement.
    pub fn rollback(&mut self) -> Result<(), DataAccessError> {
        self.finish_transaction(false)
    }

    fn finish_transaction(&mut self, commit: bool) -> Result<(), DataAccessError> {
        let Some(tx) = self.transaction.as_mut() else {
            return Ok(());
        };
        if tx.complete(commit) {
            let statement = if commit { "COMMIT" } else { "ROLLBACK" };
            self.raw_execute(statement)?;
        }
        Ok(())
    }

    /// Execute a multi-statement script.
    ///
    /// # Errors
    ///
    /// Propagates backend failures.
    pub fn execute_batch(&mut self, sql: &str) -> Result<(), DataAccessError> {
        self.open()?;
        self.raw_execute(sql)
    }

    fn raw_execute(&mut self, sql: &str) -> Result<(), DataAccessError> {
        match self.physical.as_mut() {
            Some(physical) => {
                physical.execute_batch(sql)?;
                Ok(())
            }
            None => Err(DataAccessError::ConnectionError(
                "connection is not open".to_string(),
            )),
        }
    }

    /// Independent connection sharing the same connection string, produced
    /// through the owning provider rather than by sharing the handle.
    ///
    /// # Errors
    ///
    /// Propagates provider failures.
    pub fn clone_connection(&self) -> Result<Connection, DataAccessError> {
        Ok(Connection::new(
            self.provider.clone(),
            self.connection_string.clone(),
        ))
    }

    /// Close the physical connection, detach the transaction, and clear
    /// cached state. Safe to call any number of times.
    pub fn dispose(&mut self) {
        self.close();
    }
}
