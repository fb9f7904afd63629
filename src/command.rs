//! The parameterized execution pipeline.
//!
//! A [`Command`] is one logical unit of work: command text, a parameter
//! list, and a registry of every physical command it has spawned, so that
//! disposal can force-destroy all of them even if an execution was abandoned
//! mid-flight.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use tracing::debug;

use crate::connection::{Connection, PhysicalConnection};
use crate::dialect::Dialect;
use crate::error::DataAccessError;
use crate::params::{ParameterList, has_positional_placeholders, rewrite_positional};
use crate::pool::ConnectionPool;
use crate::reader::{MaterializedResult, Reader};
use crate::types::SqlValue;

/// A spawned physical command: the pooled connection it runs on plus a
/// backend cancel handle, shared so that destroy and dispose can race safely
/// (whoever takes the slot first releases the connection).
pub(crate) struct SpawnedCommand {
    connection: Mutex<Option<Connection>>,
    #[cfg(feature = "sqlite")]
    interrupt: Option<rusqlite::InterruptHandle>,
}

pub(crate) type PhysicalSlot = Arc<SpawnedCommand>;

impl SpawnedCommand {
    fn new(conn: Connection) -> Self {
        #[cfg(feature = "sqlite")]
        let interrupt = match conn.physical.as_ref() {
            Some(PhysicalConnection::Sqlite(c)) => Some(c.get_interrupt_handle()),
            _ => None,
        };
        Self {
            connection: Mutex::new(Some(conn)),
            #[cfg(feature = "sqlite")]
            interrupt,
        }
    }

    /// Take the connection out of the slot. The first caller wins; later
    /// callers get `None`.
    pub(crate) fn take_connection(&self) -> Option<Connection> {
        match self.connection.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        }
    }

    /// Ask the backend to abort whatever statement is running on this
    /// connection, where the driver supports cancellation. Harmless when
    /// nothing is running.
    fn cancel(&self) {
        #[cfg(feature = "sqlite")]
        if let Some(handle) = &self.interrupt {
            handle.interrupt();
        }
    }
}

impl std::fmt::Debug for SpawnedCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpawnedCommand")
            .field("connection", &self.connection)
            .finish_non_exhaustive()
    }
}

/// One logical statement bound to a pool and dialect.
#[derive(Debug)]
pub struct Command {
    pool: Arc<ConnectionPool>,
    dialect: Arc<dyn Dialect>,
    /// The command-text template.
    pub text: String,
    pub parameters: ParameterList,
    /// Per-command timeout in seconds; zero or below means backend default.
    pub timeout_seconds: i32,
    spawned: Mutex<VecDeque<PhysicalSlot>>,
}

impl Command {
    #[must_use]
    pub fn new(
        pool: Arc<ConnectionPool>,
        dialect: Arc<dyn Dialect>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            pool,
            dialect,
            text: text.into(),
            parameters: ParameterList::new(),
            timeout_seconds: 0,
            spawned: Mutex::new(VecDeque::new()),
        }
    }

    /// Convenience: add an input parameter.
    pub fn add_parameter(&mut self, name: impl Into<String>, value: SqlValue) {
        self.parameters.add(name, value);
    }

    /// Resolve the command text for execution: validate bindings and rewrite
    /// positional `?` placeholders to the dialect's parameter grammar.
    fn bind_text(&self) -> Result<String, DataAccessError> {
        self.parameters.check_bindings()?;
        if has_positional_placeholders(&self.text) {
            rewrite_positional(&self.text, self.dialect.parameter_prefix(), &self.parameters)
        } else {
            Ok(self.text.clone())
        }
    }

    /// Input parameters as (prefixed name, value) pairs.
    fn bound_params(&self) -> Vec<(String, SqlValue)> {
        let prefix = self.dialect.parameter_prefix();
        self.parameters
            .inputs()
            .map(|p| (format!("{prefix}{}", p.name), p.value.clone()))
            .collect()
    }

    /// Acquire a connection and register it as a spawned physical command.
    /// Nothing is left allocated if acquisition or setup fails.
    fn spawn_physical(&self) -> Result<PhysicalSlot, DataAccessError> {
        let mut conn = self.pool.acquire()?;

        if let Some(physical) = conn.physical.as_mut() {
            if let Err(e) = physical.set_timeout(self.timeout_seconds) {
                // Destroy the partially-built pair before re-throwing.
                self.pool.release(conn);
                return Err(e);
            }
        }

        let slot: PhysicalSlot = Arc::new(SpawnedCommand::new(conn));
        let mut spawned = match self.spawned.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        spawned.push_back(slot.clone());
        Ok(slot)
    }

    /// Destroy one physical command: its connection goes back to the pool and
    /// the slot leaves the registry. Already-destroyed slots are a no-op.
    fn destroy_physical(&self, slot: &PhysicalSlot) {
        if let Some(conn) = slot.take_connection() {
            self.pool.release(conn);
        }
        let mut spawned = match self.spawned.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        spawned.retain(|s| !Arc::ptr_eq(s, slot));
    }

    /// Run `f` against a freshly spawned physical command, destroying it
    /// afterwards regardless of success or failure.
    fn with_physical<T>(
        &self,
        f: impl FnOnce(&mut PhysicalConnection) -> Result<T, DataAccessError>,
    ) -> Result<T, DataAccessError> {
        let slot = self.spawn_physical()?;
        let result = {
            let mut guard = match slot.connection.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            match guard.as_mut().and_then(|c| c.physical.as_mut()) {
                Some(physical) => f(physical),
                None => Err(DataAccessError::ConnectionError(
                    "physical command was destroyed".to_string(),
                )),
            }
        };
        self.destroy_physical(&slot);
        result
    }

    /// Execute and return the first column of the first row, with the
    /// backend null marker normalized to `None`.
    ///
    /// Inserts take the dialect-specific last-inserted-id path: the MySQL
    /// dialect reads the driver-native id with no extra statement, the
    /// SQLite dialect appends `select last_insert_rowid()` when the primary
    /// result is absent.
    ///
    /// # Errors
    ///
    /// Propagates binding and execution failures; no resource outlives the
    /// call either way.
    pub fn execute_scalar(&self) -> Result<Option<SqlValue>, DataAccessError> {
        let sql = self.bind_text()?;
        let params = self.bound_params();
        let last_insert_stmt = self.dialect.last_insert_id_statement();
        debug!(sql = %sql, "execute_scalar");

        self.with_physical(|physical| {
            if is_insert(&sql) {
                physical
                    .execute(&sql, &params)
                    .map_err(|e| execution_error(&sql, &e))?;
                match last_insert_stmt {
                    None => Ok(physical.last_insert_id().map(SqlValue::Int)),
                    Some(stmt) => {
                        let result = physical
                            .query(stmt, &[])
                            .map_err(|e| execution_error(stmt, &e))?;
                        Ok(first_scalar(result))
                    }
                }
            } else {
                let result = physical
                    .query(&sql, &params)
                    .map_err(|e| execution_error(&sql, &e))?;
                Ok(first_scalar(result))
            }
        })
    }

    /// Execute a DML statement.
    ///
    /// The returned affected-row count is not reliable across backends; do
    /// not build row-count logic on it.
    ///
    /// # Errors
    ///
    /// Propagates binding and execution failures.
    pub fn execute_non_query(&self) -> Result<usize, DataAccessError> {
        let sql = self.bind_text()?;
        let params = self.bound_params();
        debug!(sql = %sql, "execute_non_query");
        self.with_physical(|physical| {
            physical
                .execute(&sql, &params)
                .map_err(|e| execution_error(&sql, &e))
        })
    }

    /// Execute the command as a scalar function call.
    ///
    /// Text that is not already select-shaped is wrapped as
    /// `select <name>(p1, p2, ...)` over the bound parameter names.
    ///
    /// # Errors
    ///
    /// Propagates binding and execution failures.
    pub fn execute_function(&mut self, name: &str) -> Result<Option<SqlValue>, DataAccessError> {
        if !is_select(&self.text) {
            let prefix = self.dialect.parameter_prefix();
            let args: Vec<String> = self
                .parameters
                .inputs()
                .map(|p| format!("{prefix}{}", p.name))
                .collect();
            self.text = format!("select {name}({})", args.join(", "));
        }
        let sql = self.bind_text()?;
        let params = self.bound_params();
        debug!(sql = %sql, "execute_function");
        self.with_physical(|physical| {
            let result = physical
                .query(&sql, &params)
                .map_err(|e| execution_error(&sql, &e))?;
            Ok(first_scalar(result))
        })
    }

    /// Execute a stored procedure, copying output and return values back
    /// into the parameter list; the return slot's value is the result.
    ///
    /// # Errors
    ///
    /// `Unsupported` on backends without stored procedures (SQLite);
    /// otherwise propagates binding and execution failures.
    pub fn execute_stored_procedure(
        &mut self,
        name: &str,
    ) -> Result<Option<SqlValue>, DataAccessError> {
        self.parameters.ensure_return_slot();
        self.parameters.check_bindings()?;
        let mut params = self.parameters.clone();
        debug!(procedure = name, "execute_stored_procedure");

        self.with_physical(|physical| -> Result<(), DataAccessError> {
            match physical {
                #[cfg(feature = "sqlite")]
                PhysicalConnection::Sqlite(_) => Err(DataAccessError::Unsupported(
                    "SQLite does not support stored procedures".to_string(),
                )),
                #[cfg(feature = "mysql")]
                PhysicalConnection::MySql(conn) => {
                    crate::mysql::call_procedure(conn, name, &mut params)
                }
            }
        })?;

        self.parameters = params;
        Ok(self
            .parameters
            .return_slot()
            .map(|p| p.value.clone())
            .filter(|v| !v.is_null()))
    }

    /// Execute and hand the materialized cursor to a [`Reader`] that owns
    /// the physical command until it is closed. If reader construction
    /// fails after the physical command exists, the physical command is
    /// destroyed before the error propagates.
    ///
    /// # Errors
    ///
    /// Propagates binding and execution failures.
    pub fn execute_reader(&mut self) -> Result<Reader, DataAccessError> {
        self.parameters.ensure_return_slot();
        let sql = self.bind_text()?;
        let params = self.bound_params();
        debug!(sql = %sql, "execute_reader");

        let slot = self.spawn_physical()?;
        let result: Result<MaterializedResult, DataAccessError> = {
            let mut guard = match slot.connection.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            match guard.as_mut().and_then(|c| c.physical.as_mut()) {
                Some(physical) => physical
                    .query(&sql, &params)
                    .map_err(|e| execution_error(&sql, &e)),
                None => Err(DataAccessError::ConnectionError(
                    "physical command was destroyed".to_string(),
                )),
            }
        };

        match result {
            Ok(set) => Ok(Reader::new(
                vec![set],
                Some(self.pool.clone()),
                Some(slot),
            )),
            Err(e) => {
                self.destroy_physical(&slot);
                Err(e)
            }
        }
    }

    /// Drain the spawned-physical-command registry, destroying every entry.
    /// In-flight statements are interrupted where the backend supports
    /// cancellation rather than waited out. Safe to call any number of
    /// times; a second call never double-releases a connection.
    pub fn dispose(&self) {
        let drained: Vec<PhysicalSlot> = {
            let mut spawned = match self.spawned.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            spawned.drain(..).collect()
        };
        for slot in drained {
            slot.cancel();
            if let Some(conn) = slot.take_connection() {
                self.pool.release(conn);
            }
        }
    }

    /// Number of live spawned physical commands (test and diagnostics hook).
    #[must_use]
    pub fn spawned_count(&self) -> usize {
        match self.spawned.lock() {
            Ok(guard) => guard.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }
}

impl Drop for Command {
    fn drop(&mut self) {
        self.dispose();
    }
}

fn first_scalar(result: MaterializedResult) -> Option<SqlValue> {
    result
        .rows
        .into_iter()
        .next()
        .and_then(|row| row.into_iter().next())
        .filter(|v| !v.is_null())
}

fn execution_error(sql: &str, source: &DataAccessError) -> DataAccessError {
    match source {
        DataAccessError::Unsupported(_) => DataAccessError::Unsupported(source.to_string()),
        _ => DataAccessError::execution(sql, source.to_string()),
    }
}

fn is_insert(sql: &str) -> bool {
    sql.trim_start().to_ascii_lowercase().starts_with("insert")
}

fn is_select(sql: &str) -> bool {
    sql.trim_start().to_ascii_lowercase().starts_with("select")
}
