//! Connection pooling.
//!
//! The pool is the only structure in this crate mutated by concurrent
//! callers; everything behind the `Mutex` is plain data. Released
//! connections are reused before new physical connections are opened.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use tracing::{debug, warn};

use crate::connection::Connection;
use crate::error::DataAccessError;
use crate::provider::Provider;

/// Pool of open connections for one provider and connection string.
#[derive(Debug)]
pub struct ConnectionPool {
    provider: Arc<dyn Provider>,
    connection_string: String,
    idle: Mutex<Vec<Connection>>,
    physical_opens: AtomicUsize,
}

impl ConnectionPool {
    #[must_use]
    pub fn new(provider: Arc<dyn Provider>, connection_string: impl Into<String>) -> Self {
        Self {
            provider,
            connection_string: connection_string.into(),
            idle: Mutex::new(Vec::new()),
            physical_opens: AtomicUsize::new(0),
        }
    }

    #[must_use]
    pub fn provider(&self) -> &Arc<dyn Provider> {
        &self.provider
    }

    #[must_use]
    pub fn connection_string(&self) -> &str {
        &self.connection_string
    }

    /// Pull an idle connection, or open a new one when the pool is empty.
    ///
    /// # Errors
    ///
    /// Returns a `ConnectionError` when the backend is unreachable; no
    /// half-open connection is ever handed out.
    pub fn acquire(&self) -> Result<Connection, DataAccessError> {
        let reused = {
            let mut idle = match self.idle.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            idle.pop()
        };

        if let Some(conn) = reused {
            debug!("pool: reusing idle connection");
            return Ok(conn);
        }

        let mut conn = Connection::new(self.provider.clone(), self.connection_string.clone());
        conn.open()?;
        self.physical_opens.fetch_add(1, Ordering::Relaxed);
        debug!("pool: opened new physical connection");
        Ok(conn)
    }

    /// Return a connection to the pool. A connection with a dangling active
    /// transaction is rolled back first, and one switched to another database
    /// is moved back to its original one; if either fails the connection is
    /// discarded instead of being pooled.
    pub fn release(&self, mut conn: Connection) {
        if conn.transaction().is_some_and(crate::transaction::Transaction::is_active)
            && conn.rollback().is_err()
        {
            warn!("pool: discarding connection after failed rollback");
            conn.dispose();
            return;
        }
        if !conn.is_open() {
            return;
        }
        if conn.database() != conn.original_database() && conn.change_database(None).is_err() {
            warn!("pool: discarding connection left on another database");
            conn.dispose();
            return;
        }
        let mut idle = match self.idle.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        idle.push(conn);
    }

    /// Number of idle pooled connections.
    #[must_use]
    pub fn idle_count(&self) -> usize {
        match self.idle.lock() {
            Ok(guard) => guard.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }

    /// Number of physical connections this pool has opened over its life.
    #[must_use]
    pub fn physical_opens(&self) -> usize {
        self.physical_opens.load(Ordering::Relaxed)
    }
}
