//! Provider factories and the process-wide provider registry.
//!
//! The registry is populated explicitly at startup (call
//! [`register_builtin_providers`] before first use); there is no unregister,
//! entries live for the process lifetime.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, LazyLock, RwLock};

use serde::{Deserialize, Serialize};

use crate::connection::{Connection, PhysicalConnection};
use crate::dialect::Dialect;
use crate::error::DataAccessError;
use crate::types::DatabaseType;

/// Structured connection options: a flat name→value map translated to
/// backend-specific connection-string keys through each provider's alias
/// table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectOptions {
    values: BTreeMap<String, String>,
}

impl ConnectOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn set(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(name.into(), value.into());
        self
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }
}

/// Factory for one backend: connections, dialects, connection strings.
pub trait Provider: Send + Sync + std::fmt::Debug {
    fn name(&self) -> &'static str;

    fn database_type(&self) -> DatabaseType;

    fn create_dialect(&self) -> Arc<dyn Dialect>;

    /// Translate structured options to this backend's connection string.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` when a required option is missing.
    fn connection_string(&self, options: &ConnectOptions) -> Result<String, DataAccessError>;

    /// The database name a fresh connection starts in.
    fn initial_database(&self, connection_string: &str) -> String;

    /// Open the live driver handle.
    ///
    /// # Errors
    ///
    /// Returns a `ConnectionError` when the backend is unreachable.
    fn open_physical(
        &self,
        connection_string: &str,
        database: &str,
    ) -> Result<PhysicalConnection, DataAccessError>;

    /// Build a data context over an existing connection's provider and
    /// connection string.
    fn create_data_context(&self, connection: &Connection) -> crate::context::DataContext {
        crate::context::DataContext::from_connection(connection)
    }
}

/// Create a closed logical connection from a connection string.
pub fn create_connection(provider: &Arc<dyn Provider>, connection_string: &str) -> Connection {
    Connection::new(provider.clone(), connection_string)
}

/// Create a closed logical connection from structured options.
///
/// # Errors
///
/// Propagates option-translation failures.
pub fn create_connection_with_options(
    provider: &Arc<dyn Provider>,
    options: &ConnectOptions,
) -> Result<Connection, DataAccessError> {
    let connection_string = provider.connection_string(options)?;
    Ok(Connection::new(provider.clone(), connection_string))
}

static PROVIDERS: LazyLock<RwLock<HashMap<String, Arc<dyn Provider>>>> =
    LazyLock::new(|| RwLock::new(HashMap::new()));

/// Register a provider under its name. Registering the same name again
/// replaces the entry.
pub fn register_provider(provider: Arc<dyn Provider>) {
    let mut map = match PROVIDERS.write() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    };
    map.insert(provider.name().to_string(), provider);
}

/// Look up a registered provider by name.
#[must_use]
pub fn provider(name: &str) -> Option<Arc<dyn Provider>> {
    let map = match PROVIDERS.read() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    };
    map.get(name).cloned()
}

/// Register the providers compiled into this build. Idempotent; call once at
/// startup before the first registry lookup.
pub fn register_builtin_providers() {
    #[cfg(feature = "sqlite")]
    register_provider(Arc::new(SqliteProvider));
    #[cfg(feature = "mysql")]
    register_provider(Arc::new(MySqlProvider));
}

/// `SQLite` provider: the connection string is the database file path
/// (`:memory:` and `file:` URIs included).
#[cfg(feature = "sqlite")]
#[derive(Debug, Default, Clone, Copy)]
pub struct SqliteProvider;

#[cfg(feature = "sqlite")]
impl Provider for SqliteProvider {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn database_type(&self) -> DatabaseType {
        DatabaseType::Sqlite
    }

    fn create_dialect(&self) -> Arc<dyn Dialect> {
        Arc::new(crate::dialect::SqliteDialect)
    }

    fn connection_string(&self, options: &ConnectOptions) -> Result<String, DataAccessError> {
        options
            .get("name")
            .or_else(|| options.get("host"))
            .map(str::to_string)
            .ok_or_else(|| {
                DataAccessError::ConfigError(
                    "sqlite options require `name` (database file path)".to_string(),
                )
            })
    }

    fn initial_database(&self, connection_string: &str) -> String {
        connection_string.to_string()
    }

    fn open_physical(
        &self,
        _connection_string: &str,
        database: &str,
    ) -> Result<PhysicalConnection, DataAccessError> {
        Ok(PhysicalConnection::Sqlite(crate::sqlite::open(database)?))
    }
}

/// `MySQL` provider: options translate to a `mysql://` URL. A `host` value of
/// the form `1.2.3.4:3306` is split into host and port.
#[cfg(feature = "mysql")]
#[derive(Debug, Default, Clone, Copy)]
pub struct MySqlProvider;

#[cfg(feature = "mysql")]
impl Provider for MySqlProvider {
    fn name(&self) -> &'static str {
        "mysql"
    }

    fn database_type(&self) -> DatabaseType {
        DatabaseType::MySql
    }

    fn create_dialect(&self) -> Arc<dyn Dialect> {
        Arc::new(crate::dialect::MySqlDialect)
    }

    fn connection_string(&self, options: &ConnectOptions) -> Result<String, DataAccessError> {
        let host = options.get("host").ok_or_else(|| {
            DataAccessError::ConfigError("mysql options require `host`".to_string())
        })?;
        let (host, port) = match host.split_once(':') {
            Some((h, p)) => (h, p),
            None => (host, "3306"),
        };
        let database = options.get("name").unwrap_or("");
        let user = options.get("account").unwrap_or("root");
        let password = options.get("password").unwrap_or("");
        Ok(format!("mysql://{user}:{password}@{host}:{port}/{database}"))
    }

    fn initial_database(&self, connection_string: &str) -> String {
        connection_string
            .rsplit_once('/')
            .map(|(_, db)| db.split('?').next().unwrap_or("").to_string())
            .unwrap_or_default()
    }

    fn open_physical(
        &self,
        connection_string: &str,
        database: &str,
    ) -> Result<PhysicalConnection, DataAccessError> {
        let mut conn = crate::mysql::open(connection_string)?;
        if !database.is_empty() && database != self.initial_database(connection_string) {
            crate::mysql::change_database(&mut conn, database)?;
        }
        Ok(PhysicalConnection::MySql(conn))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_returns_registered_providers() {
        register_builtin_providers();
        #[cfg(feature = "sqlite")]
        assert!(provider("sqlite").is_some());
        assert!(provider("no-such-backend").is_none());
    }

    #[cfg(feature = "sqlite")]
    #[test]
    fn connections_can_be_created_from_options() {
        let provider: Arc<dyn Provider> = Arc::new(SqliteProvider);
        let opts = ConnectOptions::new().set("name", ":memory:");
        let conn = create_connection_with_options(&provider, &opts).unwrap();
        assert_eq!(conn.connection_string(), ":memory:");
        assert!(!conn.is_open());

        let conn = create_connection(&provider, "/tmp/db.sqlite");
        assert_eq!(conn.database(), "/tmp/db.sqlite");
    }

    #[cfg(feature = "sqlite")]
    #[test]
    fn sqlite_options_use_name_as_path() {
        let opts = ConnectOptions::new().set("name", "/tmp/db.sqlite");
        assert_eq!(
            SqliteProvider.connection_string(&opts).unwrap(),
            "/tmp/db.sqlite"
        );
        assert!(SqliteProvider.connection_string(&ConnectOptions::new()).is_err());
    }

    #[cfg(feature = "mysql")]
    #[test]
    fn mysql_host_alias_splits_port() {
        let opts = ConnectOptions::new()
            .set("host", "1.2.3.4:3307")
            .set("name", "app")
            .set("account", "svc")
            .set("password", "pw");
        assert_eq!(
            MySqlProvider.connection_string(&opts).unwrap(),
            "mysql://svc:pw@1.2.3.4:3307/app"
        );
    }
}
