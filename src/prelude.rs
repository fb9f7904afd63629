//! Convenient imports for common functionality.
//!
//! This module re-exports the most commonly used types and functions
//! to make it easier to get started with the library.

pub use crate::binder::{Bindable, Binder, BinderRegistry, BinderShape, ComputedBinding};
pub use crate::builder::{
    CommandTextBuilder, InsertCommandBuilder, SelectCommandBuilder, UpdateCommandBuilder,
    WhereOperator,
};
pub use crate::command::Command;
pub use crate::connection::Connection;
pub use crate::context::DataContext;
pub use crate::dialect::{Dialect, MySqlDialect, SqliteDialect};
pub use crate::error::DataAccessError;
pub use crate::params::{ParamDirection, Parameter, ParameterList};
pub use crate::pool::ConnectionPool;
pub use crate::provider::{
    ConnectOptions, Provider, create_connection, create_connection_with_options, provider,
    register_builtin_providers, register_provider,
};
pub use crate::reader::{ColumnInfo, MaterializedResult, Reader};
pub use crate::transaction::{Transaction, TransactionState};
pub use crate::types::{DatabaseType, SqlKind, SqlValue, coerce};

#[cfg(feature = "mysql")]
pub use crate::provider::MySqlProvider;
#[cfg(feature = "sqlite")]
pub use crate::provider::SqliteProvider;
