//! Dialect-aware relational data access for `MySQL` and `SQLite`.
//!
//! One shared value model, structured SQL builders that both emit and ingest
//! raw text, a pooled synchronous execution pipeline, typed result
//! materialization, and a declarative computed-property binder. Backend
//! syntax differences live behind the [`dialect::Dialect`] trait; driver
//! differences live behind [`provider::Provider`] factories.
//!
//! ```no_run
//! use sql_dataport::prelude::*;
//!
//! # fn main() -> Result<(), DataAccessError> {
//! let ctx = DataContext::open("sqlite", ":memory:")?;
//! ctx.execute_batch("create table account(id integer primary key, name text)")?;
//!
//! let mut cmd = ctx.command("insert into account(name) values(?)");
//! cmd.add_parameter("p1", SqlValue::Text("alice".into()));
//! let id = cmd.execute_scalar()?;
//! # let _ = id;
//! # Ok(())
//! # }
//! ```

pub mod binder;
pub mod builder;
pub mod command;
pub mod connection;
pub mod context;
pub mod dialect;
pub mod error;
pub mod params;
pub mod pool;
pub mod prelude;
pub mod provider;
pub mod reader;
pub mod transaction;
pub mod types;

#[cfg(feature = "mysql")]
mod mysql;
#[cfg(feature = "sqlite")]
mod sqlite;

pub use error::DataAccessError;
pub use types::{DatabaseType, SqlKind, SqlValue};
