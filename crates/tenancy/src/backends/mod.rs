//! Database backends.
//!
//! A backend executes the SQL produced by [`TenantQuerySet`] and
//! [`UpdateRequest`]. Only the [`Executor`] and [`RowUpdater`] traits are
//! required; the scoping itself happens before SQL reaches the backend.
//!
//! | Backend | Feature | Description |
//! |---------|---------|-------------|
//! | SQLite | `sqlite` | Embedded database, in-memory or file-based |
//!
//! # Example
//!
//! ```no_run
//! # #[cfg(feature = "sqlite")]
//! use helios_tenancy::backends::sqlite::SqliteBackend;
//!
//! # #[cfg(feature = "sqlite")]
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let backend = SqliteBackend::in_memory()?;
//! backend.execute_batch("CREATE TABLE stores (id INTEGER PRIMARY KEY, name TEXT)")?;
//! # Ok(())
//! # }
//! ```
//!
//! [`TenantQuerySet`]: crate::scope::TenantQuerySet
//! [`UpdateRequest`]: crate::scope::UpdateRequest
//! [`RowUpdater`]: crate::scope::RowUpdater

use serde_json::{Map, Value};

use crate::error::TenancyResult;
use crate::query::SqlFragment;

#[cfg(feature = "sqlite")]
pub mod sqlite;

/// A result row keyed by column label.
pub type Row = Map<String, Value>;

/// Runs compiled SQL.
pub trait Executor {
    /// Runs a row-returning statement.
    fn fetch(&self, sql: &SqlFragment) -> TenancyResult<Vec<Row>>;

    /// Runs a statement returning one value, `Value::Null` if no row.
    fn fetch_scalar(&self, sql: &SqlFragment) -> TenancyResult<Value>;

    /// Runs a statement and returns the number of rows changed.
    fn execute(&self, sql: &SqlFragment) -> TenancyResult<usize>;
}
