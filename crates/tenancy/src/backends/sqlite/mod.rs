//! SQLite backend.
//!
//! Executes compiled tenant-scoped SQL through an `r2d2` pool of `rusqlite`
//! connections. Rows come back as JSON objects keyed by column label.
//!
//! # Example
//!
//! ```no_run
//! use helios_tenancy::backends::Executor;
//! use helios_tenancy::backends::sqlite::SqliteBackend;
//! use helios_tenancy::query::SqlFragment;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let backend = SqliteBackend::open("./data/shop.db")?;
//! let stores = backend.fetch(&SqlFragment::new("SELECT * FROM stores"))?;
//! # Ok(())
//! # }
//! ```

mod backend;

pub use backend::{SqliteBackend, SqliteBackendConfig};
