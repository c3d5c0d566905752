//! SQLite backend implementation.

use std::fmt::Debug;
use std::path::Path;
use std::time::Duration;

use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::types::{ToSqlOutput, ValueRef};
use rusqlite::{OptionalExtension, ToSql, params_from_iter};
use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};
use tracing::{info, trace};

use crate::backends::{Executor, Row};
use crate::error::{BackendError, TenancyResult};
use crate::query::{SqlFragment, SqlParam};
use crate::scope::{RowUpdater, UpdateRequest};

/// SQLite executor for tenant-scoped queries.
pub struct SqliteBackend {
    pool: Pool<SqliteConnectionManager>,
    config: SqliteBackendConfig,
    is_memory: bool,
}

impl Debug for SqliteBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteBackend")
            .field("config", &self.config)
            .field("is_memory", &self.is_memory)
            .finish_non_exhaustive()
    }
}

/// Configuration for the SQLite backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SqliteBackendConfig {
    /// Maximum number of connections in the pool.
    ///
    /// In-memory databases always use a single connection, since every
    /// `:memory:` connection is a separate database.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Connection timeout in milliseconds.
    #[serde(default = "default_connection_timeout_ms")]
    pub connection_timeout_ms: u64,

    /// SQLite busy timeout in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u32,

    /// Enable WAL mode for file databases.
    #[serde(default = "default_true")]
    pub enable_wal: bool,

    /// Enable foreign key constraints.
    #[serde(default = "default_true")]
    pub enable_foreign_keys: bool,
}

fn default_max_connections() -> u32 {
    10
}

fn default_connection_timeout_ms() -> u64 {
    30000
}

fn default_busy_timeout_ms() -> u32 {
    5000
}

fn default_true() -> bool {
    true
}

impl Default for SqliteBackendConfig {
    fn default() -> Self {
        Self {
            max_connections: default_max_connections(),
            connection_timeout_ms: default_connection_timeout_ms(),
            busy_timeout_ms: default_busy_timeout_ms(),
            enable_wal: true,
            enable_foreign_keys: true,
        }
    }
}

impl SqliteBackend {
    /// Creates a new in-memory SQLite backend.
    pub fn in_memory() -> TenancyResult<Self> {
        Self::with_config(":memory:", SqliteBackendConfig::default())
    }

    /// Opens or creates a file-based SQLite database.
    pub fn open<P: AsRef<Path>>(path: P) -> TenancyResult<Self> {
        Self::with_config(path, SqliteBackendConfig::default())
    }

    /// Creates a backend with custom configuration.
    pub fn with_config<P: AsRef<Path>>(
        path: P,
        config: SqliteBackendConfig,
    ) -> TenancyResult<Self> {
        let is_memory = path.as_ref().to_string_lossy() == ":memory:";

        let manager = if is_memory {
            SqliteConnectionManager::memory()
        } else {
            SqliteConnectionManager::file(path.as_ref())
        };

        let busy_timeout = Duration::from_millis(u64::from(config.busy_timeout_ms));
        let enable_foreign_keys = config.enable_foreign_keys;
        let enable_wal = config.enable_wal && !is_memory;
        let manager = manager.with_init(move |conn| {
            conn.busy_timeout(busy_timeout)?;
            if enable_foreign_keys {
                conn.execute_batch("PRAGMA foreign_keys = ON")?;
            }
            if enable_wal {
                conn.query_row("PRAGMA journal_mode = WAL", [], |_| Ok(()))?;
            }
            Ok(())
        });

        let max_size = if is_memory { 1 } else { config.max_connections.max(1) };
        let pool = Pool::builder()
            .max_size(max_size)
            .connection_timeout(Duration::from_millis(config.connection_timeout_ms))
            .build(manager)
            .map_err(|e| BackendError::ConnectionFailed {
                backend_name: "sqlite".to_string(),
                message: e.to_string(),
            })?;

        info!(memory = is_memory, pool_size = max_size, "SQLite backend ready");

        Ok(Self {
            pool,
            config,
            is_memory,
        })
    }

    /// Runs a batch of SQL statements without parameters, e.g. DDL.
    pub fn execute_batch(&self, sql: &str) -> TenancyResult<()> {
        let conn = self.get_connection()?;
        conn.execute_batch(sql)?;
        Ok(())
    }

    /// Returns whether this is an in-memory database.
    pub fn is_memory(&self) -> bool {
        self.is_memory
    }

    /// Returns the backend configuration.
    pub fn config(&self) -> &SqliteBackendConfig {
        &self.config
    }

    fn get_connection(&self) -> TenancyResult<PooledConnection<SqliteConnectionManager>> {
        Ok(self.pool.get()?)
    }
}

impl Executor for SqliteBackend {
    fn fetch(&self, sql: &SqlFragment) -> TenancyResult<Vec<Row>> {
        let conn = self.get_connection()?;
        let mut stmt = conn.prepare(&sql.sql)?;
        let names: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();

        let mut rows = stmt.query(params_from_iter(sql.params.iter()))?;
        let mut fetched = Vec::new();
        while let Some(row) = rows.next()? {
            let mut map = Row::new();
            for (index, name) in names.iter().enumerate() {
                map.insert(name.clone(), to_json(row.get_ref(index)?));
            }
            fetched.push(map);
        }

        trace!(sql = %sql.sql, rows = fetched.len(), "Fetched rows");
        Ok(fetched)
    }

    fn fetch_scalar(&self, sql: &SqlFragment) -> TenancyResult<Value> {
        let conn = self.get_connection()?;
        let value = conn
            .query_row(&sql.sql, params_from_iter(sql.params.iter()), |row| {
                Ok(to_json(row.get_ref(0)?))
            })
            .optional()?;

        trace!(sql = %sql.sql, "Fetched scalar");
        Ok(value.unwrap_or(Value::Null))
    }

    fn execute(&self, sql: &SqlFragment) -> TenancyResult<usize> {
        let conn = self.get_connection()?;
        let changed = conn.execute(&sql.sql, params_from_iter(sql.params.iter()))?;
        trace!(sql = %sql.sql, rows = changed, "Executed statement");
        Ok(changed)
    }
}

impl RowUpdater for SqliteBackend {
    fn update_rows(&self, request: &UpdateRequest) -> TenancyResult<usize> {
        self.execute(&request.to_sql()?)
    }
}

impl ToSql for SqlParam {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            SqlParam::String(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
            SqlParam::Integer(i) => ToSqlOutput::Borrowed(ValueRef::Integer(*i)),
            SqlParam::Float(f) => ToSqlOutput::Borrowed(ValueRef::Real(*f)),
            SqlParam::Null => ToSqlOutput::Borrowed(ValueRef::Null),
        })
    }
}

fn to_json(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::from(i),
        ValueRef::Real(f) => Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null),
        ValueRef::Text(bytes) => Value::String(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Blob(bytes) => Value::Array(bytes.iter().map(|b| Value::from(*b)).collect()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backend() -> SqliteBackend {
        let backend = SqliteBackend::in_memory().unwrap();
        backend
            .execute_batch(
                "CREATE TABLE stores (id INTEGER PRIMARY KEY, name TEXT, rating REAL);
                 INSERT INTO stores (id, name, rating) VALUES (1, 'Corner', 4.5), (2, 'Mall', NULL);",
            )
            .unwrap();
        backend
    }

    #[test]
    fn test_in_memory_backend() {
        let backend = SqliteBackend::in_memory().unwrap();
        assert!(backend.is_memory());
    }

    #[test]
    fn test_memory_database_is_shared_across_calls() {
        let backend = backend();
        let count = backend
            .fetch_scalar(&SqlFragment::new("SELECT COUNT(*) FROM stores"))
            .unwrap();
        assert_eq!(count, Value::from(2));
    }

    #[test]
    fn test_fetch_converts_values() {
        let backend = backend();
        let rows = backend
            .fetch(&SqlFragment::with_params(
                "SELECT id, name, rating FROM stores WHERE id = ?",
                vec![SqlParam::integer(1)],
            ))
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["id"], Value::from(1));
        assert_eq!(rows[0]["name"], Value::from("Corner"));
        assert_eq!(rows[0]["rating"], Value::from(4.5));
    }

    #[test]
    fn test_fetch_scalar_without_rows() {
        let backend = backend();
        let value = backend
            .fetch_scalar(&SqlFragment::new("SELECT id FROM stores WHERE id = 99"))
            .unwrap();
        assert_eq!(value, Value::Null);
    }

    #[test]
    fn test_execute_and_update_rows() {
        let backend = backend();
        let request = UpdateRequest::new("Store", "stores")
            .with_primary_key("id", SqlParam::integer(2))
            .set("name", SqlParam::string("Outlet"));
        assert_eq!(backend.update_rows(&request).unwrap(), 1);

        let name = backend
            .fetch_scalar(&SqlFragment::new("SELECT name FROM stores WHERE id = 2"))
            .unwrap();
        assert_eq!(name, Value::from("Outlet"));
    }

    #[test]
    fn test_file_backend() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tenancy.db");
        {
            let backend = SqliteBackend::open(&path).unwrap();
            assert!(!backend.is_memory());
            backend
                .execute_batch("CREATE TABLE stores (id INTEGER PRIMARY KEY)")
                .unwrap();
            backend
                .execute(&SqlFragment::with_params(
                    "INSERT INTO stores (id) VALUES (?)",
                    vec![SqlParam::integer(5)],
                ))
                .unwrap();
        }
        let reopened = SqliteBackend::open(&path).unwrap();
        let count = reopened
            .fetch_scalar(&SqlFragment::new("SELECT COUNT(*) FROM stores"))
            .unwrap();
        assert_eq!(count, Value::from(1));
    }

    #[test]
    fn test_sql_error_is_backend_error() {
        let backend = backend();
        let err = backend
            .fetch(&SqlFragment::new("SELECT * FROM nowhere"))
            .unwrap_err();
        assert!(matches!(err, crate::error::TenancyError::Backend(_)));
    }
}
