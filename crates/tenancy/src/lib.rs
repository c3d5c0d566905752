//! Helios Row-Level Tenancy
//!
//! This crate scopes every query against tenant-scoped tables to the current
//! tenant, without call sites having to repeat a tenant predicate. Reads,
//! joins, counts, aggregates, embedded subqueries and updates all go through
//! the same policy engine.
//!
//! # Architecture
//!
//! - [`tenant`] - the current-tenant slot and context propagation from an
//!   authenticated actor
//! - [`schema`] - entity metadata, the table-name registry and tenant-aware
//!   relations
//! - [`query`] - the abstract query and parameterized SQL fragments
//! - [`scope`] - the tenant policy and the manager, queryset and update guard
//!   that invoke it
//! - [`backends`] - SQL executors (SQLite behind the `sqlite` feature)
//! - [`config`] - engine configuration
//! - [`error`] - error types
//!
//! # Quick Start
//!
//! ```
//! use std::sync::Arc;
//!
//! use helios_tenancy::schema::{EntityRegistry, EntityType, RelationDef, TenantColumn};
//! use helios_tenancy::scope::TenantPolicy;
//!
//! let registry = EntityRegistry::builder()
//!     .register(
//!         EntityType::new("Store", "stores")
//!             .with_column("name")
//!             .with_tenant(TenantColumn::column("id")),
//!     )
//!     .register(
//!         EntityType::new("Product", "products")
//!             .with_column("name")
//!             .with_relation(
//!                 RelationDef::foreign_key("store", "store_id", "Store").tenant_aware(),
//!             )
//!             .with_tenant(TenantColumn::relation("store")),
//!     )
//!     .build()
//!     .unwrap();
//!
//! let policy = Arc::new(TenantPolicy::new(Arc::new(registry)));
//! assert!(policy.registry().resolve_by_table_name("products").is_ok());
//! ```
//!
//! # Running queries
//!
//! ```
//! # #[cfg(feature = "sqlite")]
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use std::sync::Arc;
//!
//! use helios_tenancy::backends::sqlite::SqliteBackend;
//! use helios_tenancy::schema::{EntityRegistry, EntityType, TenantColumn};
//! use helios_tenancy::scope::{ScopedManager, TenantPolicy};
//! use helios_tenancy::tenant::set_current_tenant;
//!
//! let registry = EntityRegistry::builder()
//!     .register(
//!         EntityType::new("Product", "products")
//!             .with_column("store_id")
//!             .with_tenant(TenantColumn::column("store_id")),
//!     )
//!     .build()?;
//! let policy = Arc::new(TenantPolicy::new(Arc::new(registry)));
//!
//! let backend = Arc::new(SqliteBackend::in_memory()?);
//! backend.execute_batch(
//!     "CREATE TABLE products (id INTEGER PRIMARY KEY, store_id INTEGER);
//!      INSERT INTO products VALUES (1, 1), (2, 2);",
//! )?;
//!
//! let products = ScopedManager::new("Product", policy, backend)?;
//!
//! set_current_tenant(1);
//! assert_eq!(products.all().count()?, 1);
//! # Ok(())
//! # }
//! # #[cfg(not(feature = "sqlite"))]
//! # fn main() {}
//! ```
//!
//! # Missing tenant
//!
//! With no current tenant, queries run unscoped. This is the intended
//! behaviour for maintenance paths; set
//! [`MissingTenantPolicy::Deny`](config::MissingTenantPolicy::Deny) to refuse
//! such queries instead.

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod backends;
pub mod config;
pub mod error;
pub mod query;
pub mod schema;
pub mod scope;
pub mod tenant;

// Re-export commonly used types at crate root
pub use config::{MissingTenantPolicy, TenancyConfig};
pub use error::{TenancyError, TenancyResult};
pub use schema::{EntityRegistry, EntityType, RelationDef, TenantColumn};
pub use scope::{ScopedManager, TenantPolicy, TenantQuerySet, UpdateGuard};
pub use tenant::{TenantId, current_tenant, set_current_tenant};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name.
pub const NAME: &str = env!("CARGO_PKG_NAME");
