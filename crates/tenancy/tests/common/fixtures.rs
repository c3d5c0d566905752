//! Shop fixture: two stores, their products and purchases.
//!
//! | table | rows |
//! |-------|------|
//! | stores | 1 Corner Store, 2 Mall Store |
//! | products | 1 Apple (store 1), 2 Banana (store 2), 3 Cherry (store 1) |
//! | purchases | 1 (store 1, Apple, 3), 2 (store 2, Banana, 5), 3 (store 1, Cherry, 7), 4 (store 1, Banana, 11) |
//!
//! Purchase 4 is structurally cross-tenant: it belongs to store 1 but points
//! at store 2's product. `purchases.product_id` carries no database
//! constraint, so only the tenant-aware join keeps it out of joined results.

#![allow(dead_code)]

use std::sync::Arc;

use helios_tenancy::backends::sqlite::SqliteBackend;
use helios_tenancy::schema::{EntityRegistry, EntityType, RelationDef, TenantColumn};
use helios_tenancy::scope::{ScopedManager, TenantPolicy};
use helios_tenancy::TenancyConfig;

const SCHEMA: &str = "
    CREATE TABLE stores (
        id INTEGER PRIMARY KEY,
        name TEXT NOT NULL
    );
    CREATE TABLE products (
        id INTEGER PRIMARY KEY,
        store_id INTEGER NOT NULL REFERENCES stores (id),
        name TEXT NOT NULL,
        description TEXT NOT NULL DEFAULT ''
    );
    CREATE TABLE purchases (
        id INTEGER PRIMARY KEY,
        store_id INTEGER NOT NULL REFERENCES stores (id),
        product_id INTEGER NOT NULL,
        quantity INTEGER NOT NULL DEFAULT 0
    );
    CREATE TABLE countries (
        id INTEGER PRIMARY KEY,
        name TEXT NOT NULL
    );
";

const DATA: &str = "
    INSERT INTO stores (id, name) VALUES (1, 'Corner Store'), (2, 'Mall Store');
    INSERT INTO products (id, store_id, name) VALUES
        (1, 1, 'Apple'), (2, 2, 'Banana'), (3, 1, 'Cherry');
    INSERT INTO purchases (id, store_id, product_id, quantity) VALUES
        (1, 1, 1, 3), (2, 2, 2, 5), (3, 1, 3, 7), (4, 1, 2, 11);
    INSERT INTO countries (id, name) VALUES (1, 'Norway'), (2, 'Chile');
";

/// The shop's entity registry.
pub fn shop_registry() -> EntityRegistry {
    EntityRegistry::builder()
        .register(
            EntityType::new("Store", "stores")
                .with_column("name")
                .with_tenant(TenantColumn::column("id")),
        )
        .register(
            EntityType::new("Product", "products")
                .with_relation(
                    RelationDef::foreign_key("store", "store_id", "Store").tenant_aware(),
                )
                .with_column("name")
                .with_column("description")
                .with_tenant(TenantColumn::relation("store")),
        )
        .register(
            EntityType::new("Purchase", "purchases")
                .with_relation(
                    RelationDef::foreign_key("store", "store_id", "Store").tenant_aware(),
                )
                .with_relation(
                    RelationDef::foreign_key("product", "product_id", "Product").tenant_aware(),
                )
                .with_column("quantity")
                .with_tenant(TenantColumn::relation("store")),
        )
        .register(EntityType::new("Country", "countries").with_column("name"))
        .build()
        .expect("shop registry is valid")
}

/// A populated shop database with a manager per entity.
pub struct Shop {
    pub backend: Arc<SqliteBackend>,
    pub policy: Arc<TenantPolicy>,
    pub stores: ScopedManager<SqliteBackend>,
    pub products: ScopedManager<SqliteBackend>,
    pub purchases: ScopedManager<SqliteBackend>,
    pub countries: ScopedManager<SqliteBackend>,
}

/// Creates the shop with the default (permissive) configuration.
pub fn shop() -> Shop {
    shop_with_config(TenancyConfig::default())
}

/// Creates the shop with an explicit configuration.
pub fn shop_with_config(config: TenancyConfig) -> Shop {
    let backend = Arc::new(SqliteBackend::in_memory().expect("Failed to create SQLite backend"));
    backend.execute_batch(SCHEMA).expect("Failed to create schema");
    backend.execute_batch(DATA).expect("Failed to load fixture data");

    let policy = Arc::new(TenantPolicy::with_config(Arc::new(shop_registry()), config));
    let manager = |name: &str| {
        ScopedManager::new(name, Arc::clone(&policy), Arc::clone(&backend))
            .expect("entity is registered")
    };

    Shop {
        stores: manager("Store"),
        products: manager("Product"),
        purchases: manager("Purchase"),
        countries: manager("Country"),
        backend,
        policy,
    }
}

/// Extracts the integer `id` column of each row.
pub fn ids(rows: &[serde_json::Map<String, serde_json::Value>]) -> Vec<i64> {
    rows.iter()
        .filter_map(|row| row.get("id").and_then(serde_json::Value::as_i64))
        .collect()
}
