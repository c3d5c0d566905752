//! Test application for the tenancy middleware.
//!
//! Clerks authenticate with the `x-clerk` header:
//!
//! | Clerk | Profile |
//! |-------|---------|
//! | alice | store 1 |
//! | bob | store 2 |
//! | carol | profile without a store |
//! | dave | no profile |
//! | erin | profile lookup fails |
//! | guest | anonymous |

#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Request, State},
    http::HeaderName,
    middleware::{self, Next},
    response::Response,
    routing::get,
};
use axum_test::TestServer;
use helios_tenancy::backends::sqlite::SqliteBackend;
use helios_tenancy::schema::{EntityRegistry, EntityType, RelationDef, TenantColumn};
use helios_tenancy::scope::{ScopedManager, TenantPolicy};
use helios_tenancy::tenant::{Actor, ProfileError, TenantId, TenantProfile, current_actor};
use helios_tenancy_http::{
    CurrentActor, CurrentTenant, HttpResult, PropagationOutcome, TenantLayerConfig, run_blocking,
    with_tenancy,
};
use serde_json::{Value, json};

pub static X_CLERK: HeaderName = HeaderName::from_static("x-clerk");

pub struct StoreProfile(Option<i64>);

impl TenantProfile for StoreProfile {
    fn tenant(&self) -> Option<TenantId> {
        self.0.map(TenantId::from)
    }
}

#[derive(Debug, Clone)]
pub struct Clerk {
    pub name: String,
}

impl Actor for Clerk {
    type Profile = StoreProfile;

    fn id(&self) -> String {
        self.name.clone()
    }

    fn is_anonymous(&self) -> bool {
        self.name == "guest"
    }

    fn resolve_profile(&self) -> Result<Option<StoreProfile>, ProfileError> {
        match self.name.as_str() {
            "alice" => Ok(Some(StoreProfile(Some(1)))),
            "bob" => Ok(Some(StoreProfile(Some(2)))),
            "carol" => Ok(Some(StoreProfile(None))),
            "erin" => Err(ProfileError::new("profile service unavailable")),
            _ => Ok(None),
        }
    }
}

/// Stand-in for an authentication layer.
async fn authenticate(mut request: Request, next: Next) -> Response {
    let clerk = request
        .headers()
        .get(&X_CLERK)
        .and_then(|v| v.to_str().ok())
        .map(|name| Clerk {
            name: name.to_string(),
        });
    if let Some(clerk) = clerk {
        request.extensions_mut().insert(clerk);
    }
    next.run(request).await
}

#[derive(Clone)]
struct AppState {
    products: ScopedManager<SqliteBackend>,
}

async fn list_products(State(state): State<AppState>) -> HttpResult<Json<Vec<Value>>> {
    let products = state.products.clone();
    let rows = run_blocking(move || products.all().order_by("id", false)?.fetch_all())
        .await
        .expect("blocking task panicked")?;
    Ok(Json(rows.into_iter().map(|row| row["name"].clone()).collect()))
}

async fn count_products(State(state): State<AppState>) -> HttpResult<Json<Value>> {
    let count = state.products.all().count()?;
    Ok(Json(json!({ "count": count })))
}

async fn show_tenant(CurrentTenant(tenant): CurrentTenant) -> Json<Value> {
    Json(json!({ "tenant": tenant }))
}

async fn show_actor(CurrentActor(clerk): CurrentActor<Clerk>) -> Json<Value> {
    Json(json!({ "actor": clerk.map(|clerk| clerk.name.clone()) }))
}

/// Reads the actor from a blocking helper that never sees the request.
async fn show_actor_blocking() -> Json<Value> {
    let name = run_blocking(|| current_actor::<Clerk>().map(|clerk| clerk.name.clone()))
        .await
        .expect("blocking task panicked");
    Json(json!({ "actor": name }))
}

async fn show_outcome(PropagationOutcome(outcome): PropagationOutcome) -> Json<Value> {
    Json(json!({ "outcome": format!("{outcome:?}") }))
}

fn products_manager(config: &TenantLayerConfig) -> ScopedManager<SqliteBackend> {
    let registry = EntityRegistry::builder()
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
                .with_tenant(TenantColumn::relation("store")),
        )
        .build()
        .expect("registry is valid");

    let backend = SqliteBackend::in_memory().expect("Failed to create SQLite backend");
    backend
        .execute_batch(
            "CREATE TABLE stores (id INTEGER PRIMARY KEY, name TEXT NOT NULL);
             CREATE TABLE products (
                 id INTEGER PRIMARY KEY,
                 store_id INTEGER NOT NULL REFERENCES stores (id),
                 name TEXT NOT NULL
             );
             INSERT INTO stores (id, name) VALUES (1, 'Corner Store'), (2, 'Mall Store');
             INSERT INTO products (id, store_id, name) VALUES
                 (1, 1, 'Apple'), (2, 2, 'Banana'), (3, 1, 'Cherry');",
        )
        .expect("Failed to load fixture data");

    let policy = Arc::new(TenantPolicy::with_config(
        Arc::new(registry),
        config.tenancy_config(),
    ));
    ScopedManager::new("Product", policy, Arc::new(backend)).expect("Product is registered")
}

/// Builds the application for `config`.
pub fn app(config: &TenantLayerConfig) -> Router {
    let state = AppState {
        products: products_manager(config),
    };
    let router = Router::new()
        .route("/products", get(list_products))
        .route("/products/count", get(count_products))
        .route("/tenant", get(show_tenant))
        .route("/actor", get(show_actor))
        .route("/actor/blocking", get(show_actor_blocking))
        .route("/outcome", get(show_outcome))
        .with_state(state);

    with_tenancy::<Clerk>(router, config).layer(middleware::from_fn(authenticate))
}

/// Starts a test server with the default configuration.
pub fn server() -> TestServer {
    server_with_config(&TenantLayerConfig::default())
}

/// Starts a test server with `config`.
pub fn server_with_config(config: &TenantLayerConfig) -> TestServer {
    TestServer::new(app(config)).expect("Failed to create test server")
}
