//! # helios-tenancy-http - Tenant propagation for axum
//!
//! Establishes the current tenant of [`helios_tenancy`] for each HTTP
//! request, from the actor an authentication layer attached to it.
//!
//! ## Request lifecycle
//!
//! | Actor in extensions | Profile | Result |
//! |---------------------|---------|--------|
//! | none / anonymous | not looked up | handlers run with no tenant |
//! | authenticated | has a tenant | handlers run scoped to that tenant |
//! | authenticated | has no tenant | handlers run with no tenant |
//! | authenticated | missing or failing | error response, handlers never run |
//!
//! The tenant and the actor are held in task slots for the duration of the
//! request and discarded afterwards, so pooled workers never inherit a
//! previous request's tenant or actor.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use axum::{Router, routing::get};
//! use helios_tenancy_http::{TenantLayerConfig, init_tracing, with_tenancy};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = TenantLayerConfig::from_env();
//!     init_tracing(&config.log_level);
//!
//!     let app = Router::new().route("/products", get(list_products));
//!     let app = with_tenancy::<Clerk>(app, &config);
//!
//!     let listener = tokio::net::TcpListener::bind("127.0.0.1:8080").await?;
//!     axum::serve(listener, app).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! - [`middleware`] - the propagation middleware and blocking-task helper
//! - [`extract`] - extractors for the current tenant, actor and propagation
//!   outcome
//! - [`config`] - layer configuration (clap + environment)
//! - [`error`] - JSON error responses for tenancy failures

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod config;
pub mod error;
pub mod extract;
pub mod middleware;

pub use config::TenantLayerConfig;
pub use error::{HttpError, HttpResult};
pub use extract::{CurrentActor, CurrentTenant, PropagationOutcome};
pub use middleware::{PropagationState, propagate_tenant, run_blocking};

use axum::Router;
use helios_tenancy::tenant::Actor;
use tower_http::trace::TraceLayer;
use tracing::debug;

/// Wraps `router` with request tracing and tenant propagation for actor
/// type `A`.
///
/// The authentication layer inserting `A` must be applied outside (after)
/// this call.
pub fn with_tenancy<A>(router: Router, config: &TenantLayerConfig) -> Router
where
    A: Actor + Clone + Send + Sync + 'static,
{
    let state = PropagationState::from_config(config);
    router
        .layer(axum::middleware::from_fn_with_state(
            state,
            propagate_tenant::<A>,
        ))
        .layer(TraceLayer::new_for_http())
}

/// Initializes the tracing subscriber for logging.
///
/// This should be called once at application startup; later calls are
/// ignored.
///
/// # Arguments
///
/// * `level` - The log level (error, warn, info, debug, trace)
pub fn init_tracing(level: &str) {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "helios_tenancy={level},helios_tenancy_http={level},tower_http=debug"
        ))
    });

    if tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .try_init()
        .is_err()
    {
        debug!("Tracing subscriber already installed");
    }
}
