//! Tenant propagation middleware.
//!
//! [`propagate_tenant`] is installed with
//! [`axum::middleware::from_fn_with_state`] behind an authentication layer
//! that stores the authenticated actor as a request extension. For every
//! request it:
//!
//! 1. resolves the actor's tenant with [`ContextPropagator`],
//! 2. answers with an error response if an authenticated actor has no
//!    usable profile, before any handler runs,
//! 3. otherwise runs the rest of the chain inside [`TenantStore::scope`] and
//!    [`ActorStore::scope`], so the tenant and the actor live exactly as long
//!    as the request.
//!
//! The [`Propagation`] outcome is also inserted into the request extensions.
//!
//! Work moved off the request task (e.g. `spawn_blocking`) does not see the
//! task slots; use [`run_blocking`] to carry them across.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use helios_tenancy::tenant::{
    Actor, ActorStore, ContextPropagator, Propagation, TenantStore, current_tenant,
};
use http::StatusCode;
use tokio::task::JoinError;
use tracing::debug;

use crate::config::TenantLayerConfig;
use crate::error::HttpError;

/// State shared by every invocation of [`propagate_tenant`].
#[derive(Debug, Clone)]
pub struct PropagationState {
    propagator: ContextPropagator,
    profile_failure_status: StatusCode,
}

impl PropagationState {
    /// Creates the state from a layer configuration.
    pub fn from_config(config: &TenantLayerConfig) -> Self {
        Self {
            propagator: ContextPropagator::new(),
            profile_failure_status: config.profile_failure_status(),
        }
    }

    /// Overrides the status used for profile resolution failures.
    pub fn with_profile_failure_status(mut self, status: StatusCode) -> Self {
        self.profile_failure_status = status;
        self
    }

    /// The status used for profile resolution failures.
    pub fn profile_failure_status(&self) -> StatusCode {
        self.profile_failure_status
    }
}

impl Default for PropagationState {
    fn default() -> Self {
        Self::from_config(&TenantLayerConfig::default())
    }
}

/// Middleware establishing the current tenant for one request.
///
/// `A` is the actor type the authentication layer inserts into the request
/// extensions. A request without one is treated as unauthenticated.
pub async fn propagate_tenant<A>(
    State(state): State<PropagationState>,
    mut request: Request,
    next: Next,
) -> Response
where
    A: Actor + Clone + Send + Sync + 'static,
{
    let actor = request.extensions().get::<A>().cloned();
    let outcome = match state.propagator.resolve(actor.as_ref()) {
        Ok(outcome) => outcome,
        Err(err) => {
            return HttpError::propagation(err, state.profile_failure_status).into_response();
        }
    };

    debug!(
        method = %request.method(),
        path = %request.uri().path(),
        outcome = ?outcome,
        "Tenant context established"
    );

    let tenant = outcome.tenant().cloned();
    request.extensions_mut().insert::<Propagation>(outcome);
    ActorStore::scope(actor, TenantStore::scope(tenant, next.run(request))).await
}

/// Runs blocking work on the blocking pool with the caller's current tenant
/// and actor.
///
/// The closure sees both through fresh task slots, so nothing leaks into the
/// blocking thread's own slots.
pub async fn run_blocking<F, R>(f: F) -> Result<R, JoinError>
where
    F: FnOnce() -> R + Send + 'static,
    R: Send + 'static,
{
    let tenant = current_tenant();
    let actor = ActorStore::snapshot();
    tokio::task::spawn_blocking(move || actor.sync_scope(|| TenantStore::sync_scope(tenant, f)))
        .await
}
