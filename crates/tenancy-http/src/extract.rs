//! Extractors for the request's tenant context.

use std::any::Any;
use std::convert::Infallible;
use std::sync::Arc;

use axum::{extract::FromRequestParts, http::request::Parts};
use helios_tenancy::tenant::{Propagation, TenantId, current_actor, current_tenant};

/// The tenant current for this request, if any.
///
/// Reads the slot populated by
/// [`propagate_tenant`](crate::middleware::propagate_tenant).
///
/// # Example
///
/// ```rust,ignore
/// use helios_tenancy_http::extract::CurrentTenant;
///
/// async fn handler(CurrentTenant(tenant): CurrentTenant) -> String {
///     tenant.map(|t| t.to_string()).unwrap_or_default()
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentTenant(pub Option<TenantId>);

impl<S> FromRequestParts<S> for CurrentTenant
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(_parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(CurrentTenant(current_tenant()))
    }
}

/// The actor recorded for this request, if it is an `A`.
///
/// Unlike reading the request extensions, the same value is available to
/// code called from the handler through
/// [`current_actor`](helios_tenancy::tenant::current_actor).
#[derive(Debug)]
pub struct CurrentActor<A>(pub Option<Arc<A>>);

impl<A, S> FromRequestParts<S> for CurrentActor<A>
where
    A: Any + Send + Sync,
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(_parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(CurrentActor(current_actor::<A>()))
    }
}

/// How the tenant was established for this request.
///
/// Requests that did not pass through the propagation middleware report
/// [`Propagation::Anonymous`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropagationOutcome(pub Propagation);

impl<S> FromRequestParts<S> for PropagationOutcome
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let outcome = parts
            .extensions
            .get::<Propagation>()
            .cloned()
            .unwrap_or(Propagation::Anonymous);
        Ok(PropagationOutcome(outcome))
    }
}
