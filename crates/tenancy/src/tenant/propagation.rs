//! Context propagation from an inbound unit of work.
//!
//! An inbound unit of work (an HTTP request, a queue message, a job) may carry
//! an authenticated actor. [`ContextPropagator`] turns that actor into the
//! current tenant before any tenant-scoped query runs:
//!
//! | Actor | Profile resolution | Result |
//! |-------|--------------------|--------|
//! | absent / anonymous | not attempted | slot untouched, queries unscoped |
//! | authenticated | `Ok(Some(profile))` | profile's tenant (possibly none) stored |
//! | authenticated | `Ok(None)` | [`ContextError::ProfileUnavailable`] |
//! | authenticated | `Err(_)` | [`ContextError::ProfileUnavailable`] |
//!
//! The hard failure for authenticated actors is deliberate: continuing would
//! run the request with an unscoped or stale tenant.

use thiserror::Error;
use tracing::{debug, error};

use super::id::TenantId;
use super::store::TenantStore;
use crate::error::ContextError;

/// A profile that may designate the actor's tenant.
pub trait TenantProfile {
    /// Returns the tenant this profile belongs to, if any.
    fn tenant(&self) -> Option<TenantId>;
}

/// An actor attached to a unit of work.
pub trait Actor {
    /// The profile type resolved for this actor.
    type Profile: TenantProfile;

    /// Returns an identifier used in logs and errors.
    fn id(&self) -> String;

    /// Returns `true` if the actor is not authenticated.
    fn is_anonymous(&self) -> bool;

    /// Looks up the actor's tenant-bearing profile.
    fn resolve_profile(&self) -> Result<Option<Self::Profile>, ProfileError>;
}

/// An inbound unit of work carrying an optional actor.
pub trait UnitOfWork {
    /// The actor type.
    type Actor: Actor;

    /// Returns the actor, or `None` if the work is unauthenticated.
    fn actor(&self) -> Option<&Self::Actor>;
}

/// Failure reported by a profile lookup.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct ProfileError {
    /// Human-readable reason.
    pub message: String,
}

impl ProfileError {
    /// Creates a profile error with the given message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Outcome of propagating context for one unit of work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Propagation {
    /// No authenticated actor; the slot was left alone.
    Anonymous,
    /// The actor's profile designates this tenant.
    Tenant(TenantId),
    /// The actor has a profile but it carries no tenant.
    NoTenant,
}

impl Propagation {
    /// Returns the tenant that was propagated, if any.
    pub fn tenant(&self) -> Option<&TenantId> {
        match self {
            Propagation::Tenant(tenant) => Some(tenant),
            _ => None,
        }
    }

    /// Returns `true` if the slot should be written for this outcome.
    pub fn writes_slot(&self) -> bool {
        !matches!(self, Propagation::Anonymous)
    }
}

/// Populates the tenant context store from a unit of work.
#[derive(Debug, Clone, Copy, Default)]
pub struct ContextPropagator;

impl ContextPropagator {
    /// Creates a propagator.
    pub fn new() -> Self {
        Self
    }

    /// Resolves the tenant for an actor without touching the store.
    pub fn resolve<A: Actor>(&self, actor: Option<&A>) -> Result<Propagation, ContextError> {
        let Some(actor) = actor.filter(|actor| !actor.is_anonymous()) else {
            debug!("anonymous unit of work, tenant context left unset");
            return Ok(Propagation::Anonymous);
        };

        let actor_id = actor.id();
        let profile = match actor.resolve_profile() {
            Ok(Some(profile)) => profile,
            Ok(None) => {
                error!(actor = %actor_id, "authenticated actor has no profile");
                return Err(ContextError::ProfileUnavailable {
                    actor: actor_id,
                    reason: "no profile attached".to_string(),
                });
            }
            Err(err) => {
                error!(actor = %actor_id, error = %err, "profile resolution failed");
                return Err(ContextError::ProfileUnavailable {
                    actor: actor_id,
                    reason: err.message,
                });
            }
        };

        match profile.tenant() {
            Some(tenant) => {
                debug!(actor = %actor_id, tenant = %tenant, "resolved tenant for actor");
                Ok(Propagation::Tenant(tenant))
            }
            None => {
                debug!(actor = %actor_id, "actor profile carries no tenant");
                Ok(Propagation::NoTenant)
            }
        }
    }

    /// Resolves the tenant for `work` and writes it into the active slot.
    ///
    /// On error the slot is not modified and the unit of work must be aborted.
    pub fn propagate<W: UnitOfWork>(&self, work: &W) -> Result<Propagation, ContextError> {
        let outcome = self.resolve(work.actor())?;
        if outcome.writes_slot() {
            TenantStore::replace(outcome.tenant().cloned());
        }
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tenant::{clear_current_tenant, current_tenant, set_current_tenant};

    struct Profile(Option<TenantId>);

    impl TenantProfile for Profile {
        fn tenant(&self) -> Option<TenantId> {
            self.0.clone()
        }
    }

    enum User {
        Anonymous,
        WithProfile(Option<TenantId>),
        WithoutProfile,
        Broken,
    }

    impl Actor for User {
        type Profile = Profile;

        fn id(&self) -> String {
            "user-1".to_string()
        }

        fn is_anonymous(&self) -> bool {
            matches!(self, User::Anonymous)
        }

        fn resolve_profile(&self) -> Result<Option<Profile>, ProfileError> {
            match self {
                User::Anonymous | User::WithoutProfile => Ok(None),
                User::WithProfile(tenant) => Ok(Some(Profile(tenant.clone()))),
                User::Broken => Err(ProfileError::new("profile table unreachable")),
            }
        }
    }

    struct Request(Option<User>);

    impl UnitOfWork for Request {
        type Actor = User;

        fn actor(&self) -> Option<&User> {
            self.0.as_ref()
        }
    }

    #[test]
    fn test_profile_tenant_is_stored() {
        clear_current_tenant();
        let request = Request(Some(User::WithProfile(Some(TenantId::from(1)))));
        let outcome = ContextPropagator::new().propagate(&request).unwrap();

        assert_eq!(outcome, Propagation::Tenant(TenantId::from(1)));
        assert_eq!(current_tenant(), Some(TenantId::from(1)));
        clear_current_tenant();
    }

    #[test]
    fn test_missing_actor_leaves_slot_alone() {
        set_current_tenant(3);
        let outcome = ContextPropagator::new().propagate(&Request(None)).unwrap();
        assert_eq!(outcome, Propagation::Anonymous);
        assert_eq!(current_tenant(), Some(TenantId::from(3)));
        clear_current_tenant();
    }

    #[test]
    fn test_anonymous_actor_is_unscoped() {
        clear_current_tenant();
        let outcome = ContextPropagator::new()
            .propagate(&Request(Some(User::Anonymous)))
            .unwrap();
        assert_eq!(outcome, Propagation::Anonymous);
        assert_eq!(current_tenant(), None);
    }

    #[test]
    fn test_profile_without_tenant_clears_slot() {
        set_current_tenant(3);
        let outcome = ContextPropagator::new()
            .propagate(&Request(Some(User::WithProfile(None))))
            .unwrap();
        assert_eq!(outcome, Propagation::NoTenant);
        assert_eq!(current_tenant(), None);
    }

    #[test]
    fn test_missing_profile_aborts() {
        clear_current_tenant();
        let err = ContextPropagator::new()
            .propagate(&Request(Some(User::WithoutProfile)))
            .unwrap_err();
        assert!(matches!(err, ContextError::ProfileUnavailable { .. }));
        assert_eq!(current_tenant(), None);
    }

    #[test]
    fn test_failing_profile_aborts_without_writing() {
        set_current_tenant(4);
        let err = ContextPropagator::new()
            .propagate(&Request(Some(User::Broken)))
            .unwrap_err();
        match err {
            ContextError::ProfileUnavailable { actor, reason } => {
                assert_eq!(actor, "user-1");
                assert_eq!(reason, "profile table unreachable");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(current_tenant(), Some(TenantId::from(4)));
        clear_current_tenant();
    }
}
