//! Tenant identity and the current-tenant context.
//!
//! # Core Types
//!
//! - [`TenantId`] - Opaque tenant identifier (integer, UUID or text)
//! - [`TenantStore`] - The per-unit-of-work slot holding the current tenant
//! - [`ContextPropagator`] - Fills the slot from an authenticated actor
//! - [`ActorStore`] - Companion slot recording who is acting
//!
//! The produced API other subsystems are expected to call directly is just
//! [`set_current_tenant`] and [`current_tenant`]. Everything that compiles
//! SQL for a tenant-scoped entity consults the slot at compilation time.
//!
//! # Examples
//!
//! ```
//! use helios_tenancy::tenant::{current_tenant, set_current_tenant, TenantId, TenantStore};
//!
//! set_current_tenant(1);
//! set_current_tenant(2);
//! assert_eq!(current_tenant(), Some(TenantId::from(2)));
//!
//! {
//!     let _maintenance = TenantStore::suspend();
//!     assert_eq!(current_tenant(), None);
//! }
//! assert_eq!(current_tenant(), Some(TenantId::from(2)));
//! ```

mod actor;
mod id;
mod propagation;
mod store;

pub use actor::{ActorSnapshot, ActorStore, clear_current_actor, current_actor, set_current_actor};
pub use id::TenantId;
pub use propagation::{
    Actor, ContextPropagator, ProfileError, Propagation, TenantProfile, UnitOfWork,
};
pub use store::{
    TenantGuard, TenantStore, clear_current_tenant, current_tenant, set_current_tenant,
    with_tenant,
};
