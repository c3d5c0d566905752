//! Tenant scoping of queries and updates.
//!
//! [`TenantPolicy`] produces the predicates; the other types decide when it
//! runs:
//!
//! - [`ScopedManager`] - base-table filter when a queryset is created
//! - [`TenantQuerySet`] - full rewrite at every SQL-generating event
//! - [`UpdateGuard`] - base-table narrowing on the write path

mod manager;
mod policy;
mod queryset;
mod update;

pub use manager::ScopedManager;
pub use policy::TenantPolicy;
pub use queryset::TenantQuerySet;
pub use update::{RowUpdater, UpdateGuard, UpdateRequest};
