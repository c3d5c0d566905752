//! Current-tenant slot for the active unit of work.
//!
//! A unit of work owns exactly one mutable slot holding at most one
//! [`TenantId`]. The slot lives in one of two places:
//!
//! - **Task slot**: when the caller runs inside [`TenantStore::scope`] (or
//!   [`TenantStore::sync_scope`]), the slot is a tokio task-local and vanishes
//!   when the scope ends. This is what request middleware should use.
//! - **Thread slot**: otherwise a thread-local is used, matching the classic
//!   thread-per-request model.
//!
//! The thread slot is never cleared implicitly. Code running on pooled worker
//! threads should use [`TenantStore::enter`] or [`with_tenant`], whose guard
//! restores the previous value on drop.
//!
//! # Examples
//!
//! ```
//! use helios_tenancy::tenant::{current_tenant, set_current_tenant, with_tenant, TenantId};
//!
//! set_current_tenant(1);
//! assert_eq!(current_tenant(), Some(TenantId::from(1)));
//!
//! with_tenant(2, || {
//!     assert_eq!(current_tenant(), Some(TenantId::from(2)));
//! });
//!
//! // restored after the closure
//! assert_eq!(current_tenant(), Some(TenantId::from(1)));
//! ```

use std::cell::RefCell;
use std::future::Future;
use std::marker::PhantomData;

use tracing::trace;

use super::id::TenantId;

thread_local! {
    static THREAD_SLOT: RefCell<Option<TenantId>> = const { RefCell::new(None) };
}

tokio::task_local! {
    static TASK_SLOT: RefCell<Option<TenantId>>;
}

/// Sets the current tenant for this unit of work.
///
/// No validation is performed. The previous value, if any, is overwritten.
pub fn set_current_tenant(tenant: impl Into<TenantId>) {
    TenantStore::replace(Some(tenant.into()));
}

/// Returns the current tenant for this unit of work, if one is set.
pub fn current_tenant() -> Option<TenantId> {
    TenantStore::get()
}

/// Clears the current tenant for this unit of work.
pub fn clear_current_tenant() {
    TenantStore::replace(None);
}

/// Runs `f` with `tenant` as the current tenant, restoring the previous value
/// afterwards (including on unwind).
pub fn with_tenant<R>(tenant: impl Into<TenantId>, f: impl FnOnce() -> R) -> R {
    let _guard = TenantStore::enter(tenant);
    f()
}

/// Access point for the current-tenant slot.
pub struct TenantStore;

impl TenantStore {
    /// Returns the current tenant.
    pub fn get() -> Option<TenantId> {
        if Self::in_task_scope() {
            TASK_SLOT
                .try_with(|slot| slot.borrow().clone())
                .ok()
                .flatten()
        } else {
            THREAD_SLOT.with(|slot| slot.borrow().clone())
        }
    }

    /// Stores `tenant` in the active slot and returns the previous value.
    pub fn replace(tenant: Option<TenantId>) -> Option<TenantId> {
        trace!(tenant = ?tenant, task_scoped = Self::in_task_scope(), "current tenant replaced");

        if Self::in_task_scope() {
            TASK_SLOT
                .try_with(|slot| slot.replace(tenant))
                .ok()
                .flatten()
        } else {
            THREAD_SLOT.with(|slot| slot.replace(tenant))
        }
    }

    /// Makes `tenant` current until the returned guard is dropped.
    pub fn enter(tenant: impl Into<TenantId>) -> TenantGuard {
        TenantGuard::install(Some(tenant.into()))
    }

    /// Clears the current tenant until the returned guard is dropped.
    ///
    /// Queries issued meanwhile run under the missing-tenant policy, which by
    /// default means unscoped. Intended for maintenance paths.
    pub fn suspend() -> TenantGuard {
        TenantGuard::install(None)
    }

    /// Runs `future` as its own unit of work with a fresh task slot holding
    /// `tenant`.
    ///
    /// Reads and writes made inside the future (on any thread the task moves
    /// to) see only this slot; it is discarded when the future completes.
    pub async fn scope<F>(tenant: Option<TenantId>, future: F) -> F::Output
    where
        F: Future,
    {
        TASK_SLOT.scope(RefCell::new(tenant), future).await
    }

    /// Synchronous counterpart of [`scope`](Self::scope).
    pub fn sync_scope<R>(tenant: Option<TenantId>, f: impl FnOnce() -> R) -> R {
        TASK_SLOT.sync_scope(RefCell::new(tenant), f)
    }

    /// Returns `true` when running inside a task slot.
    pub fn in_task_scope() -> bool {
        TASK_SLOT.try_with(|_| ()).is_ok()
    }
}

/// Restores the previous current tenant on drop.
///
/// Guards must be dropped in reverse order of creation; they are `!Send` so
/// they cannot migrate to a thread whose slot they did not modify.
#[must_use = "the previous tenant is restored as soon as the guard is dropped"]
pub struct TenantGuard {
    previous: Option<TenantId>,
    _not_send: PhantomData<*const ()>,
}

impl TenantGuard {
    fn install(tenant: Option<TenantId>) -> Self {
        let previous = TenantStore::replace(tenant);
        Self {
            previous,
            _not_send: PhantomData,
        }
    }

    /// Returns the tenant that will be restored.
    pub fn previous(&self) -> Option<&TenantId> {
        self.previous.as_ref()
    }
}

impl Drop for TenantGuard {
    fn drop(&mut self) {
        TenantStore::replace(self.previous.take());
    }
}

impl std::fmt::Debug for TenantGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TenantGuard")
            .field("previous", &self.previous)
            .finish()
    }
}
