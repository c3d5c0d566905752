//! Current-actor slot, kept next to the tenant slot.
//!
//! Code far from the inbound request (audit columns, model hooks) sometimes
//! needs to know who is acting. Whoever establishes the unit of work records
//! the actor here; readers ask for it back by concrete type.
//!
//! The slot follows the same rules as [`TenantStore`](super::TenantStore): a
//! task slot inside [`ActorStore::scope`] / [`ActorStore::sync_scope`], a
//! thread slot otherwise.
//!
//! # Examples
//!
//! ```
//! use helios_tenancy::tenant::{ActorStore, current_actor};
//!
//! #[derive(Debug, PartialEq)]
//! struct Clerk(&'static str);
//!
//! let name = ActorStore::sync_scope(Some(Clerk("alice")), || {
//!     current_actor::<Clerk>().map(|clerk| clerk.0)
//! });
//! assert_eq!(name, Some("alice"));
//! assert!(current_actor::<Clerk>().is_none());
//! ```

use std::any::Any;
use std::cell::RefCell;
use std::future::Future;
use std::sync::Arc;

use tracing::trace;

type SharedActor = Arc<dyn Any + Send + Sync>;

thread_local! {
    static THREAD_ACTOR: RefCell<Option<SharedActor>> = const { RefCell::new(None) };
}

tokio::task_local! {
    static TASK_ACTOR: RefCell<Option<SharedActor>>;
}

/// Records `actor` as the actor of this unit of work.
pub fn set_current_actor<A: Any + Send + Sync>(actor: A) {
    ActorStore::replace(Some(Arc::new(actor)));
}

/// Returns the current actor if one is recorded and it is an `A`.
pub fn current_actor<A: Any + Send + Sync>() -> Option<Arc<A>> {
    ActorStore::get()?.downcast::<A>().ok()
}

/// Forgets the current actor.
pub fn clear_current_actor() {
    ActorStore::replace(None);
}

/// Access point for the current-actor slot.
pub struct ActorStore;

impl ActorStore {
    fn get() -> Option<SharedActor> {
        match TASK_ACTOR.try_with(|slot| slot.borrow().clone()) {
            Ok(actor) => actor,
            Err(_) => THREAD_ACTOR.with(|slot| slot.borrow().clone()),
        }
    }

    fn replace(actor: Option<SharedActor>) {
        trace!(recorded = actor.is_some(), "current actor replaced");
        if TASK_ACTOR
            .try_with(|slot| *slot.borrow_mut() = actor.clone())
            .is_err()
        {
            THREAD_ACTOR.with(|slot| *slot.borrow_mut() = actor);
        }
    }

    /// Runs `future` with a fresh task slot holding `actor`.
    pub async fn scope<A, F>(actor: Option<A>, future: F) -> F::Output
    where
        A: Any + Send + Sync,
        F: Future,
    {
        TASK_ACTOR.scope(RefCell::new(erase(actor)), future).await
    }

    /// Synchronous counterpart of [`scope`](Self::scope).
    pub fn sync_scope<A, R>(actor: Option<A>, f: impl FnOnce() -> R) -> R
    where
        A: Any + Send + Sync,
    {
        TASK_ACTOR.sync_scope(RefCell::new(erase(actor)), f)
    }

    /// Captures the current actor without knowing its type.
    pub fn snapshot() -> ActorSnapshot {
        ActorSnapshot(Self::get())
    }
}

/// A captured actor slot, for carrying the actor into work that runs on
/// another thread.
#[derive(Debug, Clone, Default)]
pub struct ActorSnapshot(Option<SharedActor>);

impl ActorSnapshot {
    /// Runs `f` in a fresh task slot holding the captured actor.
    pub fn sync_scope<R>(self, f: impl FnOnce() -> R) -> R {
        TASK_ACTOR.sync_scope(RefCell::new(self.0), f)
    }
}

fn erase<A: Any + Send + Sync>(actor: Option<A>) -> Option<SharedActor> {
    actor.map(|actor| Arc::new(actor) as SharedActor)
}
