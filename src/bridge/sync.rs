//! Opt-in serialization between the event side and the draw side.
//!
//! When the engine delivers events on the same context that draws (events are only ever
//! pumped from within the host's own tick), no lock is needed: use
//! [`SyncPolicy::SameContext`]. Otherwise share an [`SyncPolicy::Exclusive`] lock between
//! the bridge and any other code that touches the surfaces.
//!
//! The bridge takes the lock itself around every surface mutation, the disposal drain and
//! for the lifetime of a composited [`Frame`](crate::render::Frame). The lock is not
//! reentrant: do not call into the bridge while holding a guard obtained from
//! [`SyncPolicy::enter`].

use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Clone, Debug, Default)]
pub enum SyncPolicy {
    /// Events and drawing never overlap in time. No locking.
    #[default]
    SameContext,
    /// Events and drawing may run concurrently. Every surface access takes this lock.
    Exclusive(Arc<Mutex<()>>),
}

impl SyncPolicy {
    /// Creates an exclusive policy with a fresh lock.
    pub fn exclusive() -> Self {
        SyncPolicy::Exclusive(Arc::new(Mutex::new(())))
    }

    /// Returns the shared lock, if any, so the host can guard its own surface access.
    pub fn lock(&self) -> Option<Arc<Mutex<()>>> {
        match self {
            SyncPolicy::SameContext => None,
            SyncPolicy::Exclusive(lock) => Some(lock.clone()),
        }
    }

    /// Enters the critical section. A no-op for [`SyncPolicy::SameContext`].
    pub fn enter(&self) -> SyncGuard<'_> {
        match self {
            SyncPolicy::SameContext => SyncGuard(None),
            // The mutex guards no data, a poisoned lock is as good as a clean one.
            SyncPolicy::Exclusive(lock) => SyncGuard(Some(lock.lock().unwrap_or_else(|e| e.into_inner()))),
        }
    }
}

/// Held for the duration of a critical section.
#[must_use]
pub struct SyncGuard<'a>(Option<MutexGuard<'a, ()>>);

impl SyncGuard<'_> {
    /// Returns true when a real lock is held.
    pub fn is_locked(&self) -> bool {
        self.0.is_some()
    }
}

impl std::fmt::Debug for SyncGuard<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("SyncGuard").field(&self.is_locked()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_context_never_locks() {
        let policy = SyncPolicy::SameContext;
        let a = policy.enter();
        let b = policy.enter();
        assert!(!a.is_locked());
        assert!(!b.is_locked());
        assert!(policy.lock().is_none());
    }

    #[test]
    fn exclusive_blocks_other_holders() {
        let policy = SyncPolicy::exclusive();
        let lock = policy.lock().unwrap();

        let guard = policy.enter();
        assert!(guard.is_locked());
        assert!(lock.try_lock().is_err());
        drop(guard);
        assert!(lock.try_lock().is_ok());
    }

    #[test]
    fn exclusive_survives_poisoning() {
        let policy = SyncPolicy::exclusive();
        let lock = policy.lock().unwrap();
        let _ = std::thread::spawn(move || {
            let _g = lock.lock().unwrap();
            panic!("poison");
        })
        .join();

        assert!(policy.enter().is_locked());
    }
}
