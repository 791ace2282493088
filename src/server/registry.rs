//! Ordered listener registry for one event.
//!
//! # Responsibilities
//! - Keep listeners in registration order
//! - Hand out immutable snapshots for emission
//! - Support the splice transaction: claim, compare-and-swap install,
//!   restore on rollback or detach
//!
//! # Design Decisions
//! - `ArcSwap` snapshots: emission never blocks on registration
//! - Mutation is copy-on-write; a snapshot taken before a change stays valid
//! - The splice claim is a separate flag so a second attach is rejected
//!   before anything is read or written

use arc_swap::ArcSwap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;

use crate::server::listener::{same_listener, EventKind};

/// Errors raised while mutating a registry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// The listener list changed between capture and install.
    #[error("`{0}` listeners changed while being replaced")]
    ConcurrentModification(EventKind),
}

/// Listener list for a single event type.
pub struct EventRegistry<L: ?Sized> {
    kind: EventKind,
    listeners: ArcSwap<Vec<Arc<L>>>,
    spliced: AtomicBool,
}

impl<L: ?Sized> EventRegistry<L> {
    pub fn new(kind: EventKind) -> Self {
        Self {
            kind,
            listeners: ArcSwap::from_pointee(Vec::new()),
            spliced: AtomicBool::new(false),
        }
    }

    /// Current listeners, in registration order.
    pub fn snapshot(&self) -> Arc<Vec<Arc<L>>> {
        self.listeners.load_full()
    }

    pub fn len(&self) -> usize {
        self.listeners.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Append a listener.
    pub fn add(&self, listener: Arc<L>) {
        self.listeners.rcu(|current| {
            let mut next = Vec::clone(current);
            next.push(Arc::clone(&listener));
            next
        });
    }

    /// Whether a router currently owns this registry.
    pub fn is_spliced(&self) -> bool {
        self.spliced.load(Ordering::SeqCst)
    }

    /// Mark the registry as owned by a router. False if already owned.
    pub(crate) fn claim(&self) -> bool {
        self.spliced
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    pub(crate) fn release(&self) {
        self.spliced.store(false, Ordering::SeqCst);
    }

    /// Replace the whole list, but only if it is still `expected`.
    pub(crate) fn replace_if_unchanged(
        &self,
        expected: &Arc<Vec<Arc<L>>>,
        replacement: Vec<Arc<L>>,
    ) -> Result<(), RegistryError> {
        let previous = self
            .listeners
            .compare_and_swap(expected, Arc::new(replacement));

        if Arc::ptr_eq(&*previous, expected) {
            Ok(())
        } else {
            Err(RegistryError::ConcurrentModification(self.kind))
        }
    }

    /// Put `captured` back where `installed` sits. Listeners registered
    /// after the install are kept after it. If `installed` is gone the
    /// captured list is put in front.
    pub(crate) fn restore(&self, installed: &Arc<L>, captured: &[Arc<L>]) {
        self.listeners.rcu(|current| {
            let mut next = Vec::with_capacity(current.len() + captured.len());
            let mut found = false;
            for listener in current.iter() {
                if same_listener(listener, installed) {
                    next.extend(captured.iter().cloned());
                    found = true;
                } else {
                    next.push(Arc::clone(listener));
                }
            }
            if !found {
                next.splice(0..0, captured.iter().cloned());
            }
            next
        });
    }
}

impl<L: ?Sized> fmt::Debug for EventRegistry<L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventRegistry")
            .field("kind", &self.kind)
            .field("listeners", &self.len())
            .field("spliced", &self.is_spliced())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> EventRegistry<str> {
        EventRegistry::new(EventKind::Request)
    }

    fn names(r: &EventRegistry<str>) -> Vec<String> {
        r.snapshot().iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn keeps_registration_order() {
        let r = registry();
        assert!(r.is_empty());
        r.add(Arc::from("a"));
        r.add(Arc::from("b"));
        r.add(Arc::from("c"));
        assert!(!r.is_empty());
        assert_eq!(names(&r), ["a", "b", "c"]);
    }

    #[test]
    fn snapshot_is_stable_across_changes() {
        let r = registry();
        r.add(Arc::from("a"));
        let before = r.snapshot();
        r.add(Arc::from("b"));
        assert_eq!(before.len(), 1);
        assert_eq!(r.len(), 2);
    }

    #[test]
    fn claim_is_exclusive() {
        let r = registry();
        assert!(r.claim());
        assert!(!r.claim());
        r.release();
        assert!(r.claim());
    }

    #[test]
    fn replace_rejects_stale_snapshot() {
        let r = registry();
        r.add(Arc::from("a"));
        let captured = r.snapshot();
        r.add(Arc::from("late"));

        let err = r
            .replace_if_unchanged(&captured, vec![Arc::from("x")])
            .unwrap_err();
        assert_eq!(err, RegistryError::ConcurrentModification(EventKind::Request));
        assert_eq!(names(&r), ["a", "late"]);
    }

    #[test]
    fn restore_puts_captured_in_place() {
        let r = registry();
        let a: Arc<str> = Arc::from("a");
        let b: Arc<str> = Arc::from("b");
        r.add(a.clone());
        r.add(b.clone());

        let captured = r.snapshot();
        let installed: Arc<str> = Arc::from("spliced");
        r.replace_if_unchanged(&captured, vec![installed.clone()])
            .unwrap();
        r.add(Arc::from("after"));

        r.restore(&installed, &captured);
        assert_eq!(names(&r), ["a", "b", "after"]);
    }
}
