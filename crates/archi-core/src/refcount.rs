//! Reference-counted handle with a one-shot destructor (component A).
//!
//! The manual [`RefCount::increment`]/[`RefCount::decrement`] pair is
//! deliberately separate from Rust's own `Clone`/`Drop` machinery: cloning
//! a [`RefCount`] handle (as happens whenever a [`crate::Pointer`] carrying
//! one is copied around) must *not* implicitly change the logical count,
//! exactly as the specification requires. The `Arc` underneath only keeps
//! the bookkeeping alive for as long as any handle references it; the
//! `AtomicU32` is the counter the specification actually describes.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

type Destructor = Box<dyn FnOnce() + Send>;

struct Inner {
    count: AtomicU32,
    destructor: Mutex<Option<Destructor>>,
}

/// A reference-counted handle with a destructor that runs exactly once,
/// on the thread that performs the decrement which brings the count to
/// zero.
///
/// A default-constructed `RefCount` is null: `increment`/`decrement` are
/// no-ops on it, matching "a null handle is legal and is a no-op for both
/// operations".
#[derive(Clone, Default)]
pub struct RefCount(Option<Arc<Inner>>);

impl RefCount {
    /// Allocate a new handle with an initial count of 1.
    ///
    /// `destructor` plays the role of the original's
    /// `(destructor_fn, data)` pair: capture whatever the destructor needs
    /// in the closure itself.
    #[must_use]
    pub fn alloc<F>(destructor: F) -> RefCount
    where
        F: FnOnce() + Send + 'static,
    {
        RefCount(Some(Arc::new(Inner {
            count: AtomicU32::new(1),
            destructor: Mutex::new(Some(Box::new(destructor))),
        })))
    }

    /// The null handle.
    #[must_use]
    pub const fn null() -> RefCount {
        RefCount(None)
    }

    /// True if this is the null handle.
    #[must_use]
    pub const fn is_null(&self) -> bool {
        self.0.is_none()
    }

    /// Raise the count. No-op on a null handle.
    pub fn increment(&self) {
        if let Some(inner) = &self.0 {
            inner.count.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Lower the count. No-op on a null handle. Runs the destructor
    /// exactly once, synchronously, if the count reaches zero.
    pub fn decrement(&self) {
        let Some(inner) = &self.0 else { return };
        if inner.count.fetch_sub(1, Ordering::Release) == 1 {
            std::sync::atomic::fence(Ordering::Acquire);
            if let Some(destructor) = inner.destructor.lock().unwrap().take() {
                destructor();
            }
        }
    }

    /// Current count, or 0 for the null handle. For tests and diagnostics.
    #[must_use]
    pub fn count(&self) -> u32 {
        self.0
            .as_ref()
            .map_or(0, |inner| inner.count.load(Ordering::Acquire))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool;

    #[test]
    fn null_handle_is_a_no_op() {
        let rc = RefCount::null();
        assert!(rc.is_null());
        rc.increment();
        rc.decrement();
        assert_eq!(rc.count(), 0);
    }

    #[test]
    fn destructor_runs_exactly_once_on_last_decrement() {
        let ran = Arc::new(AtomicBool::new(false));
        let ran_clone = ran.clone();
        let rc = RefCount::alloc(move || {
            let already = ran_clone.swap(true, Ordering::SeqCst);
            assert!(!already, "destructor ran twice");
        });
        assert_eq!(rc.count(), 1);

        rc.increment();
        assert_eq!(rc.count(), 2);
        rc.decrement();
        assert!(!ran.load(Ordering::SeqCst));

        rc.decrement();
        assert!(ran.load(Ordering::SeqCst));
    }

    #[test]
    fn cloning_the_handle_does_not_change_the_count() {
        let rc = RefCount::alloc(|| {});
        let cloned = rc.clone();
        assert_eq!(rc.count(), 1);
        assert_eq!(cloned.count(), 1);

        cloned.decrement();
        assert_eq!(rc.count(), 0);
    }

    proptest::proptest! {
        #[test]
        fn balanced_inc_dec_never_runs_destructor_early(extra in 0u32..64) {
            let ran = Arc::new(AtomicBool::new(false));
            let ran_clone = ran.clone();
            let rc = RefCount::alloc(move || ran_clone.store(true, Ordering::SeqCst));

            for _ in 0..extra {
                rc.increment();
            }
            for _ in 0..extra {
                rc.decrement();
                assert!(!ran.load(Ordering::SeqCst));
            }
            rc.decrement();
            assert!(ran.load(Ordering::SeqCst));
        }
    }
}
