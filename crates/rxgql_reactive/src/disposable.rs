//! Cancellation handles.
//!
//! A [`Disposable`] is the handle returned by every `subscribe` call. It also
//! records where the subscription is in its lifecycle:
//!
//! ```text
//! Unsubscribed -> Active -> { Completed | Errored | Disposed }
//! ```
//!
//! Terminal states are final. Reaching any of them runs the release action
//! exactly once, which is how teardown travels upstream to the producer.

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Lifecycle of a single subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum SubscriptionState {
    /// Nothing has subscribed yet.
    Unsubscribed = 0,
    /// Events are flowing.
    Active = 1,
    /// The source signalled completion.
    Completed = 2,
    /// The source, or a stage in between, signalled an error.
    Errored = 3,
    /// The consumer cancelled before natural termination.
    Disposed = 4,
}

impl SubscriptionState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => Self::Unsubscribed,
            1 => Self::Active,
            2 => Self::Completed,
            3 => Self::Errored,
            _ => Self::Disposed,
        }
    }

    /// Returns true for `Completed`, `Errored` and `Disposed`.
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Errored | Self::Disposed)
    }
}

type ReleaseAction = Box<dyn FnOnce() + Send>;

struct DisposableInner {
    state: AtomicU8,
    release: Mutex<Option<ReleaseAction>>,
}

/// Idempotent, thread-safe cancellation handle.
///
/// Clones share state: disposing any clone disposes all of them.
#[derive(Clone)]
pub struct Disposable {
    inner: Arc<DisposableInner>,
}

impl Disposable {
    /// Creates a handle that runs `release` when the subscription ends.
    pub fn new<F>(release: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self::with_release(Some(Box::new(release)))
    }

    /// Creates a handle with nothing to release.
    pub fn empty() -> Self {
        Self::with_release(None)
    }

    fn with_release(release: Option<ReleaseAction>) -> Self {
        Self {
            inner: Arc::new(DisposableInner {
                state: AtomicU8::new(SubscriptionState::Active as u8),
                release: Mutex::new(release),
            }),
        }
    }

    /// Cancels the subscription and releases upstream resources.
    ///
    /// Has no effect once the subscription reached a terminal state.
    pub fn dispose(&self) {
        if self.transition(SubscriptionState::Disposed) {
            tracing::trace!("subscription disposed");
            self.release();
        }
    }

    /// Returns true once the subscription reached any terminal state.
    pub fn is_disposed(&self) -> bool {
        self.state().is_terminal()
    }

    /// Returns the current lifecycle state.
    pub fn state(&self) -> SubscriptionState {
        SubscriptionState::from_u8(self.inner.state.load(Ordering::Acquire))
    }

    /// Hands the handle to a bag that disposes it when dropped.
    pub fn disposed_by(self, bag: &DisposeBag) {
        bag.insert(self);
    }

    /// Moves an active handle into `to`. Returns false if another terminal
    /// transition won.
    pub(crate) fn transition(&self, to: SubscriptionState) -> bool {
        self.inner
            .state
            .compare_exchange(
                SubscriptionState::Active as u8,
                to as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    /// Runs the release action, at most once over the handle's lifetime.
    pub(crate) fn release(&self) {
        let release = lock(&self.inner.release).take();
        if let Some(release) = release {
            release();
        }
    }

    /// Attaches the producer's handle once `subscribe` has returned it.
    ///
    /// The producer may have terminated the subscription synchronously while
    /// it was being set up, in which case `upstream` is released right away.
    pub(crate) fn bind(&self, upstream: Disposable) {
        let mut slot = lock(&self.inner.release);
        if self.is_disposed() {
            drop(slot);
            upstream.dispose();
        } else {
            *slot = Some(Box::new(move || upstream.dispose()));
        }
    }
}

impl fmt::Debug for Disposable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Disposable")
            .field("state", &self.state())
            .finish()
    }
}

/// Collects handles and disposes all of them when dropped.
#[derive(Default)]
pub struct DisposeBag {
    entries: Mutex<BagEntries>,
}

#[derive(Default)]
struct BagEntries {
    handles: Vec<Disposable>,
    disposed: bool,
}

impl DisposeBag {
    /// Creates an empty bag.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a handle. A bag that was already disposed disposes it immediately.
    pub fn insert(&self, handle: Disposable) {
        let mut entries = lock(&self.entries);
        if entries.disposed {
            drop(entries);
            handle.dispose();
        } else {
            entries.handles.push(handle);
        }
    }

    /// Number of handles currently held.
    pub fn len(&self) -> usize {
        lock(&self.entries).handles.len()
    }

    /// Returns true if the bag holds no handles.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Disposes every held handle.
    pub fn dispose(&self) {
        let handles = {
            let mut entries = lock(&self.entries);
            entries.disposed = true;
            std::mem::take(&mut entries.handles)
        };
        for handle in handles {
            handle.dispose();
        }
    }
}

impl Drop for DisposeBag {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl fmt::Debug for DisposeBag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DisposeBag")
            .field("len", &self.len())
            .finish()
    }
}

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn counting() -> (Disposable, Arc<AtomicUsize>) {
        let count = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&count);
        let handle = Disposable::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        (handle, count)
    }

    #[test]
    fn test_dispose_is_idempotent() {
        let (handle, count) = counting();
        assert_eq!(handle.state(), SubscriptionState::Active);

        handle.dispose();
        handle.clone().dispose();

        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(handle.state(), SubscriptionState::Disposed);
        assert!(handle.is_disposed());
    }

    #[test]
    fn test_terminal_state_is_final() {
        let (handle, count) = counting();
        assert!(handle.transition(SubscriptionState::Completed));
        handle.release();

        handle.dispose();
        assert!(!handle.transition(SubscriptionState::Errored));
        assert_eq!(handle.state(), SubscriptionState::Completed);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_bind_after_dispose_releases_upstream() {
        let handle = Disposable::empty();
        handle.dispose();

        let (upstream, count) = counting();
        handle.bind(upstream.clone());

        assert!(upstream.is_disposed());
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_bind_then_dispose() {
        let handle = Disposable::empty();
        let (upstream, count) = counting();
        handle.bind(upstream.clone());
        assert!(!upstream.is_disposed());

        handle.dispose();
        assert!(upstream.is_disposed());
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_dispose_bag_drop() {
        let (a, a_count) = counting();
        let (b, b_count) = counting();
        {
            let bag = DisposeBag::new();
            a.disposed_by(&bag);
            b.disposed_by(&bag);
            assert_eq!(bag.len(), 2);
        }
        assert_eq!(a_count.load(Ordering::SeqCst), 1);
        assert_eq!(b_count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_insert_into_disposed_bag() {
        let bag = DisposeBag::new();
        bag.dispose();

        let (handle, count) = counting();
        bag.insert(handle);
        assert!(bag.is_empty());
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
