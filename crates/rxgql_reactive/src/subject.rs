//! Hot multicast source.

use crate::disposable::{lock, Disposable};
use crate::error::StreamError;
use crate::observable::Observable;
use crate::observer::Subscriber;
use std::fmt;
use std::sync::{Arc, Mutex, Weak};

enum Terminal {
    Completed,
    Errored(StreamError),
}

struct SubjectState<T> {
    observers: Vec<(u64, Subscriber<T>)>,
    next_id: u64,
    terminal: Option<Terminal>,
}

/// Broadcasts every value to the observers attached at the time of emission.
///
/// There is no replay: an observer only sees values pushed after it
/// subscribed. Once the subject terminates, later subscribers receive the
/// terminal event straight away.
///
/// # Example
///
/// ```rust,ignore
/// let subject = PublishSubject::new();
/// let handle = subject.as_observable().subscribe_fn(|v: u32| println!("{v}"));
/// subject.on_next(1);
/// handle.dispose();
/// ```
pub struct PublishSubject<T> {
    state: Arc<Mutex<SubjectState<T>>>,
}

impl<T> Clone for PublishSubject<T> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
        }
    }
}

impl<T: Clone + Send + 'static> Default for PublishSubject<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone + Send + 'static> PublishSubject<T> {
    /// Creates a subject with no observers.
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(SubjectState {
                observers: Vec::new(),
                next_id: 0,
                terminal: None,
            })),
        }
    }

    /// Pushes a value to every current observer.
    ///
    /// Returns the number of observers the value was handed to.
    pub fn on_next(&self, value: T) -> usize {
        let observers = {
            let state = lock(&self.state);
            if state.terminal.is_some() {
                return 0;
            }
            state
                .observers
                .iter()
                .map(|(_, subscriber)| subscriber.clone())
                .collect::<Vec<_>>()
        };
        for subscriber in &observers {
            subscriber.on_next(value.clone());
        }
        observers.len()
    }

    /// Terminates the subject with an error.
    pub fn on_error(&self, error: StreamError) {
        for subscriber in self.terminate(Terminal::Errored(error.clone())) {
            subscriber.on_error(error.clone());
        }
    }

    /// Terminates the subject normally.
    pub fn on_completed(&self) {
        for subscriber in self.terminate(Terminal::Completed) {
            subscriber.on_completed();
        }
    }

    fn terminate(&self, terminal: Terminal) -> Vec<Subscriber<T>> {
        let mut state = lock(&self.state);
        if state.terminal.is_some() {
            return Vec::new();
        }
        state.terminal = Some(terminal);
        tracing::debug!(observers = state.observers.len(), "subject terminated");
        std::mem::take(&mut state.observers)
            .into_iter()
            .map(|(_, subscriber)| subscriber)
            .collect()
    }

    /// Number of attached observers.
    pub fn observer_count(&self) -> usize {
        lock(&self.state).observers.len()
    }

    /// Returns true if at least one observer is attached.
    pub fn has_observers(&self) -> bool {
        self.observer_count() > 0
    }

    /// Returns true once `on_completed` or `on_error` was called.
    pub fn is_terminated(&self) -> bool {
        lock(&self.state).terminal.is_some()
    }

    /// Returns an observable that attaches to this subject.
    ///
    /// Disposing a subscription detaches it from the subject.
    pub fn as_observable(&self) -> Observable<T> {
        let state = Arc::downgrade(&self.state);
        Observable::create(move |subscriber: Subscriber<T>| attach(&state, subscriber))
    }
}

fn attach<T: Clone + Send + 'static>(
    state: &Weak<Mutex<SubjectState<T>>>,
    subscriber: Subscriber<T>,
) -> Disposable {
    let Some(shared) = state.upgrade() else {
        subscriber.on_completed();
        return Disposable::empty();
    };

    let mut guard = lock(&shared);
    match &guard.terminal {
        Some(Terminal::Completed) => {
            drop(guard);
            subscriber.on_completed();
            Disposable::empty()
        }
        Some(Terminal::Errored(error)) => {
            let error = error.clone();
            drop(guard);
            subscriber.on_error(error);
            Disposable::empty()
        }
        None => {
            let id = guard.next_id;
            guard.next_id += 1;
            guard.observers.push((id, subscriber));
            drop(guard);

            let state = Weak::clone(state);
            Disposable::new(move || {
                if let Some(shared) = state.upgrade() {
                    lock(&shared).observers.retain(|(other, _)| *other != id);
                }
            })
        }
    }
}

impl<T> fmt::Debug for PublishSubject<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = lock(&self.state);
        f.debug_struct("PublishSubject")
            .field("observers", &state.observers.len())
            .field("terminated", &state.terminal.is_some())
            .finish()
    }
}
