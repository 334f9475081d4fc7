//! [`EventStream`] backed by an [`Observable`].
//!
//! # Example
//!
//! ```rust,ignore
//! use rxgql_reactive::PublishSubject;
//! use rxgql_runtime::{EventStream, ToEventStream};
//!
//! let subject = PublishSubject::new();
//! let stream = subject.as_observable().to_event_stream();
//! let shouted = stream.transform(|s: String| s.to_uppercase());
//!
//! let handle = shouted.subscribe_fn(|s| println!("{s}"));
//! subject.on_next("hello".to_string());
//! handle.dispose();
//! ```

use crate::event_stream::EventStream;
use crate::executor::ResponseFuture;
use rxgql_reactive::{
    Disposable, Event, EventObserver, FnObserver, Observable, Observer, PublishSubject,
    StreamError, SubscriptionState,
};
use std::fmt;
use std::sync::{Mutex, PoisonError};

/// Stream of per-event responses handed to a transport.
pub type ObservableSubscriptionEventStream = ObservableEventStream<ResponseFuture>;

/// Adapts an [`Observable`] to the [`EventStream`] capability.
///
/// The bound observable is fixed at construction. Wrapping does not
/// subscribe, and neither does [`transform`](EventStream::transform): the
/// derived adapter holds a mapped observable that subscribes to this one only
/// when it is itself subscribed.
pub struct ObservableEventStream<T> {
    observable: Observable<T>,
    subscription: Mutex<Option<Disposable>>,
}

impl<T: Send + 'static> ObservableEventStream<T> {
    /// Wraps an observable.
    pub fn new(observable: Observable<T>) -> Self {
        Self {
            observable,
            subscription: Mutex::new(None),
        }
    }

    /// The bound observable.
    pub fn observable(&self) -> &Observable<T> {
        &self.observable
    }

    /// Unwraps the bound observable.
    pub fn into_observable(self) -> Observable<T> {
        self.observable
    }

    /// Attaches the stream's subscriber.
    ///
    /// Disposing the returned handle releases every upstream stage.
    pub fn subscribe<O>(&self, observer: O) -> Disposable
    where
        O: Observer<T>,
    {
        let handle = self.observable.subscribe(observer);
        let previous = self
            .subscription
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(handle.clone());
        if previous.is_some_and(|previous| !previous.is_disposed()) {
            tracing::warn!("event stream subscribed while a previous subscription is active");
        } else {
            tracing::debug!("event stream subscribed");
        }
        handle
    }

    /// Attaches a closure that receives values only.
    pub fn subscribe_fn<F>(&self, on_next: F) -> Disposable
    where
        F: Fn(T) + Send + Sync + 'static,
    {
        self.subscribe(FnObserver(on_next))
    }

    /// Attaches a closure that receives every notification.
    pub fn subscribe_event<F>(&self, on_event: F) -> Disposable
    where
        F: Fn(Event<T>) + Send + Sync + 'static,
    {
        self.subscribe(EventObserver(on_event))
    }

    /// Lifecycle of this stream's subscription.
    pub fn state(&self) -> SubscriptionState {
        self.subscription
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map_or(SubscriptionState::Unsubscribed, Disposable::state)
    }
}

impl<T: Send + 'static> EventStream<T> for ObservableEventStream<T> {
    type Transformed<To: Send + 'static> = ObservableEventStream<To>;

    fn transform<To, F>(&self, f: F) -> ObservableEventStream<To>
    where
        To: Send + 'static,
        F: Fn(T) -> To + Send + Sync + 'static,
    {
        ObservableEventStream::new(self.observable.map(f))
    }

    fn try_transform<To, E, F>(&self, f: F) -> ObservableEventStream<To>
    where
        To: Send + 'static,
        E: std::error::Error + Send + Sync + 'static,
        F: Fn(T) -> Result<To, E> + Send + Sync + 'static,
    {
        ObservableEventStream::new(
            self.observable
                .try_map(move |event| f(event).map_err(StreamError::mapping)),
        )
    }
}

impl<T> fmt::Debug for ObservableEventStream<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self
            .subscription
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map_or(SubscriptionState::Unsubscribed, Disposable::state);
        f.debug_struct("ObservableEventStream")
            .field("state", &state)
            .finish()
    }
}

/// Wraps push sources into [`ObservableEventStream`]s.
pub trait ToEventStream<T> {
    /// Wraps `self` without subscribing to it.
    fn to_event_stream(&self) -> ObservableEventStream<T>;
}

impl<T: Send + 'static> ToEventStream<T> for Observable<T> {
    fn to_event_stream(&self) -> ObservableEventStream<T> {
        ObservableEventStream::new(self.clone())
    }
}

impl<T: Clone + Send + 'static> ToEventStream<T> for PublishSubject<T> {
    fn to_event_stream(&self) -> ObservableEventStream<T> {
        ObservableEventStream::new(self.as_observable())
    }
}
