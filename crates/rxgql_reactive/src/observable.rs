//! Cold, push-based sequences.

use crate::disposable::Disposable;
use crate::error::StreamError;
use crate::observer::{Event, EventObserver, FnObserver, Observer, Subscriber};
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

type SubscribeFn<T> = dyn Fn(Subscriber<T>) -> Disposable + Send + Sync;

/// A push-based sequence of values.
///
/// An `Observable` only describes how to produce values. Nothing runs until
/// [`subscribe`](Self::subscribe) is called, and every subscription runs the
/// producer again. Clones share the same producer.
pub struct Observable<T> {
    on_subscribe: Arc<SubscribeFn<T>>,
}

impl<T> Clone for Observable<T> {
    fn clone(&self) -> Self {
        Self {
            on_subscribe: Arc::clone(&self.on_subscribe),
        }
    }
}

impl<T> fmt::Debug for Observable<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observable").finish_non_exhaustive()
    }
}

impl<T: Send + 'static> Observable<T> {
    /// Creates an observable from a producer.
    ///
    /// `producer` runs once per subscription. It emits through the given
    /// [`Subscriber`] and returns a [`Disposable`] that releases whatever it
    /// set up (timers, channel registrations, tasks).
    pub fn create<F>(producer: F) -> Self
    where
        F: Fn(Subscriber<T>) -> Disposable + Send + Sync + 'static,
    {
        Self {
            on_subscribe: Arc::new(producer),
        }
    }

    /// Attaches an observer and starts the producer.
    pub fn subscribe<O>(&self, observer: O) -> Disposable
    where
        O: Observer<T>,
    {
        let handle = Disposable::empty();
        let subscriber = Subscriber::new(Arc::new(observer), handle.clone());
        let upstream = (self.on_subscribe)(subscriber);
        handle.bind(upstream);
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

    /// Applies `f` to every value, one output per input.
    ///
    /// `f` runs synchronously on the thread the upstream emits from.
    pub fn map<U, F>(&self, f: F) -> Observable<U>
    where
        U: Send + 'static,
        F: Fn(T) -> U + Send + Sync + 'static,
    {
        let source = self.clone();
        let f = Arc::new(f);
        Observable::<U>::create(move |downstream: Subscriber<U>| {
            source.subscribe(MapObserver {
                downstream,
                f: Arc::clone(&f),
            })
        })
    }

    /// Applies a fallible `f` to every value.
    ///
    /// The first `Err` is delivered as the stream error and ends the
    /// subscription, releasing the upstream.
    pub fn try_map<U, E, F>(&self, f: F) -> Observable<U>
    where
        U: Send + 'static,
        E: Into<StreamError> + 'static,
        F: Fn(T) -> Result<U, E> + Send + Sync + 'static,
    {
        let source = self.clone();
        let f = Arc::new(f);
        Observable::<U>::create(move |downstream: Subscriber<U>| {
            source.subscribe(TryMapObserver {
                downstream,
                f: Arc::clone(&f),
                _error: PhantomData,
            })
        })
    }

    /// Emits every item of `items`, then completes.
    pub fn from_iter<I>(items: I) -> Self
    where
        I: IntoIterator<Item = T> + Clone + Send + Sync + 'static,
    {
        Self::create(move |subscriber| {
            for item in items.clone() {
                if subscriber.is_disposed() {
                    break;
                }
                subscriber.on_next(item);
            }
            subscriber.on_completed();
            Disposable::empty()
        })
    }

    /// Completes immediately.
    pub fn empty() -> Self {
        Self::create(|subscriber| {
            subscriber.on_completed();
            Disposable::empty()
        })
    }

    /// Never emits and never terminates.
    pub fn never() -> Self {
        Self::create(|_| Disposable::empty())
    }

    /// Fails immediately with `error`.
    pub fn error(error: StreamError) -> Self {
        Self::create(move |subscriber| {
            subscriber.on_error(error.clone());
            Disposable::empty()
        })
    }
}

impl<T: Clone + Send + Sync + 'static> Observable<T> {
    /// Emits `value`, then completes.
    pub fn just(value: T) -> Self {
        Self::create(move |subscriber| {
            subscriber.on_next(value.clone());
            subscriber.on_completed();
            Disposable::empty()
        })
    }
}

struct MapObserver<U, F> {
    downstream: Subscriber<U>,
    f: Arc<F>,
}

impl<T, U, F> Observer<T> for MapObserver<U, F>
where
    U: Send + 'static,
    F: Fn(T) -> U + Send + Sync + 'static,
{
    fn on_next(&self, value: T) {
        self.downstream.on_next((self.f)(value));
    }

    fn on_error(&self, error: StreamError) {
        self.downstream.on_error(error);
    }

    fn on_completed(&self) {
        self.downstream.on_completed();
    }
}

struct TryMapObserver<U, E, F> {
    downstream: Subscriber<U>,
    f: Arc<F>,
    _error: PhantomData<fn() -> E>,
}

impl<T, U, E, F> Observer<T> for TryMapObserver<U, E, F>
where
    U: Send + 'static,
    E: Into<StreamError> + 'static,
    F: Fn(T) -> Result<U, E> + Send + Sync + 'static,
{
    fn on_next(&self, value: T) {
        match (self.f)(value) {
            Ok(mapped) => self.downstream.on_next(mapped),
            Err(error) => {
                let error = error.into();
                tracing::warn!("mapping stage failed: {}", error);
                self.downstream.on_error(error);
            }
        }
    }

    fn on_error(&self, error: StreamError) {
        self.downstream.on_error(error);
    }

    fn on_completed(&self) {
        self.downstream.on_completed();
    }
}
