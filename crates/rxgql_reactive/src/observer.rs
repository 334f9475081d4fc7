//! Observers and the producer-side [`Subscriber`] handle.

use crate::disposable::{Disposable, SubscriptionState};
use crate::error::StreamError;
use std::sync::Arc;

/// Receives values pushed by an [`Observable`](crate::Observable).
///
/// Calls follow the grammar `on_next* (on_error | on_completed)?` and arrive
/// on whatever thread the producer emits from. Producers must not call an
/// observer concurrently with itself.
///
/// # Example
///
/// ```rust,ignore
/// struct Printer;
///
/// impl Observer<String> for Printer {
///     fn on_next(&self, value: String) {
///         println!("{value}");
///     }
/// }
/// ```
pub trait Observer<T>: Send + Sync + 'static {
    /// Called for each value.
    fn on_next(&self, value: T);

    /// Called once if the stream fails. Nothing follows it.
    ///
    /// Default implementation logs the error via `tracing::warn!`.
    fn on_error(&self, error: StreamError) {
        tracing::warn!("unhandled stream error: {}", error);
    }

    /// Called once if the stream finishes normally. Nothing follows it.
    fn on_completed(&self) {}
}

/// A single notification, as seen by [`Observable::subscribe_event`](crate::Observable::subscribe_event).
#[derive(Debug, Clone, PartialEq)]
pub enum Event<T> {
    /// A value.
    Next(T),
    /// Terminal failure.
    Error(StreamError),
    /// Terminal success.
    Completed,
}

impl<T> Event<T> {
    /// Returns true for `Error` and `Completed`.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Next(_))
    }

    /// Returns the value of a `Next` event.
    pub fn value(&self) -> Option<&T> {
        match self {
            Self::Next(value) => Some(value),
            _ => None,
        }
    }
}

/// Adapter that wraps an `on_next` closure into an [`Observer`].
///
/// Errors fall through to the trait's default handling.
pub struct FnObserver<F>(pub F);

impl<T, F> Observer<T> for FnObserver<F>
where
    F: Fn(T) + Send + Sync + 'static,
{
    fn on_next(&self, value: T) {
        (self.0)(value);
    }
}

/// Adapter that routes every notification through one closure.
pub struct EventObserver<F>(pub F);

impl<T, F> Observer<T> for EventObserver<F>
where
    F: Fn(Event<T>) + Send + Sync + 'static,
{
    fn on_next(&self, value: T) {
        (self.0)(Event::Next(value));
    }

    fn on_error(&self, error: StreamError) {
        (self.0)(Event::Error(error));
    }

    fn on_completed(&self) {
        (self.0)(Event::Completed);
    }
}

/// Producer-side handle to one subscription.
///
/// Handed to the closure passed to [`Observable::create`](crate::Observable::create).
/// It drops everything that arrives after a terminal event or after the
/// consumer disposed, and a terminal event releases the producer's resources.
pub struct Subscriber<T> {
    observer: Arc<dyn Observer<T>>,
    handle: Disposable,
}

impl<T> Clone for Subscriber<T> {
    fn clone(&self) -> Self {
        Self {
            observer: Arc::clone(&self.observer),
            handle: self.handle.clone(),
        }
    }
}

impl<T: 'static> Subscriber<T> {
    pub(crate) fn new(observer: Arc<dyn Observer<T>>, handle: Disposable) -> Self {
        Self { observer, handle }
    }

    /// Delivers a value unless the subscription already ended.
    pub fn on_next(&self, value: T) {
        if self.handle.state() == SubscriptionState::Active {
            self.observer.on_next(value);
        }
    }

    /// Terminates the subscription with an error.
    pub fn on_error(&self, error: StreamError) {
        if self.handle.transition(SubscriptionState::Errored) {
            self.observer.on_error(error);
            self.handle.release();
        }
    }

    /// Terminates the subscription normally.
    pub fn on_completed(&self) {
        if self.handle.transition(SubscriptionState::Completed) {
            self.observer.on_completed();
            self.handle.release();
        }
    }

    /// Returns true once nothing more will be delivered.
    ///
    /// Long-running producers should poll this to stop early.
    pub fn is_disposed(&self) -> bool {
        self.handle.is_disposed()
    }
}

/// Forwarding into a subscriber keeps its delivery rules.
impl<T: 'static> Observer<T> for Subscriber<T> {
    fn on_next(&self, value: T) {
        Subscriber::on_next(self, value);
    }

    fn on_error(&self, error: StreamError) {
        Subscriber::on_error(self, error);
    }

    fn on_completed(&self) {
        Subscriber::on_completed(self);
    }
}
