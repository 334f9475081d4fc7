//! Publish/subscribe hub feeding subscription fields.

use crate::event_stream::EventStream;
use crate::observable_stream::ObservableEventStream;
use rustc_hash::FxHashMap;
use rxgql_reactive::{Observable, PublishSubject, Subscriber};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::marker::PhantomData;
use std::sync::{Arc, PoisonError, RwLock};

/// A topic hub for subscription events.
///
/// Cloning shares the topics. Events published to a topic reach only the
/// subscriptions that are active at that moment. A topic lives as long as a
/// stream returned by [`subscribe`](Self::subscribe) or a subscription to it
/// does.
#[derive(Clone, Default)]
pub struct PubSub {
    channels: Arc<RwLock<FxHashMap<String, Arc<PublishSubject<Value>>>>>,
}

impl PubSub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publishes `event` to `topic`. Returns the number of receivers.
    pub fn publish(&self, topic: impl AsRef<str>, event: Value) -> usize {
        let subject = self
            .channels
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(topic.as_ref())
            .cloned();

        match subject {
            Some(subject) => subject.on_next(event),
            None => 0,
        }
    }

    /// Returns a stream of the events published to `topic`.
    ///
    /// The stream is lazy: it receives events once it is subscribed. Until
    /// then it keeps the topic registered.
    pub fn subscribe(&self, topic: impl Into<String>) -> ObservableEventStream<Value> {
        let subject = Arc::clone(
            self.channels
                .write()
                .unwrap_or_else(PoisonError::into_inner)
                .entry(topic.into())
                .or_default(),
        );
        ObservableEventStream::new(Observable::create(move |subscriber: Subscriber<Value>| {
            subject.as_observable().subscribe(subscriber)
        }))
    }

    pub fn topic_count(&self) -> usize {
        self.channels
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn has_subscribers(&self, topic: &str) -> bool {
        self.channels
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(topic)
            .is_some_and(|subject| subject.has_observers())
    }

    /// Drops topics with neither subscriptions nor outstanding streams.
    pub fn cleanup(&self) {
        let mut channels = self.channels.write().unwrap_or_else(PoisonError::into_inner);
        let before = channels.len();
        channels.retain(|_, subject| Arc::strong_count(subject) > 1 || subject.has_observers());
        tracing::debug!(removed = before - channels.len(), "pubsub cleanup");
    }
}

impl std::fmt::Debug for PubSub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PubSub")
            .field("topics", &self.topic_count())
            .finish()
    }
}

/// A typed wrapper around PubSub for type-safe event publishing.
pub struct TypedPubSub<T> {
    inner: PubSub,
    topic: String,
    _phantom: PhantomData<fn() -> T>,
}

impl<T: Serialize + DeserializeOwned + Send + 'static> TypedPubSub<T> {
    pub fn new(pubsub: PubSub, topic: impl Into<String>) -> Self {
        Self {
            inner: pubsub,
            topic: topic.into(),
            _phantom: PhantomData,
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn publish(&self, event: &T) -> Result<usize, serde_json::Error> {
        let value = serde_json::to_value(event)?;
        Ok(self.inner.publish(&self.topic, value))
    }

    /// Returns a stream of decoded events.
    ///
    /// An event that does not decode as `T` ends the stream with a mapping
    /// error.
    pub fn subscribe(&self) -> ObservableEventStream<T> {
        self.inner
            .subscribe(self.topic.as_str())
            .try_transform(serde_json::from_value::<T>)
    }
}

impl<T> Clone for TypedPubSub<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            topic: self.topic.clone(),
            _phantom: PhantomData,
        }
    }
}
