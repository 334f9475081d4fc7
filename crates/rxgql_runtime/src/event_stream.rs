//! The event stream capability consumed by subscription execution.

/// A lazy, push-based sequence of events observed by a single subscriber.
///
/// Subscription execution only ever asks a stream to derive another stream.
/// Attaching the final subscriber belongs to the concrete implementation, so
/// a transport picks the backing it understands (see
/// [`ObservableEventStream`](crate::ObservableEventStream)).
///
/// Implementations must keep these guarantees:
/// - constructing or transforming a stream does not subscribe to its source;
/// - every upstream event yields exactly one downstream event or error, in
///   the same order, with no buffering;
/// - disposing a derived stream's subscription releases the whole chain up
///   to the originating source;
/// - the first error terminates the stream.
///
/// A stream instance supports one subscription over its lifetime. Do not rely
/// on subscribing again after it terminated.
pub trait EventStream<T>: Send + Sync + 'static {
    /// The stream type produced by mapping events to `To`.
    type Transformed<To: Send + 'static>: EventStream<To>;

    /// Derives a stream that applies `f` to every event.
    ///
    /// `f` runs when an event is delivered to a subscriber, exactly once per
    /// event, on the thread the source emits from.
    fn transform<To, F>(&self, f: F) -> Self::Transformed<To>
    where
        To: Send + 'static,
        F: Fn(T) -> To + Send + Sync + 'static;

    /// Derives a stream that applies a fallible `f` to every event.
    ///
    /// An `Err` is delivered as the stream error for that event and ends the
    /// derived stream.
    fn try_transform<To, E, F>(&self, f: F) -> Self::Transformed<To>
    where
        To: Send + 'static,
        E: std::error::Error + Send + Sync + 'static,
        F: Fn(T) -> Result<To, E> + Send + Sync + 'static;
}
