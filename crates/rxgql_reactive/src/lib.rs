//! Push-based reactive sequences for rxgql.
//!
//! This crate provides the push-source side of a subscription:
//! - `observable`: cold sequences, `map` / `try_map`
//! - `observer`: the `Observer` trait and the producer-side `Subscriber`
//! - `disposable`: cancellation handles and subscription lifecycle
//! - `subject`: `PublishSubject`, a hot multicast source
//! - `bridge`: adapters from tokio channels
//!
//! Values are forwarded synchronously on the producer's thread. Nothing here
//! buffers, batches or replays.

pub mod bridge;
pub mod disposable;
pub mod error;
pub mod observable;
pub mod observer;
pub mod subject;

pub use bridge::from_broadcast;
pub use disposable::{DisposeBag, Disposable, SubscriptionState};
pub use error::{StreamError, StreamErrorKind};
pub use observable::Observable;
pub use observer::{Event, EventObserver, FnObserver, Observer, Subscriber};
pub use subject::PublishSubject;
