//! Bridges from tokio channels into observables.

use crate::disposable::Disposable;
use crate::error::StreamError;
use crate::observable::Observable;
use crate::observer::Subscriber;
use tokio::runtime::Handle;
use tokio::sync::broadcast::{self, error::RecvError};

/// Exposes a tokio broadcast channel as an observable.
///
/// Every subscription registers its own receiver, so it sees only messages
/// sent after it subscribed. Messages are forwarded by a task spawned on the
/// current runtime; disposing the subscription aborts that task and drops
/// the receiver. A lagged receiver ends the stream with a
/// [`Lagged`](crate::StreamErrorKind::Lagged) error.
///
/// The observable holds the channel weakly: once every other sender is
/// dropped, active subscriptions complete and new ones complete immediately.
pub fn from_broadcast<T>(sender: broadcast::Sender<T>) -> Observable<T>
where
    T: Clone + Send + 'static,
{
    let sender = sender.downgrade();
    Observable::create(move |subscriber: Subscriber<T>| {
        let Ok(runtime) = Handle::try_current() else {
            subscriber.on_error(StreamError::source(
                "broadcast bridge requires a tokio runtime",
            ));
            return Disposable::empty();
        };

        let Some(mut receiver) = sender.upgrade().map(|sender| sender.subscribe()) else {
            tracing::debug!("broadcast channel already closed");
            subscriber.on_completed();
            return Disposable::empty();
        };

        let task = runtime.spawn(async move {
            loop {
                match receiver.recv().await {
                    Ok(value) => {
                        if subscriber.is_disposed() {
                            break;
                        }
                        subscriber.on_next(value);
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "broadcast bridge lagged");
                        subscriber.on_error(StreamError::lagged(skipped));
                        break;
                    }
                    Err(RecvError::Closed) => {
                        subscriber.on_completed();
                        break;
                    }
                }
            }
        });

        Disposable::new(move || task.abort())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::disposable::SubscriptionState;
    use crate::error::StreamErrorKind;
    use crate::observer::Event;
    use tokio::sync::mpsc;

    fn forward(observable: &Observable<u32>) -> (Disposable, mpsc::UnboundedReceiver<Event<u32>>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = observable.subscribe_event(move |event| {
            let _ = tx.send(event);
        });
        (handle, rx)
    }

    async fn wait_for_receivers(sender: &broadcast::Sender<u32>, expected: usize) {
        for _ in 0..100 {
            if sender.receiver_count() == expected {
                return;
            }
            tokio::task::yield_now().await;
        }
        panic!(
            "expected {} receivers, found {}",
            expected,
            sender.receiver_count()
        );
    }

    #[tokio::test]
    async fn test_forwards_until_closed() {
        let (sender, initial) = broadcast::channel(16);
        let observable = from_broadcast(sender.clone());
        let (handle, mut events) = forward(&observable);

        sender.send(1).unwrap();
        sender.send(2).unwrap();
        drop(initial);
        drop(sender);

        assert_eq!(events.recv().await, Some(Event::Next(1)));
        assert_eq!(events.recv().await, Some(Event::Next(2)));
        assert_eq!(events.recv().await, Some(Event::Completed));
        assert_eq!(handle.state(), SubscriptionState::Completed);
    }

    #[tokio::test]
    async fn test_completes_while_observable_alive() {
        let (sender, _) = broadcast::channel(16);
        let observable = from_broadcast(sender.clone());
        let (handle, mut events) = forward(&observable);

        sender.send(1).unwrap();
        drop(sender);

        assert_eq!(events.recv().await, Some(Event::Next(1)));
        assert_eq!(events.recv().await, Some(Event::Completed));
        assert_eq!(handle.state(), SubscriptionState::Completed);

        let (late, mut late_events) = forward(&observable);
        assert_eq!(late_events.recv().await, Some(Event::Completed));
        assert_eq!(late.state(), SubscriptionState::Completed);
    }

    #[tokio::test]
    async fn test_dispose_drops_receiver() {
        let (sender, _) = broadcast::channel::<u32>(16);
        let observable = from_broadcast(sender.clone());
        assert_eq!(sender.receiver_count(), 0);

        let (handle, mut events) = forward(&observable);
        assert_eq!(sender.receiver_count(), 1);
        sender.send(1).unwrap();
        assert_eq!(events.recv().await, Some(Event::Next(1)));

        handle.dispose();
        wait_for_receivers(&sender, 0).await;
        assert!(sender.send(2).is_err());
    }

    #[tokio::test]
    async fn test_lag_is_an_error() {
        let (sender, _) = broadcast::channel::<u32>(1);
        let observable = from_broadcast(sender.clone());
        let (_handle, mut events) = forward(&observable);

        sender.send(1).unwrap();
        sender.send(2).unwrap();
        sender.send(3).unwrap();

        match events.recv().await {
            Some(Event::Error(err)) => assert_eq!(err.kind(), StreamErrorKind::Lagged),
            other => panic!("expected lag error, got {:?}", other),
        }
    }

    #[test]
    fn test_requires_runtime() {
        let (sender, _) = broadcast::channel::<u32>(1);
        let handle = from_broadcast(sender).subscribe_fn(|_| {});
        assert_eq!(handle.state(), SubscriptionState::Errored);
    }
}
