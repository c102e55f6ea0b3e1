// ── Subscription hub ──
//
// Explicit observer registry with removal handles. Publishing calls every
// handler in subscription order on the publisher's task; a failing
// handler is logged and skipped. There is no buffering or replay: a new
// subscriber should pull the current value right after subscribing.

use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};
use std::task::{Context, Poll};

use tokio::sync::mpsc;
use tokio_stream::Stream;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::{trace, warn};

/// Error a subscriber may hand back to the hub. It is logged, never
/// propagated to the publisher.
pub type SubscriberError = Box<dyn std::error::Error + Send + Sync>;

type Handler<T> = Arc<dyn Fn(&T) -> Result<(), SubscriberError> + Send + Sync>;

/// In-process publish/subscribe hub for values of type `T`.
///
/// Cheaply cloneable; clones share the same subscriber list.
pub struct Broadcaster<T> {
    inner: Arc<HubInner<T>>,
}

struct HubInner<T> {
    name: &'static str,
    next_id: AtomicU64,
    handlers: Mutex<Vec<(u64, Handler<T>)>>,
}

impl<T> Clone for Broadcaster<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Send + Sync + 'static> Broadcaster<T> {
    /// `name` only shows up in logs.
    pub fn new(name: &'static str) -> Self {
        Self {
            inner: Arc::new(HubInner {
                name,
                next_id: AtomicU64::new(1),
                handlers: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Register `handler` for every future publication.
    #[must_use = "keep the Subscription to be able to unsubscribe"]
    pub fn subscribe<F>(&self, handler: F) -> Subscription
    where
        F: Fn(&T) -> Result<(), SubscriberError> + Send + Sync + 'static,
    {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner
            .handlers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, Arc::new(handler)));
        trace!(hub = self.inner.name, subscriber = id, "subscribed");

        let inner: Arc<dyn Detach> = self.inner.clone();
        Subscription {
            id,
            hub: Arc::downgrade(&inner),
        }
    }

    /// Invoke every registered handler with `value`, in subscription order.
    /// Returns how many handlers accepted it.
    pub fn publish(&self, value: &T) -> usize {
        // Snapshot so handlers may (un)subscribe without deadlocking.
        let handlers: Vec<(u64, Handler<T>)> = self
            .inner
            .handlers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        let mut delivered = 0;
        for (id, handler) in handlers {
            match handler(value) {
                Ok(()) => delivered += 1,
                Err(error) => warn!(
                    hub = self.inner.name,
                    subscriber = id,
                    %error,
                    "subscriber failed; continuing delivery"
                ),
            }
        }
        delivered
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner
            .handlers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl<T: Clone + Send + Sync + 'static> Broadcaster<T> {
    /// Subscribe through an unbounded channel instead of a callback.
    ///
    /// The publisher only enqueues, so a slow consumer never holds up a
    /// transition. Order is preserved. Dropping the stream unsubscribes.
    pub fn subscribe_stream(&self) -> BroadcastStream<T> {
        let (tx, rx) = mpsc::unbounded_channel();
        let subscription = self.subscribe(move |value: &T| {
            tx.send(value.clone())
                .map_err(|_| SubscriberError::from("stream receiver dropped"))
        });
        BroadcastStream {
            inner: UnboundedReceiverStream::new(rx),
            subscription,
        }
    }
}

// ── Removal handle ───────────────────────────────────────────────────

trait Detach: Send + Sync {
    fn detach(&self, id: u64) -> bool;
}

impl<T: Send + Sync> Detach for HubInner<T> {
    fn detach(&self, id: u64) -> bool {
        let mut handlers = self
            .handlers
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let before = handlers.len();
        handlers.retain(|(hid, _)| *hid != id);
        let removed = handlers.len() != before;
        if removed {
            trace!(hub = self.name, subscriber = id, "unsubscribed");
        }
        removed
    }
}

/// Handle returned by [`Broadcaster::subscribe`].
///
/// Dropping it does *not* unsubscribe; call [`unsubscribe`](Self::unsubscribe).
pub struct Subscription {
    id: u64,
    hub: Weak<dyn Detach>,
}

impl Subscription {
    /// Stop receiving publications. Safe to call any number of times, and
    /// after the hub itself is gone.
    pub fn unsubscribe(&self) {
        if let Some(hub) = self.hub.upgrade() {
            hub.detach(self.id);
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

/// `Stream` of published values, backed by an unbounded channel.
pub struct BroadcastStream<T> {
    inner: UnboundedReceiverStream<T>,
    subscription: Subscription,
}

impl<T> Stream for BroadcastStream<T> {
    type Item = T;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        // UnboundedReceiverStream is Unpin.
        Pin::new(&mut self.inner).poll_next(cx)
    }
}

impl<T> Drop for BroadcastStream<T> {
    fn drop(&mut self) {
        self.subscription.unsubscribe();
    }
}
