//! Single-value publish/subscribe holder.

use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::broadcast;

/// Default number of updates buffered per subscriber before it starts lagging.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 256;

/// An observable value: one current value plus an ordered stream of updates.
///
/// Cloning an `Observable` yields another handle to the same value. Every
/// `set` overwrites the current value and is delivered to all live
/// subscribers in publish order. A subscriber that falls more than the
/// channel capacity behind receives `RecvError::Lagged` and can always fall
/// back to [`Observable::get`].
pub struct Observable<T> {
    inner: Arc<Inner<T>>,
}

struct Inner<T> {
    value: RwLock<T>,
    tx: broadcast::Sender<T>,
}

impl<T> Clone for Observable<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Observable<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observable")
            .field("value", &*self.inner.value.read())
            .field("subscribers", &self.inner.tx.receiver_count())
            .finish()
    }
}

impl<T: Default + Clone + Send + 'static> Default for Observable<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: Clone + Send + 'static> Observable<T> {
    /// Creates an observable holding `initial`.
    pub fn new(initial: T) -> Self {
        Self::with_capacity(initial, DEFAULT_CHANNEL_CAPACITY)
    }

    /// Creates an observable with a custom per-subscriber backlog.
    pub fn with_capacity(initial: T, capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self {
            inner: Arc::new(Inner {
                value: RwLock::new(initial),
                tx,
            }),
        }
    }

    /// Returns a copy of the current value.
    pub fn get(&self) -> T {
        self.inner.value.read().clone()
    }

    /// Overwrites the current value and publishes it.
    pub fn set(&self, value: T) {
        // Held across the send so concurrent publishers are observed in the
        // same order as the stored value changes.
        let mut current = self.inner.value.write();
        *current = value.clone();
        let _ = self.inner.tx.send(value);
    }

    /// Mutates the current value in place and publishes the result.
    pub fn modify<F>(&self, f: F) -> T
    where
        F: FnOnce(&mut T),
    {
        let mut current = self.inner.value.write();
        f(&mut current);
        let value = current.clone();
        let _ = self.inner.tx.send(value.clone());
        value
    }

    /// Subscribes to every subsequent update.
    pub fn subscribe(&self) -> broadcast::Receiver<T> {
        self.inner.tx.subscribe()
    }

    /// Number of live subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.inner.tx.receiver_count()
    }

    /// Waits until the value satisfies `predicate` and returns it.
    ///
    /// Returns immediately when the current value already matches.
    pub async fn wait_for<F>(&self, mut predicate: F) -> T
    where
        F: FnMut(&T) -> bool,
    {
        let mut rx = self.subscribe();
        let current = self.get();
        if predicate(&current) {
            return current;
        }
        loop {
            match rx.recv().await {
                Ok(value) if predicate(&value) => return value,
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(_)) => {
                    let current = self.get();
                    if predicate(&current) {
                        return current;
                    }
                }
                // The sender lives inside `self`, so the channel cannot close
                // while we hold a handle.
                Err(broadcast::error::RecvError::Closed) => return self.get(),
            }
        }
    }
}
