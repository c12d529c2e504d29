//! Bounded-replay broadcast built on crossbeam-channel.
//!
//! Every subscriber owns a bounded queue. Publishing never blocks: when a
//! subscriber's queue is full the event is dropped for that subscriber only,
//! and subscribers whose receiver was dropped are pruned.

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TrySendError};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use crate::config::EngineConfig;

struct Shared<T> {
    replay: VecDeque<T>,
    replay_capacity: usize,
    subscriber_capacity: usize,
    subscribers: Vec<Sender<T>>,
}

/// Fans events out to any number of subscribers.
///
/// Late subscribers first receive up to `replay_capacity` of the most
/// recent events. Cloning yields another handle to the same broadcaster.
pub struct Broadcaster<T> {
    shared: Arc<Mutex<Shared<T>>>,
}

impl<T> Clone for Broadcaster<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T: Clone + Send> Broadcaster<T> {
    /// Create a broadcaster.
    ///
    /// `subscriber_capacity` is raised to at least `replay_capacity` so a new
    /// subscriber can always hold the full replay.
    pub fn new(replay_capacity: usize, subscriber_capacity: usize) -> Self {
        Self {
            shared: Arc::new(Mutex::new(Shared {
                replay: VecDeque::with_capacity(replay_capacity),
                replay_capacity,
                subscriber_capacity: subscriber_capacity.max(replay_capacity).max(1),
                subscribers: Vec::new(),
            })),
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(config.replay_capacity, config.subscriber_capacity)
    }

    fn lock(&self) -> MutexGuard<'_, Shared<T>> {
        // Nothing in the critical sections can leave the state inconsistent
        self.shared
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Deliver an event to every subscriber without blocking
    pub fn publish(&self, event: T) {
        let mut shared = self.lock();

        if shared.replay_capacity > 0 {
            if shared.replay.len() == shared.replay_capacity {
                shared.replay.pop_front();
            }
            shared.replay.push_back(event.clone());
        }

        shared
            .subscribers
            .retain(|sender| match sender.try_send(event.clone()) {
                Ok(()) | Err(TrySendError::Full(_)) => true,
                Err(TrySendError::Disconnected(_)) => false,
            });
    }

    /// Join the broadcast, starting with the replayed events
    pub fn subscribe(&self) -> Subscription<T> {
        let mut shared = self.lock();
        let (sender, receiver) = bounded(shared.subscriber_capacity);

        for event in shared.replay.iter() {
            let _ = sender.try_send(event.clone());
        }
        shared.subscribers.push(sender);

        Subscription { inner: receiver }
    }

    /// Number of live subscribers as of the last publish
    pub fn subscriber_count(&self) -> usize {
        self.lock().subscribers.len()
    }

    /// Drop every subscriber's sender so their iterators finish
    pub fn close(&self) {
        self.lock().subscribers.clear();
    }
}

impl<T: Clone + Send> Default for Broadcaster<T> {
    fn default() -> Self {
        Self::from_config(&EngineConfig::default())
    }
}

/// The receiving end of one subscription
pub struct Subscription<T> {
    inner: Receiver<T>,
}

impl<T> Subscription<T> {
    /// Block until the next event, or `None` once the broadcaster closed
    pub fn recv(&self) -> Option<T> {
        self.inner.recv().ok()
    }

    /// Receive an event without blocking
    pub fn try_recv(&self) -> Option<T> {
        self.inner.try_recv().ok()
    }

    /// Wait at most `timeout` for the next event
    pub fn recv_timeout(&self, timeout: Duration) -> Result<T, RecvTimeoutError> {
        self.inner.recv_timeout(timeout)
    }

    /// Blocking iterator that ends when the broadcaster closes
    pub fn iter(&self) -> impl Iterator<Item = T> + '_ {
        self.inner.iter()
    }

    /// Drain what is queued right now
    pub fn try_iter(&self) -> impl Iterator<Item = T> + '_ {
        self.inner.try_iter()
    }
}
