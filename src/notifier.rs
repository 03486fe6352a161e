//! Event notifier: fans out entity lifecycle, game events and diagnostics.
//!
//! Two kinds of subscriber are supported:
//!
//! * callbacks, invoked synchronously on the publishing thread, and
//! * bounded channel subscriptions, for consumers on other threads/tasks.
//!
//! Each notification is delivered against a snapshot of the subscriber list,
//! so a callback may subscribe or unsubscribe (itself included) without
//! deadlocking.  A panicking callback is caught, logged and counted; the
//! remaining subscribers still receive the notification.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use log::{error, trace};
use parking_lot::RwLock;

use crate::entity::Entity;
use crate::error::Diagnostic;
use crate::events::GameEvent;
use crate::guid::Guid;

#[derive(Debug, Clone)]
pub enum Notification {
    Created(Arc<Entity>),
    Updated(Arc<Entity>),
    Removed(Guid),
    Event(GameEvent),
    Diagnostic(Diagnostic),
}

impl Notification {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Created(_) => "created",
            Self::Updated(_) => "updated",
            Self::Removed(_) => "removed",
            Self::Event(e) => e.name(),
            Self::Diagnostic(_) => "diagnostic",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

type Callback = Arc<dyn Fn(&Notification) + Send + Sync>;

#[derive(Clone)]
enum Sink {
    Callback(Callback),
    Channel(Sender<Notification>),
}

pub struct EventNotifier {
    subscribers: RwLock<Vec<(SubscriptionId, Sink)>>,
    next_id: AtomicU64,
    channel_capacity: usize,
    panics: AtomicU64,
    dropped: AtomicU64,
}

impl EventNotifier {
    /// `channel_capacity` bounds every channel subscription.
    pub fn new(channel_capacity: usize) -> Self {
        Self {
            subscribers: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(1),
            channel_capacity: channel_capacity.max(1),
            panics: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
        }
    }

    fn add(&self, sink: Sink) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.subscribers.write().push((id, sink));
        id
    }

    /// Register a callback.  Delivery follows registration order.
    pub fn subscribe<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&Notification) + Send + Sync + 'static,
    {
        self.add(Sink::Callback(Arc::new(callback)))
    }

    /// Register a bounded channel.  When the buffer is full, new notifications
    /// for this subscriber are dropped and counted.  Dropping the receiver
    /// unsubscribes on the next publish.
    pub fn subscribe_channel(&self) -> (SubscriptionId, Receiver<Notification>) {
        let (tx, rx) = bounded(self.channel_capacity);
        (self.add(Sink::Channel(tx)), rx)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subs = self.subscribers.write();
        let before = subs.len();
        subs.retain(|(sid, _)| *sid != id);
        subs.len() != before
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().len()
    }

    /// Deliver `notification` to every subscriber.  Returns how many received it.
    pub fn publish(&self, notification: &Notification) -> usize {
        let snapshot: Vec<(SubscriptionId, Sink)> = self.subscribers.read().clone();
        let mut delivered = 0;
        let mut disconnected = Vec::new();

        for (id, sink) in snapshot {
            match sink {
                Sink::Callback(callback) => {
                    match catch_unwind(AssertUnwindSafe(|| callback(notification))) {
                        Ok(()) => delivered += 1,
                        Err(_) => {
                            self.panics.fetch_add(1, Ordering::Relaxed);
                            error!(
                                "subscriber {:?} panicked handling {} notification",
                                id,
                                notification.name()
                            );
                        }
                    }
                }
                Sink::Channel(tx) => match tx.try_send(notification.clone()) {
                    Ok(()) => delivered += 1,
                    Err(TrySendError::Full(_)) => {
                        self.dropped.fetch_add(1, Ordering::Relaxed);
                        trace!("subscriber {:?} is full, dropping notification", id);
                    }
                    Err(TrySendError::Disconnected(_)) => disconnected.push(id),
                },
            }
        }

        if !disconnected.is_empty() {
            self.subscribers
                .write()
                .retain(|(id, _)| !disconnected.contains(id));
        }
        delivered
    }

    pub fn panic_count(&self) -> u64 {
        self.panics.load(Ordering::Relaxed)
    }

    /// Notifications dropped because a channel subscriber was full.
    pub fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl Default for EventNotifier {
    fn default() -> Self {
        Self::new(1024)
    }
}

impl std::fmt::Debug for EventNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventNotifier")
            .field("subscribers", &self.subscriber_count())
            .field("panics", &self.panic_count())
            .field("dropped", &self.dropped_count())
            .finish()
    }
}
