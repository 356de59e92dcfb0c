//! In-process synchronization bus.
//!
//! One bus is created by the host and handed to every viewport at
//! construction. `publish` calls every matching subscriber inline, in
//! subscription order, before returning. Subscribers filter their own
//! messages by `origin_id`; the bus itself delivers to everyone.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use shared::{SyncMessage, Topic};

pub type SyncHandler = Rc<dyn Fn(&SyncMessage)>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

struct Subscriber {
    id: SubscriptionId,
    topics: Vec<Topic>,
    handler: SyncHandler,
}

impl Clone for Subscriber {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            topics: self.topics.clone(),
            handler: Rc::clone(&self.handler),
        }
    }
}

type SubscriberList = Rc<RefCell<Vec<Subscriber>>>;

/// Cloneable handle to a shared topic fan-out channel
#[derive(Clone, Default)]
pub struct SyncBus {
    subscribers: SubscriberList,
    next_id: Rc<Cell<u64>>,
    /// Nesting depth of `publish` calls currently on the stack
    depth: Rc<Cell<u32>>,
}

impl fmt::Debug for SyncBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncBus")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

impl SyncBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for `topics`. The subscription lasts until the
    /// returned guard is dropped.
    pub fn subscribe(&self, topics: &[Topic], handler: SyncHandler) -> Subscription {
        let id = SubscriptionId(self.next_id.get());
        self.next_id.set(id.0 + 1);
        self.subscribers.borrow_mut().push(Subscriber {
            id,
            topics: topics.to_vec(),
            handler,
        });
        tracing::debug!(?id, topics = topics.len(), "bus subscribe");
        Subscription {
            id,
            subscribers: Rc::clone(&self.subscribers),
        }
    }

    /// Deliver `message` to every subscriber of its topic
    pub fn publish(&self, message: &SyncMessage) {
        let topic = message.topic();
        if self.depth.get() > 0 {
            tracing::warn!(%topic, depth = self.depth.get(), "nested publish from a bus handler");
        }
        // Snapshot so handlers may subscribe / unsubscribe without a borrow conflict
        let targets: Vec<Subscriber> = self
            .subscribers
            .borrow()
            .iter()
            .filter(|s| s.topics.contains(&topic))
            .cloned()
            .collect();

        tracing::trace!(%topic, origin = %message.origin_id, targets = targets.len(), "publish");
        self.depth.set(self.depth.get() + 1);
        for subscriber in targets {
            (subscriber.handler)(message);
        }
        self.depth.set(self.depth.get() - 1);
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.borrow().len()
    }
}

/// Keeps a bus subscription alive; unsubscribes on drop
pub struct Subscription {
    id: SubscriptionId,
    subscribers: SubscriberList,
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Subscription").field(&self.id).finish()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        // try_borrow_mut: a guard dropped from inside a handler must not panic
        match self.subscribers.try_borrow_mut() {
            Ok(mut subscribers) => {
                subscribers.retain(|s| s.id != self.id);
                tracing::debug!(id = ?self.id, "bus unsubscribe");
            }
            Err(_) => tracing::warn!(id = ?self.id, "bus busy, subscription not removed"),
        }
    }
}
