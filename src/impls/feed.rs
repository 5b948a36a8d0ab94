use log::debug;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use uuid::Uuid;

use crate::core::models::vote::VoteEvent;
use crate::core::ports::feed::VoteFeed;

#[derive(Debug, Default)]
struct Subscribers {
    next_id: u64,
    by_poll: HashMap<Uuid, HashMap<u64, UnboundedSender<VoteEvent>>>,
}

fn lock(subscribers: &Mutex<Subscribers>) -> MutexGuard<'_, Subscribers> {
    subscribers.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// In-process fan-out of vote events to live result viewers.
///
/// Each subscriber owns an unbounded queue, so a slow viewer never loses
/// events that were published while it was registered.
#[derive(Debug, Clone, Default)]
pub struct VoteHub {
    subscribers: Arc<Mutex<Subscribers>>,
}

impl VoteHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, poll_id: Uuid) -> Subscription {
        let (sender, receiver) = unbounded_channel();
        let mut subscribers = lock(&self.subscribers);
        let id = subscribers.next_id;
        subscribers.next_id += 1;
        subscribers.by_poll.entry(poll_id).or_default().insert(id, sender);
        debug!("subscription {} opened for poll {}", id, poll_id);
        Subscription {
            poll_id,
            id,
            receiver,
            hub: Arc::downgrade(&self.subscribers),
        }
    }

    pub fn subscriber_count(&self, poll_id: Uuid) -> usize {
        lock(&self.subscribers).by_poll.get(&poll_id).map_or(0, HashMap::len)
    }
}

impl VoteFeed for VoteHub {
    fn publish(&self, event: VoteEvent) {
        let mut subscribers = lock(&self.subscribers);
        if let Some(senders) = subscribers.by_poll.get_mut(&event.poll_id) {
            senders.retain(|_, sender| sender.send(event.clone()).is_ok());
            if senders.is_empty() {
                subscribers.by_poll.remove(&event.poll_id);
            }
        }
    }
}

/// A live view on one poll. Dropping it unsubscribes.
#[derive(Debug)]
pub struct Subscription {
    poll_id: Uuid,
    id: u64,
    receiver: UnboundedReceiver<VoteEvent>,
    hub: Weak<Mutex<Subscribers>>,
}

impl Subscription {
    pub async fn recv(&mut self) -> Option<VoteEvent> {
        self.receiver.recv().await
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        let Some(subscribers) = self.hub.upgrade() else {
            return;
        };
        let mut subscribers = lock(&subscribers);
        if let Some(senders) = subscribers.by_poll.get_mut(&self.poll_id) {
            senders.remove(&self.id);
            if senders.is_empty() {
                subscribers.by_poll.remove(&self.poll_id);
            }
        }
        debug!("subscription {} closed for poll {}", self.id, self.poll_id);
    }
}
