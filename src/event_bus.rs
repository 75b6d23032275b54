//! Typed event channel for lifecycle and monitoring notifications
//!
//! Subscribers receive their own FIFO channel. Publishers collect events while
//! mutating state and dispatch them only after the mutation is committed and
//! every lock is released.

use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::Mutex;

/// Fan-out event bus with one channel per subscriber
pub struct EventBus<E> {
    subscribers: Mutex<Vec<Sender<E>>>,
}

impl<E: Clone + Send> EventBus<E> {
    pub fn new() -> Self {
        Self {
            subscribers: Mutex::new(Vec::new()),
        }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> Receiver<E> {
        let (sender, receiver) = unbounded();
        self.subscribers.lock().push(sender);
        receiver
    }

    /// Deliver one event to every live subscriber
    pub fn emit(&self, event: E) {
        self.dispatch(std::iter::once(event));
    }

    /// Deliver events in order, dropping subscribers whose receiver is gone
    pub fn dispatch<I>(&self, events: I)
    where
        I: IntoIterator<Item = E>,
    {
        let mut subscribers = self.subscribers.lock();
        if subscribers.is_empty() {
            return;
        }

        let before = subscribers.len();
        for event in events {
            // send only fails once the receiver has been dropped
            subscribers.retain(|sender| sender.send(event.clone()).is_ok());
        }

        if subscribers.len() < before {
            log::debug!(
                "[EventBus] Pruned {} disconnected subscribers",
                before - subscribers.len()
            );
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }
}

impl<E: Clone + Send> Default for EventBus<E> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_events_arrive_in_order() {
        let bus: EventBus<u32> = EventBus::new();
        let receiver = bus.subscribe();

        bus.dispatch(vec![1, 2, 3]);
        bus.emit(4);

        let received: Vec<u32> = receiver.try_iter().collect();
        assert_eq!(received, vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_dropped_subscriber_is_pruned() {
        let bus: EventBus<u32> = EventBus::new();
        let keep = bus.subscribe();
        let dropped = bus.subscribe();
        drop(dropped);

        bus.emit(7);
        assert_eq!(bus.subscriber_count(), 1);
        assert_eq!(keep.try_recv().ok(), Some(7));
    }
}
