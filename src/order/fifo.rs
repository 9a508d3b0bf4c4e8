//! Single-producer/single-consumer channel carrying [`DspOrder`] values from
//! the control thread to the render thread.
//!
//! Backed by a fixed-size `ArrayQueue`, so neither side blocks or allocates
//! after construction. A push into a full queue evicts the oldest pending
//! order: only the newest order matters to the render thread.

use crossbeam::queue::ArrayQueue;
use std::sync::Arc;

use super::DspOrder;

const MIN_CAPACITY: usize = 2;

pub struct OrderProducer {
    queue: Arc<ArrayQueue<DspOrder>>,
}

pub struct OrderConsumer {
    queue: Arc<ArrayQueue<DspOrder>>,
}

/// Creates a channel holding up to `capacity` pending orders, at least 2.
pub fn channel(capacity: usize) -> (OrderProducer, OrderConsumer) {
    let queue = Arc::new(ArrayQueue::new(capacity.max(MIN_CAPACITY)));
    (
        OrderProducer {
            queue: Arc::clone(&queue),
        },
        OrderConsumer { queue },
    )
}

impl OrderProducer {
    /// Queues `order` without blocking. When the queue is full the oldest
    /// pending order is evicted and returned.
    pub fn push(&mut self, order: DspOrder) -> Option<DspOrder> {
        self.queue.force_push(order)
    }

    pub fn capacity(&self) -> usize {
        self.queue.capacity()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

impl OrderConsumer {
    pub fn try_pop(&mut self) -> Option<DspOrder> {
        self.queue.pop()
    }

    /// Pops every pending order and returns the most recent one, if any.
    pub fn drain_latest(&mut self) -> Option<DspOrder> {
        let mut latest = None;
        while let Some(order) = self.queue.pop() {
            latest = Some(order);
        }
        latest
    }

    pub fn capacity(&self) -> usize {
        self.queue.capacity()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::order::StageId;
    use std::thread;

    fn rotated(n: usize) -> DspOrder {
        let mut stages = StageId::ALL;
        let len = stages.len();
        stages.rotate_left(n % len);
        DspOrder::new(stages).unwrap()
    }

    #[test]
    fn capacity_has_a_floor() {
        assert_eq!(channel(0).0.capacity(), 2);
        assert_eq!(channel(3).0.capacity(), 3);
        assert_eq!(channel(32).1.capacity(), 32);
    }

    #[test]
    fn empty_channel_pops_nothing() {
        let (_tx, mut rx) = channel(4);
        assert!(rx.try_pop().is_none());
        assert!(rx.drain_latest().is_none());
    }

    #[test]
    fn pops_in_push_order() {
        let (mut tx, mut rx) = channel(4);
        assert_eq!(tx.push(rotated(1)), None);
        assert_eq!(tx.push(rotated(2)), None);
        assert_eq!(rx.len(), 2);
        assert_eq!(rx.try_pop(), Some(rotated(1)));
        assert_eq!(rx.try_pop(), Some(rotated(2)));
        assert!(rx.is_empty());
    }

    #[test]
    fn full_channel_evicts_the_oldest() {
        let (mut tx, mut rx) = channel(2);
        tx.push(rotated(1));
        tx.push(rotated(2));
        assert_eq!(tx.push(rotated(3)), Some(rotated(1)));
        assert_eq!(tx.len(), 2);

        assert_eq!(rx.try_pop(), Some(rotated(2)));
        assert_eq!(rx.drain_latest(), Some(rotated(3)));
    }

    #[test]
    fn drain_keeps_only_the_last() {
        let (mut tx, mut rx) = channel(8);
        for n in 0..5 {
            tx.push(rotated(n));
        }
        assert_eq!(rx.drain_latest(), Some(rotated(4)));
        assert!(rx.is_empty());
    }

    #[test]
    fn concurrent_consumer_ends_on_last_push() {
        const PUSHES: usize = 10_000;
        let (mut tx, mut rx) = channel(16);
        let last = rotated(PUSHES - 1);

        let producer = thread::spawn(move || {
            for n in 0..PUSHES {
                tx.push(rotated(n));
                if n % 64 == 0 {
                    thread::yield_now();
                }
            }
        });

        let mut latest = DspOrder::default();
        while !producer.is_finished() {
            if let Some(order) = rx.drain_latest() {
                latest = order;
            }
        }
        producer.join().unwrap();
        if let Some(order) = rx.drain_latest() {
            latest = order;
        }

        assert_eq!(latest, last);
    }
}
