//! FIFO dispatch queue: single producer, many consumers.
//!
//! The producer enqueues every work item and then calls [`DispatchQueue::close`]
//! to signal that the queue is fully populated. Consumers block in
//! [`DispatchQueue::pop`] (or wait with a bound in [`DispatchQueue::poll`])
//! and observe `None` only once the queue is both closed and drained, so no
//! sentinel value is needed and no item can be lost to an exhaustion race.
//!
//! Every item pushed before `close` is delivered to exactly one consumer:
//! the pop is a single locked dequeue, so there is no duplication, and the
//! close-then-drain exit condition means no loss.

use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::fmt;
use std::time::{Duration, Instant};

struct Inner<T> {
    items: VecDeque<T>,
    closed: bool,
}

/// A first-in-first-out work queue with an explicit producer-finished signal.
pub struct DispatchQueue<T> {
    inner: Mutex<Inner<T>>,
    available: Condvar,
}

impl<T> DispatchQueue<T> {
    /// Creates an empty, open queue.
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                items: VecDeque::new(),
                closed: false,
            }),
            available: Condvar::new(),
        }
    }

    /// Enqueues an item at the back of the queue.
    ///
    /// Returns the item back as `Err` if the queue has already been closed;
    /// a closed queue accepts no further work.
    pub fn push(&self, item: T) -> Result<(), T> {
        let mut inner = self.inner.lock();
        if inner.closed {
            return Err(item);
        }
        inner.items.push_back(item);
        drop(inner);
        self.available.notify_one();
        Ok(())
    }

    /// Signals that the producer has finished populating the queue.
    ///
    /// Idempotent. Wakes every waiting consumer so each can drain remaining
    /// items and then observe exhaustion.
    pub fn close(&self) {
        let mut inner = self.inner.lock();
        inner.closed = true;
        drop(inner);
        self.available.notify_all();
    }

    /// Removes and returns the item at the front of the queue.
    ///
    /// Blocks while the queue is empty but still open. Returns `None` once
    /// the queue is closed and every item has been consumed.
    pub fn pop(&self) -> Option<T> {
        let mut inner = self.inner.lock();
        loop {
            if let Some(item) = inner.items.pop_front() {
                return Some(item);
            }
            if inner.closed {
                return None;
            }
            self.available.wait(&mut inner);
        }
    }

    /// Like [`pop`](Self::pop), but waits at most `timeout`.
    ///
    /// Returns `None` either when the timeout elapses with nothing available
    /// or when the queue is exhausted; callers distinguishing the two should
    /// check [`is_closed`](Self::is_closed).
    pub fn poll(&self, timeout: Duration) -> Option<T> {
        let deadline = Instant::now() + timeout;
        let mut inner = self.inner.lock();
        loop {
            if let Some(item) = inner.items.pop_front() {
                return Some(item);
            }
            if inner.closed {
                return None;
            }
            if self
                .available
                .wait_until(&mut inner, deadline)
                .timed_out()
            {
                return inner.items.pop_front();
            }
        }
    }

    /// Whether the producer has finished populating the queue.
    pub fn is_closed(&self) -> bool {
        self.inner.lock().closed
    }

    /// Number of items currently waiting.
    pub fn len(&self) -> usize {
        self.inner.lock().items.len()
    }

    /// Whether no items are currently waiting.
    pub fn is_empty(&self) -> bool {
        self.inner.lock().items.is_empty()
    }
}

impl<T> Default for DispatchQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for DispatchQueue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("DispatchQueue")
            .field("len", &inner.items.len())
            .field("closed", &inner.closed)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_fifo_order_single_consumer() {
        let queue = DispatchQueue::new();
        for i in 0..5 {
            queue.push(i).unwrap();
        }
        queue.close();

        let drained: Vec<i32> = std::iter::from_fn(|| queue.pop()).collect();
        assert_eq!(drained, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_push_after_close_is_rejected() {
        let queue = DispatchQueue::new();
        queue.push(1).unwrap();
        queue.close();
        assert_eq!(queue.push(2), Err(2));
        // The item enqueued before close is still delivered.
        assert_eq!(queue.pop(), Some(1));
        assert_eq!(queue.pop(), None);
    }

    #[test]
    fn test_close_is_idempotent() {
        let queue: DispatchQueue<i32> = DispatchQueue::new();
        queue.close();
        queue.close();
        assert!(queue.is_closed());
        assert_eq!(queue.pop(), None);
    }

    #[test]
    fn test_poll_times_out_on_open_empty_queue() {
        let queue: DispatchQueue<i32> = DispatchQueue::new();
        let start = Instant::now();
        assert_eq!(queue.poll(Duration::from_millis(20)), None);
        assert!(start.elapsed() >= Duration::from_millis(20));
        assert!(!queue.is_closed());
    }

    #[test]
    fn test_poll_returns_immediately_when_exhausted() {
        let queue: DispatchQueue<i32> = DispatchQueue::new();
        queue.close();
        let start = Instant::now();
        assert_eq!(queue.poll(Duration::from_secs(5)), None);
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn test_pop_wakes_on_late_push() {
        let queue = Arc::new(DispatchQueue::new());
        let consumer = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || queue.pop())
        };
        thread::sleep(Duration::from_millis(20));
        queue.push(42).unwrap();
        queue.close();
        assert_eq!(consumer.join().unwrap(), Some(42));
    }

    #[test]
    fn test_exactly_once_consumption_across_consumers() {
        const ITEMS: usize = 200;
        const CONSUMERS: usize = 4;

        let queue = Arc::new(DispatchQueue::new());
        let consumers: Vec<_> = (0..CONSUMERS)
            .map(|_| {
                let queue = Arc::clone(&queue);
                thread::spawn(move || {
                    let mut taken = Vec::new();
                    while let Some(item) = queue.pop() {
                        taken.push(item);
                    }
                    taken
                })
            })
            .collect();

        for i in 0..ITEMS {
            queue.push(i).unwrap();
        }
        queue.close();

        let mut all: Vec<usize> = consumers
            .into_iter()
            .flat_map(|c| c.join().unwrap())
            .collect();
        all.sort_unstable();

        // No duplication, no loss.
        assert_eq!(all, (0..ITEMS).collect::<Vec<_>>());
    }
}
