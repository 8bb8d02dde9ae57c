use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Condvar, Mutex};

/// Unbounded FIFO shared between one producer loop and one consumer loop.
///
/// Clones are handles to the same sequence. A queue lives for the whole
/// session and is never cleared.
pub struct Queue<T> {
    inner: Arc<QueueInner<T>>,
}

struct QueueInner<T> {
    items: Mutex<VecDeque<T>>,
    available: Condvar,
}

impl<T> Queue<T> {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(QueueInner {
                items: Mutex::new(VecDeque::new()),
                available: Condvar::new(),
            }),
        }
    }

    pub fn push(&self, item: T) {
        self.inner.items.lock().push_back(item);
        self.inner.available.notify_one();
    }

    pub fn try_pop(&self) -> Option<T> {
        self.inner.items.lock().pop_front()
    }

    /// Pop the oldest item, waiting up to `timeout` for one to arrive.
    pub fn pop_timeout(&self, timeout: Duration) -> Option<T> {
        let mut items = self.inner.items.lock();
        if items.is_empty() {
            // Spurious wakeups just shorten the poll.
            let _ = self.inner.available.wait_for(&mut items, timeout);
        }
        items.pop_front()
    }

    /// Take everything queued so far, oldest first.
    pub fn drain(&self) -> Vec<T> {
        self.inner.items.lock().drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.inner.items.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.items.lock().is_empty()
    }
}

impl<T> Clone for Queue<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Default for Queue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> std::fmt::Debug for Queue<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Queue").field("len", &self.len()).finish()
    }
}
