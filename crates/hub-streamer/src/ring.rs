//! # Ring Buffer
//!
//! Bounded FIFO with drop-oldest overflow. `push` never blocks: when the
//! buffer is full the oldest item is evicted in the same critical section
//! that admits the new one. `pop` waits until an item is available or the
//! buffer is closed.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use tokio::sync::Notify;

struct State<T> {
    items: VecDeque<T>,
    closed: bool,
}

pub struct RingBuffer<T> {
    state: Mutex<State<T>>,
    capacity: usize,
    available: Notify,
    evicted: AtomicU64,
}

impl<T> RingBuffer<T> {
    /// Create a buffer holding at most `capacity` items (minimum 1).
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            state: Mutex::new(State {
                items: VecDeque::with_capacity(capacity),
                closed: false,
            }),
            capacity,
            available: Notify::new(),
            evicted: AtomicU64::new(0),
        }
    }

    /// Append `item`, evicting the oldest item if the buffer is full.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(oldest))` - The buffer was full; `oldest` was evicted
    /// - `Ok(None)` - The item was admitted without eviction
    /// - `Err(item)` - The buffer is closed; the item is handed back
    pub fn push(&self, item: T) -> Result<Option<T>, T> {
        let Ok(mut state) = self.state.lock() else {
            return Err(item);
        };
        if state.closed {
            return Err(item);
        }

        let evicted = if state.items.len() >= self.capacity {
            self.evicted.fetch_add(1, Ordering::Relaxed);
            state.items.pop_front()
        } else {
            None
        };
        state.items.push_back(item);
        drop(state);

        self.available.notify_one();
        Ok(evicted)
    }

    /// Take the oldest item, waiting until one is available.
    ///
    /// Returns `None` once the buffer is closed.
    pub async fn pop(&self) -> Option<T> {
        loop {
            let notified = self.available.notified();
            tokio::pin!(notified);
            // Register before checking so a push between check and await is not missed.
            notified.as_mut().enable();

            {
                let mut state = self.state.lock().ok()?;
                if state.closed {
                    return None;
                }
                if let Some(item) = state.items.pop_front() {
                    return Some(item);
                }
            }

            notified.await;
        }
    }

    /// Take the oldest item without waiting.
    pub fn try_pop(&self) -> Option<T> {
        let mut state = self.state.lock().ok()?;
        if state.closed {
            return None;
        }
        state.items.pop_front()
    }

    /// Close the buffer, discarding anything still buffered and waking all
    /// pending `pop` calls.
    pub fn close(&self) {
        if let Ok(mut state) = self.state.lock() {
            state.closed = true;
            state.items.clear();
        }
        self.available.notify_waiters();
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.state.lock().map(|state| state.closed).unwrap_or(true)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.state.lock().map(|state| state.items.len()).unwrap_or(0)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Total number of items evicted by overflow.
    #[must_use]
    pub fn evicted(&self) -> u64 {
        self.evicted.load(Ordering::Relaxed)
    }
}
