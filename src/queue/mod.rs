//! Named FIFO queue abstraction with in-memory and Redis backends.

mod redis;

use std::collections::VecDeque;
use std::sync::Mutex;

use dashmap::DashMap;

use crate::error::{Error, Result};

pub use self::redis::{RedisOptions, RedisQueue};

/// Simple named FIFO queue.
///
/// Items are partitioned by queue name; within one name, `pop` returns
/// items in the order `push` added them.
pub trait Queuer {
    /// Append an item to the named queue.
    async fn push(&self, queue: &str, item: &str) -> Result<()>;

    /// Remove and return the oldest item; [`Error::QueueEmpty`] when none.
    async fn pop(&self, queue: &str) -> Result<String>;

    /// Number of items currently queued under the name.
    async fn len(&self, queue: &str) -> Result<usize>;
}

/// In-memory [`Queuer`] backend.
#[derive(Default)]
pub struct MemoryQueue {
    queues: DashMap<String, Mutex<VecDeque<String>>>,
}

impl MemoryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_queue<T>(&self, queue: &str, f: impl FnOnce(&mut VecDeque<String>) -> T) -> Result<T> {
        let entry = self.queues.entry(queue.to_string()).or_default();
        let mut items = entry
            .lock()
            .map_err(|_| Error::Queue("queue lock poisoned".to_string()))?;

        Ok(f(&mut items))
    }
}

impl Queuer for MemoryQueue {
    async fn push(&self, queue: &str, item: &str) -> Result<()> {
        self.with_queue(queue, |items| items.push_back(item.to_string()))
    }

    async fn pop(&self, queue: &str) -> Result<String> {
        self.with_queue(queue, |items| items.pop_front())?
            .ok_or(Error::QueueEmpty)
    }

    async fn len(&self, queue: &str) -> Result<usize> {
        self.with_queue(queue, |items| items.len())
    }
}
