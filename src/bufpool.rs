//! Bounded pool of reusable byte buffers for payload assembly.

use std::ops::{Deref, DerefMut};

use tokio::sync::mpsc;
use tokio::sync::Mutex;

/// Default number of pooled buffers.
pub const DEFAULT_POOL_SIZE: usize = 10;

/// Fixed-size pool of reusable byte buffers.
///
/// `acquire` waits when every buffer is checked out; dropping the returned
/// guard clears the buffer and hands it back. Buffers keep their allocated
/// capacity across uses, so repeated payload assembly settles to zero
/// allocations.
pub struct BufferPool {
    tx: mpsc::Sender<Vec<u8>>,
    rx: Mutex<mpsc::Receiver<Vec<u8>>>,
}

impl BufferPool {
    /// Create a pool with [`DEFAULT_POOL_SIZE`] buffers.
    pub fn new() -> Self {
        Self::with_size(DEFAULT_POOL_SIZE)
    }

    /// Create a pool holding `size` buffers (minimum 1).
    pub fn with_size(size: usize) -> Self {
        let size = size.max(1);
        let (tx, rx) = mpsc::channel(size);
        for _ in 0..size {
            // channel capacity equals the fill count
            let _ = tx.try_send(Vec::new());
        }
        Self {
            tx,
            rx: Mutex::new(rx),
        }
    }

    /// Take a buffer out of the pool, waiting if none is free.
    pub async fn acquire(&self) -> PooledBuffer {
        let buf = self.rx.lock().await.recv().await.unwrap_or_default();
        PooledBuffer {
            buf,
            tx: self.tx.clone(),
        }
    }
}

impl Default for BufferPool {
    fn default() -> Self {
        Self::new()
    }
}

/// Guard around a pooled buffer; returns it to the pool on drop.
pub struct PooledBuffer {
    buf: Vec<u8>,
    tx: mpsc::Sender<Vec<u8>>,
}

impl Drop for PooledBuffer {
    fn drop(&mut self) {
        let mut buf = std::mem::take(&mut self.buf);
        buf.clear();
        // pool capacity bounds the number of outstanding buffers
        let _ = self.tx.try_send(buf);
    }
}

impl Deref for PooledBuffer {
    type Target = Vec<u8>;

    fn deref(&self) -> &Vec<u8> {
        &self.buf
    }
}

impl DerefMut for PooledBuffer {
    fn deref_mut(&mut self) -> &mut Vec<u8> {
        &mut self.buf
    }
}
