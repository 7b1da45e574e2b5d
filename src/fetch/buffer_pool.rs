//! Reusable scratch buffers for origin bodies.
//!
//! A buffer is checked out per fetch and handed back when its `PooledBuffer`
//! guard drops, so early returns and panics release it too.

use std::ops::{Deref, DerefMut};
use std::sync::{Arc, Mutex, PoisonError};

/// Bounded free list of byte buffers.
#[derive(Debug)]
pub struct BufferPool {
    free: Mutex<Vec<Vec<u8>>>,
    /// Maximum number of idle buffers kept.
    max_idle: usize,
    /// Buffers that grew beyond this capacity are dropped, not pooled.
    max_retained_capacity: usize,
}

impl BufferPool {
    pub fn new(max_idle: usize, max_retained_capacity: usize) -> Self {
        Self {
            free: Mutex::new(Vec::with_capacity(max_idle)),
            max_idle,
            max_retained_capacity,
        }
    }

    /// Take an empty buffer from the pool, allocating if none is idle.
    pub fn checkout(self: &Arc<Self>) -> PooledBuffer {
        let buf = self
            .free
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop()
            .unwrap_or_default();
        PooledBuffer {
            buf,
            pool: Arc::clone(self),
        }
    }

    /// Number of buffers currently idle in the pool.
    pub fn idle(&self) -> usize {
        self.free.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    fn give_back(&self, mut buf: Vec<u8>) {
        if buf.capacity() > self.max_retained_capacity {
            return;
        }
        buf.clear();
        let mut free = self.free.lock().unwrap_or_else(PoisonError::into_inner);
        if free.len() < self.max_idle {
            free.push(buf);
        }
    }
}

/// A buffer on loan from a `BufferPool`.
#[derive(Debug)]
pub struct PooledBuffer {
    buf: Vec<u8>,
    pool: Arc<BufferPool>,
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

impl Drop for PooledBuffer {
    fn drop(&mut self) {
        self.pool.give_back(std::mem::take(&mut self.buf));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffer_returns_on_drop() {
        let pool = Arc::new(BufferPool::new(2, 1024));
        {
            let mut buf = pool.checkout();
            buf.extend_from_slice(b"hello");
            assert_eq!(pool.idle(), 0);
        }
        assert_eq!(pool.idle(), 1);

        // Reused buffers come back empty.
        let buf = pool.checkout();
        assert!(buf.is_empty());
        assert!(buf.capacity() >= 5);
    }

    #[test]
    fn test_idle_count_is_bounded() {
        let pool = Arc::new(BufferPool::new(2, 1024));
        let held: Vec<_> = (0..5).map(|_| pool.checkout()).collect();
        drop(held);
        assert_eq!(pool.idle(), 2);
    }

    #[test]
    fn test_oversized_buffers_are_discarded() {
        let pool = Arc::new(BufferPool::new(2, 16));
        {
            let mut buf = pool.checkout();
            buf.extend_from_slice(&[0u8; 64]);
        }
        assert_eq!(pool.idle(), 0);
    }

    #[test]
    fn test_returned_during_unwind() {
        let pool = Arc::new(BufferPool::new(2, 1024));
        let p = Arc::clone(&pool);
        let result = std::panic::catch_unwind(move || {
            let _buf = p.checkout();
            panic!("boom");
        });
        assert!(result.is_err());
        assert_eq!(pool.idle(), 1);
    }
}
