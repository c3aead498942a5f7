//! Free-list of fixed-size handshake buffers.
//!
//! A buffer is taken with [`BufferPool::acquire`] and handed back when the
//! returned [`PooledBuffer`] is dropped, so every exit path of a handshake
//! releases it.

use std::ops::{Deref, DerefMut};
use std::sync::{Arc, Mutex};

/// Idle buffers kept around once released
pub const DEFAULT_MAX_IDLE: usize = 256;

#[derive(Debug)]
struct Inner {
    buffer_size: usize,
    max_idle: usize,
    idle: Mutex<Vec<Vec<u8>>>,
}

/// BufferPool hands out zeroed byte buffers of a fixed size
#[derive(Debug, Clone)]
pub struct BufferPool {
    inner: Arc<Inner>,
}

impl BufferPool {
    pub fn new(buffer_size: usize) -> Self {
        Self::with_max_idle(buffer_size, DEFAULT_MAX_IDLE)
    }

    pub fn with_max_idle(buffer_size: usize, max_idle: usize) -> Self {
        Self {
            inner: Arc::new(Inner {
                buffer_size,
                max_idle,
                idle: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn buffer_size(&self) -> usize {
        self.inner.buffer_size
    }

    /// acquire takes an idle buffer or allocates a fresh one
    pub fn acquire(&self) -> PooledBuffer {
        let reused = self
            .inner
            .idle
            .lock()
            .ok()
            .and_then(|mut idle| idle.pop());

        let buf = reused.unwrap_or_else(|| vec![0u8; self.inner.buffer_size]);

        PooledBuffer {
            buf: Some(buf),
            pool: Arc::clone(&self.inner),
        }
    }

    /// idle returns the number of buffers waiting to be reused
    pub fn idle(&self) -> usize {
        self.inner.idle.lock().map(|idle| idle.len()).unwrap_or(0)
    }
}

/// PooledBuffer returns its storage to the pool on drop
#[derive(Debug)]
pub struct PooledBuffer {
    buf: Option<Vec<u8>>,
    pool: Arc<Inner>,
}

impl Deref for PooledBuffer {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        self.buf.as_deref().unwrap_or_default()
    }
}

impl DerefMut for PooledBuffer {
    fn deref_mut(&mut self) -> &mut [u8] {
        self.buf.as_deref_mut().unwrap_or_default()
    }
}

impl Drop for PooledBuffer {
    fn drop(&mut self) {
        let Some(mut buf) = self.buf.take() else {
            return;
        };

        // Never hand stale handshake bytes to the next connection
        buf.fill(0);

        if let Ok(mut idle) = self.pool.idle.lock() {
            if idle.len() < self.pool.max_idle {
                idle.push(buf);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acquire_gives_full_size_buffer() {
        let pool = BufferPool::new(512);
        let buf = pool.acquire();
        assert_eq!(buf.len(), 512);
        assert_eq!(pool.buffer_size(), 512);
    }

    #[test]
    fn drop_returns_buffer_zeroed() {
        let pool = BufferPool::new(16);
        {
            let mut buf = pool.acquire();
            buf[0] = 0xaa;
            assert_eq!(pool.idle(), 0);
        }
        assert_eq!(pool.idle(), 1);

        let buf = pool.acquire();
        assert_eq!(pool.idle(), 0);
        assert!(buf.iter().all(|&b| b == 0));
    }

    #[test]
    fn idle_list_is_bounded() {
        let pool = BufferPool::with_max_idle(8, 2);
        let bufs: Vec<_> = (0..4).map(|_| pool.acquire()).collect();
        drop(bufs);
        assert_eq!(pool.idle(), 2);
    }
}
