//! Reusable transient buffers, keyed by size.
//!
//! Page reads and writes go through a buffer of exactly the backend's page
//! capacity. Rather than allocate one per page visit, the tree draws them
//! from a [`BufferPool`]. A [`PooledBuffer`] returns itself on drop, so a
//! buffer is released exactly once whichever way the operation exits.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Default number of idle buffers kept per size class.
pub const DEFAULT_MAX_IDLE_PER_SIZE: usize = 16;

/// Size-class pool of zeroed byte buffers.
pub struct BufferPool {
    /// Idle buffers, by length.
    classes: Mutex<HashMap<usize, Vec<Vec<u8>>>>,
    /// Idle buffers kept per size class; extras are dropped.
    max_idle_per_size: usize,
    /// Buffers currently handed out.
    outstanding: AtomicUsize,
}

impl BufferPool {
    pub fn new(max_idle_per_size: usize) -> Self {
        Self {
            classes: Mutex::new(HashMap::new()),
            max_idle_per_size,
            outstanding: AtomicUsize::new(0),
        }
    }

    /// Takes a zeroed buffer of exactly `size` bytes.
    pub fn acquire(&self, size: usize) -> PooledBuffer<'_> {
        let recycled = self
            .classes
            .lock()
            .get_mut(&size)
            .and_then(|idle| idle.pop());

        let buf = match recycled {
            Some(mut buf) => {
                buf.fill(0);
                buf
            }
            None => vec![0u8; size],
        };

        self.outstanding.fetch_add(1, Ordering::Relaxed);
        PooledBuffer { pool: self, buf }
    }

    /// Buffers acquired and not yet dropped.
    pub fn outstanding(&self) -> usize {
        self.outstanding.load(Ordering::Relaxed)
    }

    /// Idle buffers currently held for `size`.
    pub fn idle(&self, size: usize) -> usize {
        self.classes.lock().get(&size).map_or(0, Vec::len)
    }

    fn release(&self, buf: Vec<u8>) {
        self.outstanding.fetch_sub(1, Ordering::Relaxed);

        let mut classes = self.classes.lock();
        let idle = classes.entry(buf.len()).or_default();
        if idle.len() < self.max_idle_per_size {
            idle.push(buf);
        }
    }
}

impl Default for BufferPool {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_IDLE_PER_SIZE)
    }
}

/// A buffer on loan from a [`BufferPool`].
pub struct PooledBuffer<'a> {
    pool: &'a BufferPool,
    buf: Vec<u8>,
}

impl Deref for PooledBuffer<'_> {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.buf
    }
}

impl DerefMut for PooledBuffer<'_> {
    fn deref_mut(&mut self) -> &mut [u8] {
        &mut self.buf
    }
}

impl Drop for PooledBuffer<'_> {
    fn drop(&mut self) {
        self.pool.release(std::mem::take(&mut self.buf));
    }
}
