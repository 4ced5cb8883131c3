//! Bounded buffer pool with power-of-two size classes.
//!
//! `Get(n)` hands back a buffer of length exactly `n`, backed by the
//! smallest class that fits it; allocations above the largest class fall
//! through to the heap. Buffers are returned to their class automatically
//! when the [`PooledBuffer`] guard drops, which both matches the spec's
//! "callers must not retain references after Put" rule and makes the
//! mistake unrepresentable rather than merely discouraged.

use bytes::BytesMut;
use parking_lot::Mutex;

/// Size classes, smallest to largest. Anything larger than the last class
/// is allocated directly and not pooled.
const CLASSES: [usize; 4] = [512, 1024, 2048, 4096];

fn class_for(n: usize) -> Option<usize> {
    CLASSES.iter().position(|&size| n <= size)
}

pub struct BufferPool {
    free: [Mutex<Vec<BytesMut>>; CLASSES.len()],
}

impl Default for BufferPool {
    fn default() -> Self {
        Self {
            free: Default::default(),
        }
    }
}

impl BufferPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire a buffer of exactly `len` bytes, zeroed.
    ///
    /// ```
    /// use vsoa_codec::pool::BufferPool;
    ///
    /// let pool = BufferPool::new();
    /// let buf = pool.acquire(300);
    /// assert_eq!(buf.len(), 300);
    /// assert!(buf.iter().all(|&b| b == 0));
    /// ```
    pub fn acquire(&self, len: usize) -> PooledBuffer<'_> {
        match class_for(len) {
            Some(class) => {
                let mut buf = self.free[class].lock().pop().unwrap_or_else(|| {
                    let mut b = BytesMut::with_capacity(CLASSES[class]);
                    b.resize(CLASSES[class], 0);
                    b
                });
                buf.resize(len, 0);
                PooledBuffer {
                    buf: Some(buf),
                    class: Some(class),
                    pool: self,
                }
            }
            None => PooledBuffer {
                buf: Some({
                    let mut b = BytesMut::with_capacity(len);
                    b.resize(len, 0);
                    b
                }),
                class: None,
                pool: self,
            },
        }
    }

    fn release(&self, class: usize, mut buf: BytesMut) {
        buf.clear();
        buf.resize(CLASSES[class], 0);
        self.free[class].lock().push(buf);
    }
}

/// A buffer on loan from a [`BufferPool`]. Returns itself to the pool's free
/// list (for its size class) on drop; unclassed (oversize) buffers are
/// simply dropped.
pub struct PooledBuffer<'a> {
    buf: Option<BytesMut>,
    class: Option<usize>,
    pool: &'a BufferPool,
}

impl std::ops::Deref for PooledBuffer<'_> {
    type Target = BytesMut;

    fn deref(&self) -> &Self::Target {
        self.buf.as_ref().expect("buffer taken")
    }
}

impl std::ops::DerefMut for PooledBuffer<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.buf.as_mut().expect("buffer taken")
    }
}

impl Drop for PooledBuffer<'_> {
    fn drop(&mut self) {
        if let (Some(buf), Some(class)) = (self.buf.take(), self.class) {
            self.pool.release(class, buf);
        }
    }
}
