//! # Buffer Pool Module
//!
//! Pre-sized, reusable byte buffers for tile readback and RGB staging.
//!
//! A tiled capture reads back one tile per step, always at the same size. The
//! pool hands the same allocation back out for every tile instead of letting
//! each step allocate and free its own frame, so peak memory during the tile
//! loop is one readback buffer plus the compressed tiles, whatever the grid
//! size. [`BufferPool::trim`] releases the idle buffers and is the periodic
//! reclamation pass of the capture loop.
//!
//! ## Example
//!
//! ```rust
//! use hires_capture::core::buffer_pool::BufferPool;
//!
//! // Pool for 640x360 RGBA readbacks
//! let mut pool = BufferPool::new(640 * 360 * 4, 2);
//!
//! let buffer = pool.get_buffer().expect("allocation");
//! assert_eq!(buffer.len(), 640 * 360 * 4);
//! pool.return_buffer(buffer);
//!
//! let stats = pool.stats();
//! assert_eq!((stats.available, stats.outstanding), (1, 0));
//! ```

use std::collections::VecDeque;

use crate::error::CaptureError;

/// Allocate a zeroed buffer, reporting failure instead of aborting the process.
pub fn try_alloc_zeroed(len: usize, resource: &str) -> Result<Vec<u8>, CaptureError> {
    let mut buffer = Vec::new();
    buffer.try_reserve_exact(len).map_err(|e| {
        CaptureError::allocation(resource, len as u64, e.to_string())
            .with_recovery_suggestion("Lower the resolution scale or capture a smaller region")
    })?;
    buffer.resize(len, 0);
    Ok(buffer)
}

/// Snapshot of pool utilisation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStats {
    /// Buffers idle in the pool
    pub available: usize,
    /// Maximum number of idle buffers retained
    pub max_buffers: usize,
    /// Buffers handed out and not yet returned
    pub outstanding: usize,
    /// Fresh allocations performed over the pool's lifetime
    pub allocations: usize,
}

/// A pool of equally sized byte buffers.
///
/// Buffers that come back with the wrong length (after a [`resize`](Self::resize))
/// or while the pool is full are dropped.
#[derive(Debug)]
pub struct BufferPool {
    buffers: VecDeque<Vec<u8>>,
    /// Size of each buffer in bytes
    buffer_size: usize,
    /// Maximum number of buffers to keep in the pool
    max_buffers: usize,
    outstanding: usize,
    allocations: usize,
}

impl BufferPool {
    /// Creates an empty pool; buffers are allocated lazily on first use.
    pub fn new(buffer_size: usize, max_buffers: usize) -> Self {
        Self {
            buffers: VecDeque::with_capacity(max_buffers),
            buffer_size,
            max_buffers,
            outstanding: 0,
            allocations: 0,
        }
    }

    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    /// Retrieves a buffer from the pool, allocating a new one if none are available.
    pub fn get_buffer(&mut self) -> Result<Vec<u8>, CaptureError> {
        let buffer = match self.buffers.pop_front() {
            Some(buffer) => buffer,
            None => {
                let buffer = try_alloc_zeroed(self.buffer_size, "pooled buffer")?;
                self.allocations += 1;
                buffer
            }
        };
        self.outstanding += 1;
        Ok(buffer)
    }

    /// Returns a buffer to the pool for future reuse.
    pub fn return_buffer(&mut self, mut buffer: Vec<u8>) {
        self.outstanding = self.outstanding.saturating_sub(1);
        if buffer.len() != self.buffer_size || self.buffers.len() >= self.max_buffers {
            return;
        }
        buffer.fill(0);
        self.buffers.push_back(buffer);
    }

    /// Returns current pool statistics.
    pub fn stats(&self) -> PoolStats {
        PoolStats {
            available: self.buffers.len(),
            max_buffers: self.max_buffers,
            outstanding: self.outstanding,
            allocations: self.allocations,
        }
    }

    /// Changes the buffer size and drains the idle buffers.
    pub fn resize(&mut self, new_size: usize) {
        self.buffers.clear();
        self.buffer_size = new_size;
    }

    /// Frees every idle buffer and returns the number of bytes released.
    pub fn trim(&mut self) -> usize {
        let freed = self.buffers.iter().map(Vec::capacity).sum();
        self.buffers.clear();
        freed
    }

    /// Bytes currently held by idle buffers.
    pub fn idle_bytes(&self) -> usize {
        self.buffers.iter().map(Vec::capacity).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffer_pool_reuses_returned_buffers() {
        let mut pool = BufferPool::new(1024, 3);

        let buf1 = pool.get_buffer().unwrap();
        assert_eq!(buf1.len(), 1024);
        pool.return_buffer(buf1);

        let buf2 = pool.get_buffer().unwrap();
        assert_eq!(buf2.len(), 1024);

        let stats = pool.stats();
        assert_eq!(stats.available, 0);
        assert_eq!(stats.outstanding, 1);
        assert_eq!(stats.allocations, 1);
        assert_eq!(stats.max_buffers, 3);
    }

    #[test]
    fn test_buffer_pool_overflow() {
        let mut pool = BufferPool::new(512, 2);

        let buf1 = pool.get_buffer().unwrap();
        let buf2 = pool.get_buffer().unwrap();
        let buf3 = pool.get_buffer().unwrap();

        pool.return_buffer(buf1);
        pool.return_buffer(buf2);
        pool.return_buffer(buf3);

        // Should only keep max_buffers
        let stats = pool.stats();
        assert_eq!(stats.available, 2);
        assert_eq!(stats.outstanding, 0);
        assert_eq!(stats.allocations, 3);
    }

    #[test]
    fn test_returned_buffers_are_zeroed() {
        let mut pool = BufferPool::new(8, 1);
        let mut buf = pool.get_buffer().unwrap();
        buf.fill(0xAB);
        pool.return_buffer(buf);
        assert!(pool.get_buffer().unwrap().iter().all(|&b| b == 0));
    }

    #[test]
    fn test_resize_drops_stale_buffers() {
        let mut pool = BufferPool::new(16, 2);
        let old = pool.get_buffer().unwrap();
        pool.resize(32);
        assert_eq!(pool.buffer_size(), 32);
        pool.return_buffer(old);
        assert_eq!(pool.stats().available, 0);
        assert_eq!(pool.get_buffer().unwrap().len(), 32);
    }

    #[test]
    fn test_trim_releases_idle_memory() {
        let mut pool = BufferPool::new(256, 4);
        let a = pool.get_buffer().unwrap();
        let b = pool.get_buffer().unwrap();
        pool.return_buffer(a);
        pool.return_buffer(b);
        assert!(pool.idle_bytes() >= 512);
        assert!(pool.trim() >= 512);
        assert_eq!(pool.idle_bytes(), 0);
    }

    #[test]
    fn test_try_alloc_reports_impossible_sizes() {
        let err = try_alloc_zeroed(usize::MAX, "output buffer").unwrap_err();
        assert_eq!(err.category(), "allocation");
    }
}
