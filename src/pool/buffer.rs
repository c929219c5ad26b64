//! String buffers for rendering error text.

use std::sync::Arc;

use super::{Pool, Recycle};

/// Largest buffer capacity kept for reuse (64 KiB). Bigger buffers are left
/// to the allocator so one oversized render does not pin memory forever.
pub const DEFAULT_MAX_BYTES: usize = 1 << 16;

pub type BufferPool = Pool<String>;

impl Recycle for String {
    fn reset(&mut self) {
        self.clear();
    }

    fn retained_bytes(&self) -> usize {
        self.capacity()
    }
}

pub fn new_pool(max_bytes: usize, max_idle: usize) -> Arc<BufferPool> {
    Arc::new(Pool::new(String::new, max_idle, max_bytes))
}
