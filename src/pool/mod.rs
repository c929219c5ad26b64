//! Reusable resource pools.
//!
//! # Data Flow
//! ```text
//! error construction
//!     → callers.rs (scratch program-counter array, sized to max depth)
//!     → pooled scratch returned once the used prefix is copied out
//!
//! error rendering
//!     → buffer.rs (reset string buffer)
//!     → buffer returned on drop if under the size ceiling
//! ```
//!
//! # Design Decisions
//! - Pools are plain values shared through `Arc`, injected where needed
//! - A process default exists for call sites that cannot carry a handle
//!   (error constructors); it is installed once at startup
//! - Release never blocks on anything but the free-list mutex

pub mod buffer;
pub mod callers;

use std::ops::{Deref, DerefMut};
use std::sync::{Arc, Mutex, OnceLock, PoisonError};

use crate::config::PoolConfig;

pub use buffer::BufferPool;
pub use callers::CallersPool;

/// Something a [`Pool`] can hand out more than once.
pub trait Recycle: Send + 'static {
    /// Clear contents while keeping the allocation.
    fn reset(&mut self);

    /// Bytes this item keeps allocated when idle.
    fn retained_bytes(&self) -> usize;
}

/// A thread-safe free list of reusable items.
pub struct Pool<T> {
    idle: Mutex<Vec<T>>,
    init: fn() -> T,
    max_idle: usize,
    max_retained_bytes: usize,
}

impl<T: Recycle> Pool<T> {
    /// Create a pool. Items larger than `max_retained_bytes` are dropped on
    /// release instead of being kept.
    pub fn new(init: fn() -> T, max_idle: usize, max_retained_bytes: usize) -> Self {
        Self {
            idle: Mutex::new(Vec::new()),
            init,
            max_idle,
            max_retained_bytes,
        }
    }

    /// Take an item, reset, out of the pool (or make a fresh one).
    pub fn get(self: &Arc<Self>) -> Pooled<T> {
        let reused = self
            .idle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop();
        let mut item = reused.unwrap_or_else(self.init);
        item.reset();
        Pooled {
            item: Some(item),
            pool: Arc::clone(self),
        }
    }

    /// Number of items currently waiting for reuse.
    pub fn idle_count(&self) -> usize {
        self.idle.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    fn put(&self, item: T) {
        if item.retained_bytes() > self.max_retained_bytes {
            return;
        }
        let mut idle = self.idle.lock().unwrap_or_else(PoisonError::into_inner);
        if idle.len() < self.max_idle {
            idle.push(item);
        }
    }
}

/// An item checked out of a [`Pool`]; goes back on drop.
pub struct Pooled<T: Recycle> {
    item: Option<T>,
    pool: Arc<Pool<T>>,
}

impl<T: Recycle> Deref for Pooled<T> {
    type Target = T;
    fn deref(&self) -> &T {
        // Only `Drop` takes the item out.
        self.item.as_ref().unwrap_or_else(|| unreachable!())
    }
}

impl<T: Recycle> DerefMut for Pooled<T> {
    fn deref_mut(&mut self) -> &mut T {
        self.item.as_mut().unwrap_or_else(|| unreachable!())
    }
}

impl<T: Recycle> Drop for Pooled<T> {
    fn drop(&mut self) {
        if let Some(item) = self.item.take() {
            self.pool.put(item);
        }
    }
}

/// The pools used by the error library and the supervisor.
pub struct Pools {
    buffers: Arc<BufferPool>,
    callers: CallersPool,
}

static GLOBAL: OnceLock<Arc<Pools>> = OnceLock::new();

impl Pools {
    /// Build pools from configuration.
    pub fn new(config: &PoolConfig) -> Arc<Self> {
        Arc::new(Self {
            buffers: buffer::new_pool(config.buffer_max_bytes, config.buffer_max_idle),
            callers: CallersPool::new(config.callers_max_depth, config.callers_max_idle),
        })
    }

    /// Install the process default. Returns `false` if one was already set
    /// (including one built lazily by [`Pools::global`]).
    pub fn install(pools: Arc<Pools>) -> bool {
        GLOBAL.set(pools).is_ok()
    }

    /// The process default, built from default configuration on first use.
    pub fn global() -> &'static Arc<Pools> {
        GLOBAL.get_or_init(|| Pools::new(&PoolConfig::default()))
    }

    /// Checkout a reset string buffer.
    pub fn buffer(&self) -> Pooled<String> {
        self.buffers.get()
    }

    pub fn buffers(&self) -> &Arc<BufferPool> {
        &self.buffers
    }

    pub fn callers(&self) -> &CallersPool {
        &self.callers
    }
}
