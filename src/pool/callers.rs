//! Program-counter capture into pooled scratch arrays.

use std::mem;
use std::sync::Arc;

use super::{Pool, Recycle};

/// Deepest stack recorded for one capture.
pub const DEFAULT_MAX_DEPTH: usize = 256;

impl Recycle for Vec<usize> {
    fn reset(&mut self) {
        self.clear();
    }

    fn retained_bytes(&self) -> usize {
        self.capacity() * mem::size_of::<usize>()
    }
}

/// Scratch arrays for walking the native stack.
pub struct CallersPool {
    scratch: Arc<Pool<Vec<usize>>>,
    max_depth: usize,
}

impl CallersPool {
    pub fn new(max_depth: usize, max_idle: usize) -> Self {
        let max_depth = max_depth.max(1);
        Self {
            scratch: Arc::new(Pool::new(Vec::new, max_idle, max_depth * mem::size_of::<usize>())),
            max_depth,
        }
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    pub fn idle_count(&self) -> usize {
        self.scratch.idle_count()
    }

    /// Instruction pointers of the current stack, innermost first.
    ///
    /// With `skip == 0` the first entry is the function that called
    /// `callers`; each increment drops one more caller.
    #[inline(never)]
    pub fn callers(&self, skip: usize) -> Vec<usize> {
        let mut scratch = self.scratch.get();
        scratch.reserve_exact(self.max_depth);
        let start = match record(&mut scratch, self.max_depth) {
            // record's own frame, then this one.
            Some(anchor) => anchor + 2 + skip,
            None => skip,
        };
        scratch.get(start..).map(<[usize]>::to_vec).unwrap_or_default()
    }
}

/// Walk the stack into `scratch`. Returns the index of this function's own
/// frame when it can be located by symbol address.
#[inline(never)]
fn record(scratch: &mut Vec<usize>, max_depth: usize) -> Option<usize> {
    let this = record as fn(&mut Vec<usize>, usize) -> Option<usize> as usize;
    let mut anchor = None;
    backtrace::trace(|frame| {
        if anchor.is_none() && frame.symbol_address() as usize == this {
            anchor = Some(scratch.len());
        }
        scratch.push(frame.ip() as usize);
        scratch.len() < max_depth
    });
    anchor
}
