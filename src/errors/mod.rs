//! Causally linked errors with captured call stacks.
//!
//! # Data Flow
//! ```text
//! failure site
//!     → new / errorf! / wrap / with_stack
//!         → Leaf (message) wrapped by WithStack (frames from pool::callers)
//!     → propagated as a value (Result), optionally wrapped again
//!     → walked with cause / stack_frames / root_cause
//!     → rendered by format.rs, or classified with type_of (chain.rs)
//! ```
//!
//! # Design Decisions
//! - Stacks are captured eagerly so the origin survives any amount of
//!   propagation; symbols are resolved only when rendered
//! - The cause accessor is `Error::source`; the stack accessor is the
//!   [`StackTrace`] trait, probed on the concrete [`WithStack`] type
//! - Constructors skip their own frames: the first captured frame is always
//!   the caller's

pub mod chain;
pub mod format;
pub mod stack;

use std::error::Error;
use std::iter;
use std::sync::Arc;

use crate::pool::Pools;

pub use chain::{type_of, ErrChain, ErrorType};
pub use format::{render, Formattable, Leaf, Wrapped};
pub use stack::{Frame, Frames, StackTrace, WithStack};

pub type BoxError = Box<dyn Error + Send + Sync + 'static>;
pub type SharedError = Arc<dyn Error + Send + Sync + 'static>;

/// A new error carrying `message` and the caller's stack.
#[inline(never)]
pub fn new(message: impl Into<String>) -> WithStack {
    WithStack::capture(Pools::global(), Box::new(Leaf::new(message)), 1)
}

/// Like [`new`], capturing through the given pools.
#[inline(never)]
pub fn new_in(pools: &Arc<Pools>, message: impl Into<String>) -> WithStack {
    WithStack::capture(pools, Box::new(Leaf::new(message)), 1)
}

/// Formatted variant of [`new`](crate::errors::new).
#[macro_export]
macro_rules! errorf {
    ($($arg:tt)+) => {
        $crate::errors::new(::std::format!($($arg)+))
    };
}

/// Wrap `err` with the caller's stack, whether or not it already has one.
#[inline(never)]
pub fn with_stack(err: impl Into<BoxError>) -> WithStack {
    WithStack::capture(Pools::global(), err.into(), 1)
}

/// Wrap `err` with the caller's stack unless something in its chain
/// already carries one.
#[inline(never)]
pub fn ensure_stack(err: impl Into<BoxError>) -> BoxError {
    ensure_stack_skip(err.into(), 1)
}

/// Add `message` in front of `err`, making sure the chain has a stack.
#[inline(never)]
pub fn wrap(err: impl Into<BoxError>, message: impl Into<String>) -> Wrapped {
    Wrapped::new(message.into(), ensure_stack_skip(err.into(), 1))
}

#[inline(never)]
fn ensure_stack_skip(err: BoxError, skip: usize) -> BoxError {
    if has_stack(err.as_ref()) {
        return err;
    }
    Box::new(WithStack::capture(Pools::global(), err, skip + 1))
}

/// The error directly wrapped by `err`, if it exposes one.
pub fn cause<'a>(err: &'a (dyn Error + 'static)) -> Option<&'a (dyn Error + 'static)> {
    err.source()
}

/// `err` followed by each of its causes.
pub fn chain<'a>(
    err: &'a (dyn Error + 'static),
) -> impl Iterator<Item = &'a (dyn Error + 'static)> + 'a {
    iter::successors(Some(err), |e| cause(*e))
}

/// The innermost error of the chain.
pub fn root_cause<'a>(err: &'a (dyn Error + 'static)) -> &'a (dyn Error + 'static) {
    chain(err).last().unwrap_or(err)
}

pub fn has_stack(err: &(dyn Error + 'static)) -> bool {
    chain(err).any(|e| frames_of(e).is_some())
}

/// Every captured stack in the chain, outermost first.
pub fn stack_frames<'a>(err: &'a (dyn Error + 'static)) -> Vec<&'a Frames> {
    chain(err).filter_map(frames_of).collect()
}

fn frames_of<'a>(err: &'a (dyn Error + 'static)) -> Option<&'a Frames> {
    err.downcast_ref::<WithStack>().map(StackTrace::stack_frames)
}

/// Stack helpers on `Result`. `Ok` values pass through untouched.
pub trait ResultExt<T> {
    fn with_stack(self) -> Result<T, WithStack>;
    fn ensure_stack(self) -> Result<T, BoxError>;
}

impl<T, E: Into<BoxError>> ResultExt<T> for Result<T, E> {
    #[inline(never)]
    fn with_stack(self) -> Result<T, WithStack> {
        match self {
            Ok(value) => Ok(value),
            Err(err) => Err(WithStack::capture(Pools::global(), err.into(), 1)),
        }
    }

    #[inline(never)]
    fn ensure_stack(self) -> Result<T, BoxError> {
        match self {
            Ok(value) => Ok(value),
            Err(err) => Err(ensure_stack_skip(err.into(), 1)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fmt;

    fn first_function(frames: &Frames) -> String {
        frames
            .resolve()
            .into_iter()
            .next()
            .map(|f| f.function)
            .unwrap_or_default()
    }

    #[inline(never)]
    fn make_inner() -> WithStack {
        new("inner")
    }

    #[test]
    fn test_new_records_call_site() {
        let err = new("x");
        let stacks = stack_frames(&err);
        assert_eq!(stacks.len(), 1);
        assert!(!stacks[0].is_empty());
        let top = first_function(stacks[0]);
        assert!(top.ends_with("test_new_records_call_site"), "got {top}");
    }

    #[test]
    fn test_errorf_formats_and_records_call_site() {
        let err = crate::errorf!("resort {} missing", 42);
        assert_eq!(root_cause(&err).to_string(), "resort 42 missing");
        let top = first_function(stack_frames(&err)[0]);
        assert!(top.ends_with("test_errorf_formats_and_records_call_site"), "got {top}");
    }

    #[test]
    fn test_new_in_uses_given_pools() {
        let pools = Pools::new(&crate::config::PoolConfig::default());
        let err = new_in(&pools, "x");
        assert!(!stack_frames(&err).is_empty());
        assert_eq!(pools.callers().idle_count(), 1);
    }

    #[test]
    fn test_cause_of_new_is_leaf() {
        let err = new("x");
        let inner = cause(&err).expect("new wraps a leaf");
        assert_eq!(inner.downcast_ref::<Leaf>(), Some(&Leaf::new("x")));
        assert!(cause(inner).is_none());
    }

    #[test]
    fn test_cause_none_without_source() {
        assert!(cause(&fmt::Error).is_none());
    }

    #[test]
    fn test_with_stack_on_ok_is_none() {
        let ok: Result<u8, fmt::Error> = Ok(7);
        assert_eq!(ok.with_stack().ok(), Some(7));

        let err: Result<u8, fmt::Error> = Err(fmt::Error);
        let wrapped = err.with_stack().unwrap_err();
        assert_eq!(stack_frames(&wrapped).len(), 1);
    }

    #[test]
    fn test_with_stack_always_adds_layer() {
        let err = with_stack(new("x"));
        assert_eq!(stack_frames(&err).len(), 2);
    }

    #[test]
    fn test_ensure_stack_idempotent() {
        let once = ensure_stack(Leaf::new("x"));
        assert_eq!(stack_frames(once.as_ref()).len(), 1);
        let twice = ensure_stack(once);
        assert_eq!(stack_frames(twice.as_ref()).len(), 1);
    }

    #[test]
    fn test_ensure_stack_sees_ancestor() {
        let chain = ErrChain::new("outer").with_cause(new("inner"));
        let ensured = ensure_stack(chain);
        assert!(ensured.downcast_ref::<ErrChain>().is_some());
        assert_eq!(stack_frames(ensured.as_ref()).len(), 1);
    }

    #[test]
    fn test_result_ensure_stack() {
        let err: Result<(), Leaf> = Err(Leaf::new("x"));
        let ensured = err.ensure_stack().unwrap_err();
        let top = first_function(stack_frames(ensured.as_ref())[0]);
        assert!(top.ends_with("test_result_ensure_stack"), "got {top}");
    }

    #[test]
    fn test_stack_frames_outer_to_inner() {
        let err = with_stack(make_inner());
        let stacks = stack_frames(&err);
        assert_eq!(stacks.len(), 2);
        assert!(first_function(stacks[0]).ends_with("test_stack_frames_outer_to_inner"));
        assert!(first_function(stacks[1]).ends_with("make_inner"));
    }

    #[test]
    fn test_wrap_adds_message_and_stack() {
        let err = wrap(Leaf::new("connection reset"), "loading resort");
        let rendered = err.to_string();
        assert!(rendered.starts_with("loading resort: stack\n\t"), "got {rendered}");
        assert!(rendered.ends_with(": connection reset"));
        assert_eq!(stack_frames(&err).len(), 1);
        let top = first_function(stack_frames(&err)[0]);
        assert!(top.ends_with("test_wrap_adds_message_and_stack"), "got {top}");
    }

    #[test]
    fn test_root_cause() {
        let err = wrap(new("root"), "outer");
        assert_eq!(root_cause(&err).to_string(), "root");
        assert_eq!(root_cause(&fmt::Error).to_string(), fmt::Error.to_string());
    }
}
