//! Captured call stacks and the stack-carrying wrapper.

use std::borrow::Cow;
use std::error::Error;
use std::ffi::c_void;
use std::fmt::{self, Write as _};
use std::path::Path;
use std::sync::Arc;

use super::format::{render, Formattable};
use super::BoxError;
use crate::pool::Pools;

/// One resolved stack frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub function: String,
    pub file: String,
    pub line: u32,
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}:{}", self.function, self.file, self.line)
    }
}

/// Raw instruction pointers of a captured stack, innermost first.
///
/// Symbols are resolved only when asked for.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Frames {
    pcs: Vec<usize>,
}

impl Frames {
    pub(crate) fn from_pcs(pcs: Vec<usize>) -> Self {
        Self { pcs }
    }

    pub fn len(&self) -> usize {
        self.pcs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pcs.is_empty()
    }

    /// Resolve every frame. Inlined functions expand to several frames.
    pub fn resolve(&self) -> Vec<Frame> {
        let mut frames = Vec::with_capacity(self.pcs.len());
        for &pc in &self.pcs {
            let before = frames.len();
            backtrace::resolve(pc as *mut c_void, |symbol| {
                frames.push(Frame {
                    function: symbol
                        .name()
                        .map(|name| format!("{:#}", name))
                        .unwrap_or_else(|| "<unknown>".to_string()),
                    file: symbol
                        .filename()
                        .and_then(Path::file_name)
                        .map(|name| name.to_string_lossy().into_owned())
                        .unwrap_or_default(),
                    line: symbol.lineno().unwrap_or(0),
                });
            });
            if frames.len() == before {
                frames.push(Frame {
                    function: format!("{:#x}", pc),
                    file: String::new(),
                    line: 0,
                });
            }
        }
        frames
    }
}

/// Stack-accessor capability.
pub trait StackTrace {
    fn stack_frames(&self) -> &Frames;
}

/// An error annotated with the stack at the point it was wrapped.
pub struct WithStack {
    cause: BoxError,
    frames: Frames,
    pools: Arc<Pools>,
}

impl WithStack {
    /// Wrap `cause`, recording the stack above `skip` frames of the caller.
    #[inline(never)]
    pub(crate) fn capture(pools: &Arc<Pools>, cause: BoxError, skip: usize) -> Self {
        let frames = Frames::from_pcs(pools.callers().callers(skip + 1));
        Self {
            cause,
            frames,
            pools: Arc::clone(pools),
        }
    }

    /// Unwrap into the wrapped error.
    pub fn into_cause(self) -> BoxError {
        self.cause
    }
}

impl StackTrace for WithStack {
    fn stack_frames(&self) -> &Frames {
        &self.frames
    }
}

impl Formattable for WithStack {
    /// `stack` followed by one tab-indented `function file:line` per frame.
    fn message(&self) -> Cow<'_, str> {
        let mut buf = self.pools.buffer();
        buf.push_str("stack");
        for frame in self.frames.resolve() {
            let _ = write!(buf, "\n\t{}", frame);
        }
        Cow::Owned(buf.as_str().to_owned())
    }

    fn cause(&self) -> &(dyn Error + 'static) {
        self.cause.as_ref()
    }
}

impl fmt::Display for WithStack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&render(self))
    }
}

impl fmt::Debug for WithStack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WithStack")
            .field("cause", &self.cause)
            .field("depth", &self.frames.len())
            .finish()
    }
}

impl Error for WithStack {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(self.cause.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::{self, Leaf};

    #[test]
    fn test_message_lists_frames() {
        let err = errors::new("x");
        let message = err.message();
        let mut lines = message.lines();
        assert_eq!(lines.next(), Some("stack"));
        let first = lines.next().expect("at least one frame");
        assert!(first.starts_with('\t'));
        assert!(first.contains("test_message_lists_frames"), "got {first}");
        assert!(first.contains("stack.rs:"), "got {first}");
    }

    #[test]
    fn test_display_ends_with_cause() {
        let err = errors::new("disk on fire");
        let rendered = err.to_string();
        assert!(rendered.starts_with("stack\n\t"));
        assert!(rendered.ends_with(": disk on fire"));
    }

    #[test]
    fn test_into_cause() {
        let err = errors::new("inner");
        let cause = err.into_cause();
        assert!(cause.downcast_ref::<Leaf>().is_some());
    }

    #[test]
    fn test_frame_display() {
        let frame = Frame {
            function: "app::handler".into(),
            file: "handler.rs".into(),
            line: 42,
        };
        assert_eq!(frame.to_string(), "app::handler handler.rs:42");
    }
}
