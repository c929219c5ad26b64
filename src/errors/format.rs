//! Single-line rendering shared by the wrapping error types.

use std::borrow::Cow;
use std::error::Error;
use std::fmt;

use super::BoxError;

/// An error made of its own message plus a mandatory cause.
pub trait Formattable: Error {
    fn message(&self) -> Cow<'_, str>;
    fn cause(&self) -> &(dyn Error + 'static);
}

/// `cause` when the message is empty, `message: cause` otherwise.
pub fn render(err: &dyn Formattable) -> String {
    let message = err.message();
    let cause = Formattable::cause(err).to_string();
    if message.is_empty() {
        return cause;
    }
    format!("{}: {}", message, cause)
}

/// A plain message with no cause.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Leaf {
    message: String,
}

impl Leaf {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for Leaf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl Error for Leaf {}

/// Context added on top of another error.
#[derive(Debug)]
pub struct Wrapped {
    message: String,
    cause: BoxError,
}

impl Wrapped {
    pub(crate) fn new(message: String, cause: BoxError) -> Self {
        Self { message, cause }
    }
}

impl Formattable for Wrapped {
    fn message(&self) -> Cow<'_, str> {
        Cow::Borrowed(&self.message)
    }

    fn cause(&self) -> &(dyn Error + 'static) {
        self.cause.as_ref()
    }
}

impl fmt::Display for Wrapped {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&render(self))
    }
}

impl Error for Wrapped {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(self.cause.as_ref())
    }
}
