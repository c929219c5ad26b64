//! Field-annotated, classified error chain.

use std::collections::BTreeMap;
use std::error::Error;
use std::fmt;
use std::sync::Arc;

use super::SharedError;

/// Closed set of classifications callers dispatch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, thiserror::Error)]
pub enum ErrorType {
    #[error("bad request")]
    BadRequest,
    #[error("no valid user found")]
    NoValidUserFound,
    #[error("already registered")]
    AlreadyRegistered,
    #[error("forbidden resource")]
    ForbiddenResource,
    #[error("not found")]
    NotFound,
    #[error("internal error")]
    Internal,
}

/// An error with a message, optional cause, string fields and a type.
///
/// `Clone` copies the field map, so annotating one copy never shows up in
/// another.
#[derive(Debug, Clone, Default)]
pub struct ErrChain {
    pub message: String,
    pub cause: Option<SharedError>,
    pub fields: BTreeMap<String, String>,
    pub kind: Option<ErrorType>,
}

impl ErrChain {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Self::default()
        }
    }

    pub fn with_cause<E>(mut self, cause: E) -> Self
    where
        E: Error + Send + Sync + 'static,
    {
        self.cause = Some(Arc::new(cause));
        self
    }

    pub fn with_shared_cause(mut self, cause: SharedError) -> Self {
        self.cause = Some(cause);
        self
    }

    pub fn with_type(mut self, kind: ErrorType) -> Self {
        self.kind = Some(kind);
        self
    }

    /// Return this chain with `key` set to `value`.
    pub fn set_field(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    pub fn field(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }
}

impl fmt::Display for ErrChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)?;
        let Some(cause) = &self.cause else {
            return Ok(());
        };
        write!(f, " because {{{}}}", cause)?;
        if !self.fields.is_empty() {
            // map[k1:v1 k2:v2], keys sorted.
            f.write_str(" with Fields {map[")?;
            for (i, (key, value)) in self.fields.iter().enumerate() {
                if i > 0 {
                    f.write_str(" ")?;
                }
                write!(f, "{}:{}", key, value)?;
            }
            f.write_str("]}")?;
        }
        Ok(())
    }
}

impl Error for ErrChain {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.cause.as_deref().map(|cause| cause as &(dyn Error + 'static))
    }
}

/// The classification of `err`, if it is an [`ErrChain`] that has one.
pub fn type_of(err: &(dyn Error + 'static)) -> Option<ErrorType> {
    err.downcast_ref::<ErrChain>().and_then(|chain| chain.kind)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::Leaf;

    #[test]
    fn test_fields_rendered_only_with_cause() {
        let with_cause = ErrChain::new("insert resort")
            .with_cause(Leaf::new("deadline exceeded"))
            .set_field("k", "v");
        assert_eq!(
            with_cause.to_string(),
            "insert resort because {deadline exceeded} with Fields {map[k:v]}"
        );

        let without_cause = ErrChain::new("insert resort").set_field("k", "v");
        assert_eq!(without_cause.to_string(), "insert resort");
    }

    #[test]
    fn test_fields_sorted() {
        let err = ErrChain::new("m")
            .with_cause(Leaf::new("c"))
            .set_field("b", "2")
            .set_field("a", "1");
        assert!(err.to_string().ends_with("with Fields {map[a:1 b:2]}"));
    }

    #[test]
    fn test_set_field_does_not_alias_copies() {
        let base = ErrChain::new("m").set_field("shared", "1");
        let copy = base.clone().set_field("only_copy", "2");
        assert_eq!(base.field("only_copy"), None);
        assert_eq!(copy.field("shared"), Some("1"));
        assert_eq!(copy.field("only_copy"), Some("2"));
    }

    #[test]
    fn test_type_of_only_for_chain() {
        let chain = ErrChain::new("login").with_type(ErrorType::NoValidUserFound);
        assert_eq!(type_of(&chain), Some(ErrorType::NoValidUserFound));
        assert_eq!(type_of(&ErrChain::new("untyped")), None);
        assert_eq!(type_of(&Leaf::new("login")), None);
        // A classification nested in a cause is not visible from the outside.
        let outer = ErrChain::new("outer").with_cause(chain);
        assert_eq!(type_of(&outer), None);
    }

    #[test]
    fn test_source_is_cause() {
        let err = ErrChain::new("m").with_cause(Leaf::new("c"));
        assert_eq!(err.source().map(|e| e.to_string()), Some("c".to_string()));
        assert!(ErrChain::new("m").source().is_none());
    }
}
