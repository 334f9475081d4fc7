//! Errors carried on the error channel of an observable.

use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Classifies why a stream terminated with an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamErrorKind {
    /// A mapping stage rejected an event.
    Mapping,
    /// The originating producer failed.
    Source,
    /// A bounded upstream channel dropped events before they could be delivered.
    Lagged,
}

impl StreamErrorKind {
    /// Returns the string representation of the kind.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Mapping => "MAPPING_ERROR",
            Self::Source => "SOURCE_ERROR",
            Self::Lagged => "LAGGED",
        }
    }
}

impl fmt::Display for StreamErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Error delivered through [`Observer::on_error`](crate::Observer::on_error).
///
/// Cheap to clone so that a subject can hand the same failure to every
/// attached observer.
#[derive(Error, Debug, Clone)]
#[error("[{kind}] {message}")]
pub struct StreamError {
    kind: StreamErrorKind,
    message: String,
    cause: Option<Arc<dyn std::error::Error + Send + Sync>>,
}

impl StreamError {
    /// Creates a new error with the given kind and message.
    pub fn new(kind: StreamErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            cause: None,
        }
    }

    /// Wraps the error returned by a fallible mapping function.
    pub fn mapping<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self {
            kind: StreamErrorKind::Mapping,
            message: error.to_string(),
            cause: Some(Arc::new(error)),
        }
    }

    /// Creates a producer-side failure.
    pub fn source(message: impl Into<String>) -> Self {
        Self::new(StreamErrorKind::Source, message)
    }

    /// Creates a lag error for `skipped` dropped events.
    pub fn lagged(skipped: u64) -> Self {
        Self::new(
            StreamErrorKind::Lagged,
            format!("lagged behind by {} events", skipped),
        )
    }

    /// Returns the error kind.
    pub fn kind(&self) -> StreamErrorKind {
        self.kind
    }

    /// Returns the human-readable message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns the underlying error, if this wraps one.
    pub fn cause(&self) -> Option<&(dyn std::error::Error + Send + Sync + 'static)> {
        self.cause.as_deref()
    }
}

impl PartialEq for StreamError {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind && self.message == other.message
    }
}
