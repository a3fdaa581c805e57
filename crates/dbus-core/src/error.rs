//! Error types for the message substrate

use thiserror::Error;
use crate::names;
use crate::value::Value;

/// Substrate errors
#[derive(Debug, Error)]
pub enum Error {
    #[error("type mismatch: expected {expected}, got {got}")]
    TypeMismatch { expected: String, got: String },

    #[error("unexpected end of message body")]
    UnexpectedEnd,

    #[error("invalid object path: {0}")]
    InvalidPath(String),

    #[error("invalid signature: {0}")]
    InvalidSignature(String),

    #[error("invalid message: {0}")]
    InvalidMessage(String),

    #[error("object path already registered: {0}")]
    PathInUse(String),

    #[error("dispatch loop already running")]
    AlreadyRunning,

    #[error("too many pending replies: limit {0}")]
    TooManyPending(usize),

    #[error("connection closed")]
    Disconnected,

    #[error("timeout")]
    Timeout,

    #[error("{0}")]
    Method(#[from] MethodError),
}

impl Error {
    pub(crate) fn type_mismatch(expected: &str, got: &Value) -> Self {
        Error::TypeMismatch {
            expected: expected.to_string(),
            got: got.signature().to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// A named bus error
///
/// Carried by error replies. Handlers return it to fail a call and proxies
/// surface it when the peer answers with an error.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("{name}: {message}")]
pub struct MethodError {
    name: String,
    message: String,
}

impl MethodError {
    /// Create a new error with a bus error name and message
    pub fn new(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            message: message.into(),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self::new(names::FAILED, message)
    }

    pub fn unknown_method(message: impl Into<String>) -> Self {
        Self::new(names::UNKNOWN_METHOD, message)
    }

    pub fn unknown_interface(message: impl Into<String>) -> Self {
        Self::new(names::UNKNOWN_INTERFACE, message)
    }

    pub fn unknown_object(message: impl Into<String>) -> Self {
        Self::new(names::UNKNOWN_OBJECT, message)
    }

    pub fn unknown_property(message: impl Into<String>) -> Self {
        Self::new(names::UNKNOWN_PROPERTY, message)
    }

    pub fn invalid_args(message: impl Into<String>) -> Self {
        Self::new(names::INVALID_ARGS, message)
    }

    pub fn invalid_signature(message: impl Into<String>) -> Self {
        Self::new(names::INVALID_SIGNATURE, message)
    }

    pub fn access_denied(message: impl Into<String>) -> Self {
        Self::new(names::ACCESS_DENIED, message)
    }

    pub fn property_read_only(message: impl Into<String>) -> Self {
        Self::new(names::PROPERTY_READ_ONLY, message)
    }

    /// Error name, e.g. `org.freedesktop.DBus.Error.Failed`
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Human readable message
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<Error> for MethodError {
    fn from(err: Error) -> Self {
        match err {
            Error::Method(e) => e,
            Error::TypeMismatch { .. } | Error::UnexpectedEnd => {
                MethodError::invalid_args(err.to_string())
            }
            Error::InvalidSignature(_) => MethodError::invalid_signature(err.to_string()),
            Error::Timeout => MethodError::new(names::TIMEOUT, err.to_string()),
            Error::Disconnected => MethodError::new(names::DISCONNECTED, err.to_string()),
            other => MethodError::failed(other.to_string()),
        }
    }
}
