//! Object layer errors

use thiserror::Error;
use dbus_core::{MethodError, ObjectPath};
use crate::adaptor::ContinuationTag;

/// Errors raised by exported objects and proxies
#[derive(Debug, Error)]
pub enum ObjectError {
    #[error("bus error: {0}")]
    Bus(#[from] dbus_core::Error),

    /// The peer answered with an error reply
    #[error("remote error: {0}")]
    Method(#[from] MethodError),

    #[error("object path already exported: {0}")]
    PathInUse(ObjectPath),

    #[error("continuation {0} is already pending")]
    DuplicateTag(ContinuationTag),

    #[error("no pending continuation for tag {0}")]
    ContinuationNotFound(ContinuationTag),

    #[error("interface registered twice: {0}")]
    DuplicateInterface(String),

    #[error("unexpected reply: {0}")]
    UnexpectedReply(String),
}

pub type Result<T> = std::result::Result<T, ObjectError>;

impl From<ObjectError> for MethodError {
    fn from(err: ObjectError) -> Self {
        match err {
            ObjectError::Bus(e) => e.into(),
            ObjectError::Method(e) => e,
            other => MethodError::failed(other.to_string()),
        }
    }
}
