//! Connection abstraction
//!
//! The object layer only ever talks to a `dyn Connection`: it sends messages,
//! awaits correlated replies, registers per-path handlers and subscribes to
//! signals. [`BusConnection`](crate::BusConnection) is the in-memory
//! implementation.

use std::sync::Weak;
use std::time::Duration;
use async_trait::async_trait;
use crate::error::Result;
use crate::message::{CallMessage, Message};
use crate::types::ObjectPath;

/// Receiver of routed messages
///
/// Returns `true` when the message was consumed.
pub trait MessageHandler: Send + Sync {
    fn handle_message(&self, msg: &Message) -> bool;
}

/// Handle for a registered signal filter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FilterId(pub u64);

/// A bus connection as seen by exported objects and proxies
#[async_trait]
pub trait Connection: Send + Sync {
    /// Unique name assigned by the bus, e.g. `:1.4`
    fn unique_name(&self) -> &str;

    /// Send a message, returning the serial it was sent with
    fn send(&self, msg: Message) -> Result<u32>;

    /// Send a call and wait for its correlated return or error
    ///
    /// `None` uses the connection's default timeout.
    async fn send_with_reply(&self, call: CallMessage, timeout: Option<Duration>) -> Result<Message>;

    /// Route method calls addressed to `path` to `handler`
    fn register_object(&self, path: &ObjectPath, handler: Weak<dyn MessageHandler>) -> Result<()>;

    /// Returns `false` when nothing was registered at `path`
    fn unregister_object(&self, path: &ObjectPath) -> bool;

    /// Deliver inbound signals to `handler`; `path` restricts to one object
    fn add_signal_filter(&self, path: Option<ObjectPath>, handler: Weak<dyn MessageHandler>) -> FilterId;

    fn remove_signal_filter(&self, id: FilterId) -> bool;

    /// Resolve a well-known name to its owner's unique name
    fn name_owner(&self, name: &str) -> Option<String>;
}

/// Connection configuration
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Timeout applied to `send_with_reply` when the caller gives none
    pub default_timeout: Option<Duration>,
    /// Upper bound on calls awaiting a reply
    pub max_pending_replies: usize,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            default_timeout: Some(Duration::from_secs(25)),
            max_pending_replies: 4096,
        }
    }
}

impl ConnectionConfig {
    pub fn default_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.default_timeout = timeout;
        self
    }

    pub fn max_pending_replies(mut self, max: usize) -> Self {
        self.max_pending_replies = max;
        self
    }
}
