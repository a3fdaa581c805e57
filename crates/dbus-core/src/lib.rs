//! Message substrate for the object layer
//!
//! This crate provides the pieces the object layer consumes: a typed value
//! model, the four bus message kinds with body cursors, the [`Connection`]
//! trait and an in-memory [`Bus`] that routes messages between connections.
//!
//! # Features
//!
//! - Self-describing values (`Value`, `Variant`) with type signatures
//! - Method call, return, error and signal messages with correlation fields
//! - Async `send_with_reply` with per-call timeouts
//! - Per-path object registration and signal filters
//! - In-process routing with unique names and a well-known name table
//!
//! # Example
//!
//! ```no_run
//! use dbus_core::{Bus, CallMessage, Connection, ObjectPath};
//!
//! #[tokio::main]
//! async fn main() {
//!     let bus = Bus::new();
//!     let conn = bus.connect();
//!     conn.spawn().unwrap();
//!
//!     let call = CallMessage::method(
//!         ObjectPath::new("/org/example/Box").unwrap(),
//!         "org.example.Box",
//!         "Ping",
//!     )
//!     .with_destination("org.example.BoxService");
//!
//!     let reply = conn.send_with_reply(call, None).await.unwrap();
//!     println!("{:?}", reply.error_name());
//! }
//! ```

pub mod bus;
pub mod connection;
pub mod error;
pub mod message;
pub mod names;
pub mod types;
pub mod value;

pub use bus::{Bus, BusConnection, ConnectionStats, ConnectionStatsSnapshot};
pub use connection::{Connection, ConnectionConfig, FilterId, MessageHandler};
pub use error::{Error, MethodError, Result};
pub use message::{
    CallMessage, ErrorMessage, Message, MessageReader, MessageType, MessageWriter,
    ReturnMessage, SignalMessage,
};
pub use types::{ObjectPath, Signature};
pub use value::{Array, BusType, Dict, Value, Variant};
