//! Object layer of the bus binding
//!
//! This crate sits between application code and a [`dbus_core::Connection`].
//! It exports local objects that answer method calls, wraps remote objects
//! behind proxies, and layers `org.freedesktop.DBus.Properties` on both.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 Object Layer (this crate)                   │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Adaptors            │  Proxies            │  Properties    │
//! │  - Interface registry│  - Method invoke    │  - Get/Set/    │
//! │  - Call dispatch     │  - Reply awaiting   │    GetAll      │
//! │  - Continuations     │  - Signal stubs     │  - Changed     │
//! ├─────────────────────────────────────────────────────────────┤
//! │  ObjectBase / ExportedObject (path, service, registration)  │
//! ├─────────────────────────────────────────────────────────────┤
//! │               Connection (dbus-core crate)                  │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Key Concepts
//!
//! - **Object**: an endpoint identified by connection, path and optional service
//! - **Interface**: a named group of methods, signals and properties
//! - **Continuation**: a parked call whose reply is produced later by tag
//! - **Properties overlay**: the standard interface every adaptor carries
//!
//! # Modules
//!
//! - [`object`]: Shared identity and registration
//! - [`adaptor`]: Local objects, dispatch and continuations
//! - [`proxy`]: Remote objects and signal routing
//! - [`properties`]: The Properties interface on both sides
//! - [`server`]: Per-connection registry of exported objects
//! - [`introspection`]: Interface descriptions

pub mod adaptor;
pub mod error;
pub mod introspection;
pub mod object;
pub mod properties;
pub mod proxy;
pub mod server;


pub use adaptor::{
    AdaptorConfig, CallContext, Continuation, ContinuationTable, ContinuationTag,
    InterfaceAdaptor, InterfaceBuilder, InterfaceRegistry, MethodHandler, MethodResult,
    ObjectAdaptor, ObjectAdaptorBuilder, Reply,
};
pub use error::{ObjectError, Result};
pub use introspection::{
    IntrospectedArgument, IntrospectedInterface, IntrospectedMethod, IntrospectedProperty,
};
pub use object::{ExportedObject, ObjectBase};
pub use properties::{
    PropertiesAdaptor, PropertiesChanged, PropertiesProxy, PropertyAccess, PropertyDict,
    PropertyObserver, PropertyProvider, PropertyTable, PROPERTIES_INTERFACE,
};
pub use proxy::{InterfaceProxy, ObjectProxy, ProxyConfig, SignalStub};
pub use server::ObjectServer;
