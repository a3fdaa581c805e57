//! Exported object identity
//!
//! Every object on the bus, local adaptor or remote proxy, is identified by
//! the connection it lives on, its object path and optionally the service
//! name it is reached through. The identity never changes after
//! construction.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use tracing::debug;
use dbus_core::{Connection, MessageHandler, ObjectPath};
use crate::error::{ObjectError, Result};

/// Connection, path and service of an object
pub struct ObjectBase {
    conn: Arc<dyn Connection>,
    path: ObjectPath,
    service: Option<String>,
    registered: AtomicBool,
}

impl ObjectBase {
    /// Create a new, unregistered object identity
    pub fn new(conn: Arc<dyn Connection>, path: ObjectPath, service: Option<String>) -> Self {
        Self {
            conn,
            path,
            service,
            registered: AtomicBool::new(false),
        }
    }

    pub fn conn(&self) -> &Arc<dyn Connection> {
        &self.conn
    }

    pub fn path(&self) -> &ObjectPath {
        &self.path
    }

    pub fn service(&self) -> Option<&str> {
        self.service.as_deref()
    }

    /// Whether the object currently holds its path
    pub fn is_registered(&self) -> bool {
        self.registered.load(Ordering::SeqCst)
    }

    /// Register `handler` for calls addressed to this path
    pub(crate) fn register_handler(&self, handler: Weak<dyn MessageHandler>) -> Result<()> {
        self.conn
            .register_object(&self.path, handler)
            .map_err(|e| match e {
                dbus_core::Error::PathInUse(_) => ObjectError::PathInUse(self.path.clone()),
                other => ObjectError::Bus(other),
            })?;
        self.registered.store(true, Ordering::SeqCst);
        Ok(())
    }

    /// Undo [`register_handler`](Self::register_handler); runs at most once
    pub(crate) fn unregister_handler(&self) -> bool {
        if !self.registered.swap(false, Ordering::SeqCst) {
            return false;
        }
        debug!("Unregistering object {}", self.path);
        self.conn.unregister_object(&self.path)
    }
}

impl std::fmt::Debug for ObjectBase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectBase")
            .field("conn", &self.conn.unique_name())
            .field("path", &self.path)
            .field("service", &self.service)
            .finish()
    }
}

/// An object attached to a connection
///
/// Implemented by [`ObjectAdaptor`](crate::ObjectAdaptor) for local objects
/// and [`ObjectProxy`](crate::ObjectProxy) for remote ones. Both hook into
/// the connection in `register_obj` and detach in `unregister_obj`.
pub trait ExportedObject: MessageHandler {
    fn base(&self) -> &ObjectBase;

    fn path(&self) -> &ObjectPath {
        self.base().path()
    }

    fn service(&self) -> Option<&str> {
        self.base().service()
    }

    fn conn(&self) -> &Arc<dyn Connection> {
        self.base().conn()
    }

    /// Attach to the connection
    fn register_obj(self: &Arc<Self>) -> Result<()>
    where
        Self: Sized;

    /// Detach from the connection; further calls are no-ops
    fn unregister_obj(&self);
}
