//! Registry of the objects exported on one connection

use std::collections::BTreeMap;
use std::sync::Arc;
use parking_lot::RwLock;
use tracing::info;
use dbus_core::{Connection, ObjectPath};
use crate::adaptor::{ObjectAdaptor, ObjectAdaptorBuilder};
use crate::error::{ObjectError, Result};
use crate::object::ExportedObject;

/// Owns the exported adaptors of a connection, keyed by path
pub struct ObjectServer {
    conn: Arc<dyn Connection>,
    objects: RwLock<BTreeMap<ObjectPath, Arc<ObjectAdaptor>>>,
}

impl ObjectServer {
    /// Create a new, empty object server on `conn`
    pub fn new(conn: Arc<dyn Connection>) -> Self {
        Self {
            conn,
            objects: RwLock::new(BTreeMap::new()),
        }
    }

    pub fn conn(&self) -> &Arc<dyn Connection> {
        &self.conn
    }

    /// Start describing an object at `path` on this server's connection
    pub fn adaptor(&self, path: ObjectPath) -> ObjectAdaptorBuilder {
        ObjectAdaptor::builder(self.conn.clone(), path)
    }

    /// Build `builder` and keep the adaptor alive until it is unexported
    pub fn export(&self, builder: ObjectAdaptorBuilder) -> Result<Arc<ObjectAdaptor>> {
        let mut objects = self.objects.write();
        if objects.contains_key(builder.path()) {
            return Err(ObjectError::PathInUse(builder.path().clone()));
        }
        let adaptor = builder.build()?;
        objects.insert(adaptor.path().clone(), adaptor.clone());
        Ok(adaptor)
    }

    /// Detach the object at `path` from the connection
    pub fn unexport(&self, path: &ObjectPath) -> Option<Arc<ObjectAdaptor>> {
        let adaptor = self.objects.write().remove(path)?;
        adaptor.unregister_obj();
        info!("Unexported {}", path);
        Some(adaptor)
    }

    /// Adaptor exported at exactly `path`
    pub fn from_path(&self, path: &ObjectPath) -> Option<Arc<ObjectAdaptor>> {
        self.objects.read().get(path).cloned()
    }

    /// Objects at `prefix` or below it
    pub fn from_path_prefix(&self, prefix: &str) -> Vec<Arc<ObjectAdaptor>> {
        let prefix = prefix.trim_end_matches('/');
        self.objects
            .read()
            .iter()
            .filter(|(path, _)| {
                let path = path.as_str();
                prefix.is_empty()
                    || path == prefix
                    || (path.starts_with(prefix) && path[prefix.len()..].starts_with('/'))
            })
            .map(|(_, adaptor)| adaptor.clone())
            .collect()
    }

    /// Unexport everything
    pub fn shutdown(&self) {
        let objects = std::mem::take(&mut *self.objects.write());
        for adaptor in objects.values() {
            adaptor.unregister_obj();
        }
        info!("Object server shut down, {} objects unexported", objects.len());
    }

    pub fn len(&self) -> usize {
        self.objects.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.read().is_empty()
    }
}
