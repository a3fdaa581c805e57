//! Client side of the Properties interface

use std::sync::Arc;
use parking_lot::RwLock;
use tracing::warn;
use dbus_core::{BusType, CallMessage, SignalMessage, Variant};
use crate::error::Result;
use crate::properties::{PropertyDict, PROPERTIES_INTERFACE};
use crate::proxy::ObjectProxy;

/// Decoded `PropertiesChanged` signal
#[derive(Debug, Clone, PartialEq)]
pub struct PropertiesChanged {
    pub interface: String,
    pub changed: PropertyDict,
    pub invalidated: Vec<String>,
}

type ChangedListener = Arc<dyn Fn(&PropertiesChanged) + Send + Sync>;

/// Typed access to a remote object's properties
pub struct PropertiesProxy {
    object: Arc<ObjectProxy>,
    listeners: Arc<RwLock<Vec<ChangedListener>>>,
}

impl PropertiesProxy {
    /// Create a new properties view, listening for PropertiesChanged
    pub fn new(object: Arc<ObjectProxy>) -> Self {
        let listeners: Arc<RwLock<Vec<ChangedListener>>> = Arc::new(RwLock::new(Vec::new()));
        let sink = listeners.clone();
        object.connect_signal(PROPERTIES_INTERFACE, "PropertiesChanged", move |signal| {
            Self::properties_changed_stub(&sink, signal)
        });
        Self { object, listeners }
    }

    /// The wrapped object proxy
    pub fn object(&self) -> &Arc<ObjectProxy> {
        &self.object
    }

    fn method_call(&self, member: &str, interface: &str) -> CallMessage {
        self.object
            .method_call(PROPERTIES_INTERFACE, member)
            .with_arg(interface.to_string())
    }

    /// Read one property of the remote object
    pub async fn get(&self, interface: &str, property: &str) -> Result<Variant> {
        let call = self.method_call("Get", interface).with_arg(property.to_string());
        let reply = self.object.invoke_method(call).await?;
        Ok(reply.reader().read()?)
    }

    /// `get` followed by a typed extraction
    pub async fn get_as<T: BusType>(&self, interface: &str, property: &str) -> Result<T> {
        let value = self.get(interface, property).await?;
        Ok(value.get()?)
    }

    /// Write one property of the remote object
    pub async fn set(&self, interface: &str, property: &str, value: Variant) -> Result<()> {
        let call = self
            .method_call("Set", interface)
            .with_arg(property.to_string())
            .with_arg(value);
        self.object.invoke_method(call).await?;
        Ok(())
    }

    /// Read every readable property of `interface`
    pub async fn get_all(&self, interface: &str) -> Result<PropertyDict> {
        let reply = self
            .object
            .invoke_method(self.method_call("GetAll", interface))
            .await?;
        Ok(reply.reader().read()?)
    }

    /// Call `listener` for every `PropertiesChanged` from the object
    pub fn on_properties_changed<F>(&self, listener: F)
    where
        F: Fn(&PropertiesChanged) + Send + Sync + 'static,
    {
        self.listeners.write().push(Arc::new(listener));
    }

    fn properties_changed_stub(listeners: &RwLock<Vec<ChangedListener>>, signal: &SignalMessage) {
        let event = match decode_properties_changed(signal) {
            Ok(event) => event,
            Err(e) => {
                warn!("Malformed PropertiesChanged from {:?}: {}", signal.sender(), e);
                return;
            }
        };
        let listeners = listeners.read().clone();
        for listener in listeners {
            listener(&event);
        }
    }
}

fn decode_properties_changed(signal: &SignalMessage) -> dbus_core::Result<PropertiesChanged> {
    let mut reader = signal.reader();
    Ok(PropertiesChanged {
        interface: reader.read()?,
        changed: reader.read()?,
        invalidated: reader.read()?,
    })
}
