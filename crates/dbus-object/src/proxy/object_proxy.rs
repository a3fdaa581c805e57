//! Proxies for remote objects
//!
//! An [`ObjectProxy`] addresses one object path behind a service name. Calls
//! go out through [`ObjectProxy::invoke_method`] and wait for the correlated
//! reply. Signals from the object arrive through a signal filter and are
//! handed to the stubs of the matching [`InterfaceProxy`]; they never touch
//! the method dispatcher.

use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::Duration;
use parking_lot::{Mutex, RwLock};
use tracing::{debug, trace};
use dbus_core::{
    CallMessage, Connection, ErrorMessage, FilterId, Message, MessageHandler, MessageType,
    ObjectPath, ReturnMessage, SignalMessage,
};
use crate::error::{ObjectError, Result};
use crate::object::{ExportedObject, ObjectBase};
use crate::proxy::InterfaceProxy;

/// Proxy configuration
#[derive(Debug, Clone, Default)]
pub struct ProxyConfig {
    /// Per-call timeout; `None` uses the connection default
    pub timeout: Option<Duration>,
}

impl ProxyConfig {
    /// Set the reply timeout for calls through the proxy
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Local stand-in for a remote object
pub struct ObjectProxy {
    base: ObjectBase,
    interfaces: RwLock<HashMap<String, Arc<InterfaceProxy>>>,
    config: ProxyConfig,
    filter: Mutex<Option<FilterId>>,
}

impl ObjectProxy {
    /// Create a new proxy with the default configuration
    pub fn new(conn: Arc<dyn Connection>, path: ObjectPath, service: Option<String>) -> Result<Arc<Self>> {
        Self::with_config(conn, path, service, ProxyConfig::default())
    }

    /// Create a new proxy and start listening for its signals
    pub fn with_config(
        conn: Arc<dyn Connection>,
        path: ObjectPath,
        service: Option<String>,
        config: ProxyConfig,
    ) -> Result<Arc<Self>> {
        let proxy = Arc::new(Self {
            base: ObjectBase::new(conn, path, service),
            interfaces: RwLock::new(HashMap::new()),
            config,
            filter: Mutex::new(None),
        });
        proxy.register_obj()?;
        Ok(proxy)
    }

    pub fn config(&self) -> &ProxyConfig {
        &self.config
    }

    /// Interface proxy for `name`, created on first use
    pub fn interface(self: &Arc<Self>, name: &str) -> Arc<InterfaceProxy> {
        if let Some(existing) = self.interfaces.read().get(name) {
            return existing.clone();
        }
        self.interfaces
            .write()
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(InterfaceProxy::new(name, Arc::downgrade(self))))
            .clone()
    }

    /// Route signal `interface.member` from the remote object to `stub`
    ///
    /// Returns `true` when an earlier stub for the member was replaced.
    pub fn connect_signal<F>(self: &Arc<Self>, interface: &str, member: &str, stub: F) -> bool
    where
        F: Fn(&SignalMessage) + Send + Sync + 'static,
    {
        self.interface(interface).connect_signal(member, stub)
    }

    /// A call addressed to this object
    pub fn method_call(&self, interface: &str, member: &str) -> CallMessage {
        self.address(CallMessage::method(self.base.path().clone(), interface, member))
    }

    fn address(&self, mut call: CallMessage) -> CallMessage {
        if call.path().is_none() {
            call.set_path(self.base.path().clone());
        }
        match self.base.service() {
            Some(service) if call.destination().is_none() => call.with_destination(service),
            _ => call,
        }
    }

    /// Send `call` and wait for its reply
    ///
    /// An error reply surfaces as [`ObjectError::Method`] carrying the remote
    /// error name and message.
    pub async fn invoke_method(&self, call: CallMessage) -> Result<ReturnMessage> {
        let call = self.address(call);
        debug!(
            "Invoking {}.{} on {} at {:?}",
            call.interface().unwrap_or("*"),
            call.member().unwrap_or_default(),
            self.base.path(),
            call.destination()
        );
        let reply = self
            .base
            .conn()
            .send_with_reply(call, self.config.timeout)
            .await?;

        match reply.kind() {
            MessageType::MethodReturn => Ok(ReturnMessage::try_from(reply)?),
            MessageType::Error => {
                let err = ErrorMessage::try_from(reply)?.to_error();
                debug!("Remote error from {}: {}", self.base.path(), err);
                Err(ObjectError::Method(err))
            }
            other => Err(ObjectError::UnexpectedReply(format!("{:?}", other))),
        }
    }

    /// Send `call` without waiting for, or asking for, a reply
    pub fn invoke_method_noreply(&self, call: CallMessage) -> Result<()> {
        let call = self.address(call).with_no_reply();
        self.base.conn().send(call.into())?;
        Ok(())
    }

    fn accepts_sender(&self, sender: Option<&str>) -> bool {
        match self.base.service() {
            None => true,
            Some(service) => {
                sender == Some(service)
                    || self.base.conn().name_owner(service).as_deref() == sender
            }
        }
    }
}

impl MessageHandler for ObjectProxy {
    fn handle_message(&self, msg: &Message) -> bool {
        if msg.kind() != MessageType::Signal || msg.path() != Some(self.base.path()) {
            return false;
        }
        if !self.accepts_sender(msg.sender()) {
            trace!("Ignoring signal from {:?} on {}", msg.sender(), self.base.path());
            return false;
        }
        let interface = msg
            .interface()
            .and_then(|name| self.interfaces.read().get(name).cloned());
        let Some(interface) = interface else {
            return false;
        };
        match SignalMessage::try_from(msg.clone()) {
            Ok(signal) => interface.dispatch_signal(&signal),
            Err(_) => false,
        }
    }
}

impl ExportedObject for ObjectProxy {
    fn base(&self) -> &ObjectBase {
        &self.base
    }

    fn register_obj(self: &Arc<Self>) -> Result<()> {
        let weak = Arc::downgrade(self);
        let handler: Weak<dyn MessageHandler> = weak;
        let id = self
            .base
            .conn()
            .add_signal_filter(Some(self.base.path().clone()), handler);
        *self.filter.lock() = Some(id);
        Ok(())
    }

    fn unregister_obj(&self) {
        if let Some(id) = self.filter.lock().take() {
            self.base.conn().remove_signal_filter(id);
        }
    }
}

impl Drop for ObjectProxy {
    fn drop(&mut self) {
        self.unregister_obj();
    }
}
