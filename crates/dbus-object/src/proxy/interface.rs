//! Per-interface view of a remote object

use std::collections::HashMap;
use std::sync::{Arc, Weak};
use parking_lot::RwLock;
use tracing::{trace, warn};
use dbus_core::{CallMessage, ReturnMessage, SignalMessage, Value};
use crate::error::{ObjectError, Result};
use crate::proxy::ObjectProxy;

/// Signal stub function type
pub type SignalStub = Arc<dyn Fn(&SignalMessage) + Send + Sync>;

/// One interface of an [`ObjectProxy`]
pub struct InterfaceProxy {
    name: String,
    object: Weak<ObjectProxy>,
    signals: RwLock<HashMap<String, SignalStub>>,
}

impl InterfaceProxy {
    pub(crate) fn new(name: &str, object: Weak<ObjectProxy>) -> Self {
        Self {
            name: name.to_string(),
            object,
            signals: RwLock::new(HashMap::new()),
        }
    }

    /// Interface name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Route signal `member` of this interface to `stub`
    ///
    /// A member has one stub. Returns `true` when an earlier stub was replaced.
    pub fn connect_signal<F>(&self, member: &str, stub: F) -> bool
    where
        F: Fn(&SignalMessage) + Send + Sync + 'static,
    {
        let replaced = self
            .signals
            .write()
            .insert(member.to_string(), Arc::new(stub))
            .is_some();
        if replaced {
            warn!("Replaced signal stub for {}.{}", self.name, member);
        }
        replaced
    }

    /// Remove the stub for `member`; `false` when none was connected
    pub fn disconnect_signal(&self, member: &str) -> bool {
        self.signals.write().remove(member).is_some()
    }

    /// Run the stub for `signal`; `false` when none is connected
    pub fn dispatch_signal(&self, signal: &SignalMessage) -> bool {
        let stub = signal
            .member()
            .and_then(|member| self.signals.read().get(member).cloned());
        match stub {
            Some(stub) => {
                trace!("Signal {}.{:?}", self.name, signal.member());
                stub(signal);
                true
            }
            None => false,
        }
    }

    /// A call to `member` on this interface
    pub fn method_call(&self, member: &str) -> CallMessage {
        CallMessage::new(member).with_interface(self.name.clone())
    }

    /// Invoke `call`, filling in this interface when it has none
    pub async fn call_method(&self, mut call: CallMessage) -> Result<ReturnMessage> {
        if call.interface().is_none() {
            call.set_interface(self.name.clone());
        }
        let object = self
            .object
            .upgrade()
            .ok_or(ObjectError::Bus(dbus_core::Error::Disconnected))?;
        object.invoke_method(call).await
    }

    /// Invoke `member` with `args`
    pub async fn call(&self, member: &str, args: Vec<Value>) -> Result<ReturnMessage> {
        let mut call = self.method_call(member);
        {
            let mut writer = call.writer();
            for arg in args {
                writer.append_value(arg);
            }
        }
        self.call_method(call).await
    }
}
