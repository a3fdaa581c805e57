//! Local objects and method dispatch
//!
//! An [`ObjectAdaptor`] is registered on its connection for one object path.
//! Every call routed to that path goes through [`ObjectAdaptor::handle_message`]:
//!
//! 1. the registry resolves `interface.member` (or just `member`) to a handler
//! 2. the handler runs synchronously on the dispatch loop
//! 3. its outcome is turned into exactly one reply, or none when the call was
//!    parked as a continuation or the caller asked for no reply

use std::sync::{Arc, Weak};
use tracing::{debug, error, info, trace, warn};
use dbus_core::{
    CallMessage, Connection, ErrorMessage, Message, MessageHandler, MessageType, MethodError,
    ObjectPath, SignalMessage,
};
use crate::adaptor::continuation::{Continuation, ContinuationTable, ContinuationTag};
use crate::adaptor::interface::{CallContext, InterfaceAdaptor, InterfaceBuilder, MethodResult, Reply};
use crate::adaptor::registry::InterfaceRegistry;
use crate::error::{ObjectError, Result};
use crate::introspection::IntrospectedInterface;
use crate::object::{ExportedObject, ObjectBase};
use crate::properties::{PropertiesAdaptor, PropertyDict, PropertyObserver, PROPERTIES_INTERFACE};

/// Adaptor configuration
#[derive(Debug, Clone)]
pub struct AdaptorConfig {
    /// Emit `PropertiesChanged` after a successful remote `Set`
    pub emit_properties_changed: bool,
    /// Serve `org.freedesktop.DBus.Properties` on the object
    pub expose_properties: bool,
}

impl Default for AdaptorConfig {
    fn default() -> Self {
        Self {
            emit_properties_changed: true,
            expose_properties: true,
        }
    }
}

impl AdaptorConfig {
    /// Emit PropertiesChanged after successful writes
    pub fn emit_properties_changed(mut self, emit: bool) -> Self {
        self.emit_properties_changed = emit;
        self
    }

    /// Add the Properties interface to the object
    pub fn expose_properties(mut self, expose: bool) -> Self {
        self.expose_properties = expose;
        self
    }
}

/// Builder for an [`ObjectAdaptor`]
pub struct ObjectAdaptorBuilder {
    conn: Arc<dyn Connection>,
    path: ObjectPath,
    service: Option<String>,
    interfaces: Vec<InterfaceBuilder>,
    observer: Option<Arc<dyn PropertyObserver>>,
    config: AdaptorConfig,
}

impl ObjectAdaptorBuilder {
    /// Path the object will be registered at
    pub fn path(&self) -> &ObjectPath {
        &self.path
    }

    /// Well-known name the object is published under
    pub fn service(mut self, name: impl Into<String>) -> Self {
        self.service = Some(name.into());
        self
    }

    /// Add an interface to export
    pub fn interface(mut self, interface: InterfaceBuilder) -> Self {
        self.interfaces.push(interface);
        self
    }

    /// Add a method, creating the interface on first use
    pub fn register_method<F>(mut self, interface: &str, member: &str, handler: F) -> Self
    where
        F: Fn(&CallContext<'_>) -> MethodResult + Send + Sync + 'static,
    {
        let index = match self.interfaces.iter().position(|b| b.name() == interface) {
            Some(index) => index,
            None => {
                self.interfaces.push(InterfaceBuilder::new(interface));
                self.interfaces.len() - 1
            }
        };
        self.interfaces[index].add_method(member, Vec::new(), Arc::new(handler));
        self
    }

    /// Set the property observer
    pub fn observer(mut self, observer: Arc<dyn PropertyObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Set the adaptor configuration
    pub fn config(mut self, config: AdaptorConfig) -> Self {
        self.config = config;
        self
    }

    /// Build the adaptor and register it on the connection
    pub fn build(self) -> Result<Arc<ObjectAdaptor>> {
        let mut registry = InterfaceRegistry::new();
        for interface in self.interfaces {
            registry.add(interface.build())?;
        }
        if self.config.expose_properties && registry.find(PROPERTIES_INTERFACE).is_none() {
            registry.add(PropertiesAdaptor::interface().build())?;
        }

        let adaptor = Arc::new(ObjectAdaptor {
            base: ObjectBase::new(self.conn, self.path, self.service),
            registry,
            continuations: Arc::new(ContinuationTable::new()),
            observer: self.observer,
            config: self.config,
        });
        adaptor.register_obj()?;
        info!(
            "Exported {} with interfaces {:?}",
            adaptor.base.path(),
            adaptor.registry.names()
        );
        Ok(adaptor)
    }
}

/// A local object exported on a connection
pub struct ObjectAdaptor {
    base: ObjectBase,
    registry: InterfaceRegistry,
    continuations: Arc<ContinuationTable>,
    observer: Option<Arc<dyn PropertyObserver>>,
    config: AdaptorConfig,
}

impl ObjectAdaptor {
    /// Create a new builder for an object at `path`
    pub fn builder(conn: Arc<dyn Connection>, path: ObjectPath) -> ObjectAdaptorBuilder {
        ObjectAdaptorBuilder {
            conn,
            path,
            service: None,
            interfaces: Vec::new(),
            observer: None,
            config: AdaptorConfig::default(),
        }
    }

    /// Look up an exported interface by name
    pub fn find_interface(&self, name: &str) -> Option<&Arc<InterfaceAdaptor>> {
        self.registry.find(name)
    }

    /// Interfaces in registration order
    pub fn interfaces(&self) -> &InterfaceRegistry {
        &self.registry
    }

    /// Observer notified of property reads and writes
    pub fn observer(&self) -> Option<&Arc<dyn PropertyObserver>> {
        self.observer.as_ref()
    }

    /// Adaptor configuration
    pub fn config(&self) -> &AdaptorConfig {
        &self.config
    }

    pub(crate) fn defer(&self, tag: ContinuationTag, call: &CallMessage) -> Result<Continuation> {
        self.continuations.defer(tag, self.base.conn().clone(), call)
    }

    /// Handle for a parked call, `None` for unknown or completed tags
    pub fn find_continuation(&self, tag: ContinuationTag) -> Option<Continuation> {
        self.continuations.find(tag)
    }

    /// Number of calls waiting on a continuation
    pub fn pending_continuations(&self) -> usize {
        self.continuations.len()
    }

    fn check_owner(&self, continuation: &Continuation) -> Result<()> {
        if continuation.belongs_to(&self.continuations) {
            Ok(())
        } else {
            error!(
                "Continuation {} does not belong to {}",
                continuation.tag(),
                self.base.path()
            );
            Err(ObjectError::ContinuationNotFound(continuation.tag()))
        }
    }

    /// Send the return of a parked call
    pub fn return_now(&self, continuation: Continuation) -> Result<()> {
        self.check_owner(&continuation)?;
        continuation.return_now()
    }

    /// Answer a parked call with an error
    pub fn return_error(&self, continuation: Continuation, err: MethodError) -> Result<()> {
        self.check_owner(&continuation)?;
        continuation.return_error(err)
    }

    /// Emit a signal from this object
    pub fn emit_signal(&self, mut signal: SignalMessage) -> Result<u32> {
        if let Some(interface) = signal.interface() {
            if self.registry.find(interface).is_none() {
                warn!("Emitting {} from {} which does not implement it", interface, self.base.path());
            }
        }
        signal.set_path(self.base.path().clone());
        trace!("Emitting {:?}.{:?} from {}", signal.interface(), signal.member(), self.base.path());
        Ok(self.base.conn().send(signal.into())?)
    }

    /// Emit `PropertiesChanged` for `interface`
    pub fn properties_changed(
        &self,
        interface: &str,
        changed: PropertyDict,
        invalidated: Vec<String>,
    ) -> Result<u32> {
        let signal = SignalMessage::new(self.base.path().clone(), PROPERTIES_INTERFACE, "PropertiesChanged")
            .with_arg(interface.to_string())
            .with_arg(changed)
            .with_arg(invalidated);
        self.emit_signal(signal)
    }

    /// Describe every exported interface, Properties last
    pub fn introspect(&self) -> Vec<IntrospectedInterface> {
        self.registry.iter().map(|i| i.introspect()).collect()
    }

    fn dispatch_call(&self, call: &CallMessage) {
        let mut deferred = 0;
        let outcome = match call.member() {
            Some(member) => match self.registry.resolve(call.interface(), member) {
                Ok((interface, handler)) => {
                    debug!("Calling {}.{} on {}", interface.name(), member, self.base.path());
                    let ctx = CallContext::new(self, interface, call);
                    let outcome = handler(&ctx);
                    deferred = ctx.deferred();
                    outcome
                }
                Err(err) => {
                    warn!("Cannot route call on {}: {}", self.base.path(), err);
                    Err(err)
                }
            },
            None => Err(MethodError::unknown_method("call without member")),
        };

        let reply: Option<Message> = match outcome {
            Ok(Reply::Later) if deferred > 0 => {
                trace!("Reply to serial {} deferred", call.serial());
                None
            }
            Ok(Reply::Later) => {
                warn!(
                    "Handler for {:?} deferred without a continuation",
                    call.member()
                );
                let err = MethodError::failed("method deferred its reply without a continuation");
                Some(ErrorMessage::new(call, &err).into())
            }
            Ok(Reply::Return(ret)) => self
                .answer_now(call, deferred)
                .then(|| ret.into()),
            Err(err) => {
                debug!("Call serial {} failed: {}", call.serial(), err);
                self.answer_now(call, deferred)
                    .then(|| ErrorMessage::new(call, &err).into())
            }
        };

        let Some(reply) = reply else {
            return;
        };
        if call.no_reply_expected() {
            trace!("Caller expects no reply to serial {}", call.serial());
            return;
        }
        if let Err(e) = self.base.conn().send(reply) {
            error!("Failed to send reply to {:?}: {}", call.sender(), e);
        }
    }

    /// Whether an immediate outcome may still answer `call`
    ///
    /// Continuations the handler parked are dropped. When one of them was
    /// already completed the call has its reply and the outcome is discarded.
    fn answer_now(&self, call: &CallMessage, deferred: usize) -> bool {
        if deferred == 0 {
            return true;
        }
        let dropped = self.continuations.cancel_call(call);
        if dropped > 0 {
            warn!(
                "Dropped {} continuation(s) for serial {} answered immediately",
                dropped,
                call.serial()
            );
        }
        if dropped < deferred {
            warn!(
                "Serial {} was already answered by a continuation, discarding handler outcome",
                call.serial()
            );
            return false;
        }
        true
    }
}

impl MessageHandler for ObjectAdaptor {
    fn handle_message(&self, msg: &Message) -> bool {
        if msg.kind() != MessageType::MethodCall || msg.path() != Some(self.base.path()) {
            return false;
        }
        match CallMessage::try_from(msg.clone()) {
            Ok(call) => {
                self.dispatch_call(&call);
                true
            }
            Err(_) => false,
        }
    }
}

impl ExportedObject for ObjectAdaptor {
    fn base(&self) -> &ObjectBase {
        &self.base
    }

    fn register_obj(self: &Arc<Self>) -> Result<()> {
        let weak = Arc::downgrade(self);
        let handler: Weak<dyn MessageHandler> = weak;
        self.base.register_handler(handler)
    }

    fn unregister_obj(&self) {
        if self.base.unregister_handler() {
            let pending = self.continuations.len();
            if pending > 0 {
                warn!("{} unexported with {} pending continuation(s)", self.base.path(), pending);
            }
        }
    }
}

impl Drop for ObjectAdaptor {
    fn drop(&mut self) {
        self.unregister_obj();
    }
}
