//! Interface adaptors and method handlers

use std::cell::Cell;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::warn;
use dbus_core::{
    BusType, CallMessage, MessageReader, MethodError, ReturnMessage, Signature, Variant,
};
use crate::adaptor::continuation::{Continuation, ContinuationTag};
use crate::adaptor::object_adaptor::ObjectAdaptor;
use crate::introspection::{IntrospectedArgument, IntrospectedInterface, IntrospectedMethod};
use crate::properties::{PropertyAccess, PropertyDict, PropertyProvider, PropertyTable};

/// Outcome of a method handler
#[derive(Debug)]
pub enum Reply {
    /// Send this return now
    Return(ReturnMessage),
    /// The handler parked the call with [`CallContext::return_later`]
    Later,
}

pub type MethodResult = std::result::Result<Reply, MethodError>;

/// Method handler function type
pub type MethodHandler = Arc<dyn Fn(&CallContext<'_>) -> MethodResult + Send + Sync>;

/// What a handler sees of the call it is answering
pub struct CallContext<'a> {
    object: &'a ObjectAdaptor,
    interface: &'a Arc<InterfaceAdaptor>,
    call: &'a CallMessage,
    deferred: Cell<usize>,
}

impl<'a> CallContext<'a> {
    pub(crate) fn new(
        object: &'a ObjectAdaptor,
        interface: &'a Arc<InterfaceAdaptor>,
        call: &'a CallMessage,
    ) -> Self {
        Self {
            object,
            interface,
            call,
            deferred: Cell::new(0),
        }
    }

    /// Continuations successfully parked through this context
    pub(crate) fn deferred(&self) -> usize {
        self.deferred.get()
    }

    /// The call being dispatched
    pub fn call(&self) -> &'a CallMessage {
        self.call
    }

    /// Cursor over the call arguments
    pub fn args(&self) -> MessageReader<'a> {
        self.call.reader()
    }

    /// Empty return correlated to the call
    pub fn reply(&self) -> ReturnMessage {
        ReturnMessage::new(self.call)
    }

    /// Return carrying a single value
    pub fn reply_with<T: BusType>(&self, value: T) -> MethodResult {
        let mut reply = self.reply();
        reply.writer().append(value);
        Ok(Reply::Return(reply))
    }

    /// Park the call under `tag`; return [`Reply::Later`] afterwards
    pub fn return_later(&self, tag: ContinuationTag) -> crate::Result<Continuation> {
        let continuation = self.object.defer(tag, self.call)?;
        self.deferred.set(self.deferred.get() + 1);
        Ok(continuation)
    }

    /// Object the call was routed to
    pub fn object(&self) -> &'a ObjectAdaptor {
        self.object
    }

    /// Interface that owns the handler
    pub fn interface(&self) -> &'a Arc<InterfaceAdaptor> {
        self.interface
    }

    /// Look up another interface of the same object
    pub fn find_interface(&self, name: &str) -> Option<&'a Arc<InterfaceAdaptor>> {
        self.object.find_interface(name)
    }
}

struct MethodEntry {
    handler: MethodHandler,
    args: Vec<IntrospectedArgument>,
}

/// A named interface: methods, signals and properties
pub struct InterfaceAdaptor {
    name: String,
    methods: HashMap<String, MethodEntry>,
    signals: Vec<IntrospectedMethod>,
    properties: Arc<dyn PropertyProvider>,
}

impl InterfaceAdaptor {
    /// Create a new builder for interface `name`
    pub fn builder(name: impl Into<String>) -> InterfaceBuilder {
        InterfaceBuilder::new(name)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn method(&self, member: &str) -> Option<&MethodHandler> {
        self.methods.get(member).map(|m| &m.handler)
    }

    pub fn has_method(&self, member: &str) -> bool {
        self.methods.contains_key(member)
    }

    pub fn properties(&self) -> &Arc<dyn PropertyProvider> {
        &self.properties
    }

    /// Read a property through the provider; `None` when it has no value yet
    pub fn get_property(&self, name: &str) -> Result<Option<Variant>, MethodError> {
        self.properties.get_property(name)
    }

    /// Write a property through the provider
    pub fn set_property(&self, name: &str, value: Variant) -> Result<(), MethodError> {
        self.properties.set_property(name, value)
    }

    pub fn get_all_properties(&self) -> PropertyDict {
        self.properties.get_all_properties()
    }

    /// Describe methods, signals and properties
    pub fn introspect(&self) -> IntrospectedInterface {
        let mut methods: Vec<IntrospectedMethod> = self
            .methods
            .iter()
            .map(|(name, m)| IntrospectedMethod {
                name: name.clone(),
                args: m.args.clone(),
            })
            .collect();
        methods.sort_by(|a, b| a.name.cmp(&b.name));

        IntrospectedInterface {
            name: self.name.clone(),
            methods,
            signals: self.signals.clone(),
            properties: self.properties.describe(),
        }
    }
}

impl std::fmt::Debug for InterfaceAdaptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut methods: Vec<&String> = self.methods.keys().collect();
        methods.sort();
        f.debug_struct("InterfaceAdaptor")
            .field("name", &self.name)
            .field("methods", &methods)
            .finish()
    }
}

/// Builder for an [`InterfaceAdaptor`]
pub struct InterfaceBuilder {
    name: String,
    methods: HashMap<String, MethodEntry>,
    signals: Vec<IntrospectedMethod>,
    table: PropertyTable,
    provider: Option<Arc<dyn PropertyProvider>>,
}

impl InterfaceBuilder {
    /// Create a new, empty interface builder
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            methods: HashMap::new(),
            signals: Vec::new(),
            table: PropertyTable::new(),
            provider: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn method<F>(self, member: &str, handler: F) -> Self
    where
        F: Fn(&CallContext<'_>) -> MethodResult + Send + Sync + 'static,
    {
        self.method_with_args(member, Vec::new(), handler)
    }

    /// Register a method with its introspection arguments
    pub fn method_with_args<F>(mut self, member: &str, args: Vec<IntrospectedArgument>, handler: F) -> Self
    where
        F: Fn(&CallContext<'_>) -> MethodResult + Send + Sync + 'static,
    {
        self.add_method(member, args, Arc::new(handler));
        self
    }

    /// Add a method with introspection args, replacing one of the same name
    pub fn add_method(&mut self, member: &str, args: Vec<IntrospectedArgument>, handler: MethodHandler) {
        if self
            .methods
            .insert(member.to_string(), MethodEntry { handler, args })
            .is_some()
        {
            warn!("Method {}.{} registered twice, keeping the last", self.name, member);
        }
    }

    /// Declare a signal for introspection
    pub fn signal(mut self, name: &str, args: Vec<IntrospectedArgument>) -> Self {
        self.signals.push(IntrospectedMethod {
            name: name.to_string(),
            args,
        });
        self
    }

    /// Declare a property in the built-in [`PropertyTable`]
    pub fn property(self, name: &str, signature: Signature, access: PropertyAccess, initial: Option<Variant>) -> Self {
        self.table.declare(name, signature, access, initial);
        self
    }

    /// Serve properties from a custom provider instead of the built-in table
    pub fn properties(mut self, provider: Arc<dyn PropertyProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Finish the interface
    pub fn build(self) -> InterfaceAdaptor {
        let properties = match self.provider {
            Some(provider) => {
                if !self.table.is_empty() {
                    warn!(
                        "Interface {} has a custom property provider, ignoring {} declared properties",
                        self.name,
                        self.table.len()
                    );
                }
                provider
            }
            None => Arc::new(self.table),
        };
        InterfaceAdaptor {
            name: self.name,
            methods: self.methods,
            signals: self.signals,
            properties,
        }
    }
}
