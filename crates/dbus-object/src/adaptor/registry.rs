//! Interface name -> implementation

use std::collections::HashMap;
use std::sync::Arc;
use dbus_core::MethodError;
use crate::adaptor::interface::{InterfaceAdaptor, MethodHandler};
use crate::error::{ObjectError, Result};

/// Interfaces of one object, in registration order
///
/// Filled while the object is built and read-only afterwards.
#[derive(Default)]
pub struct InterfaceRegistry {
    interfaces: Vec<Arc<InterfaceAdaptor>>,
    index: HashMap<String, usize>,
}

impl InterfaceRegistry {
    /// Create a new, empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an interface; names must be unique
    pub fn add(&mut self, interface: InterfaceAdaptor) -> Result<()> {
        if self.index.contains_key(interface.name()) {
            return Err(ObjectError::DuplicateInterface(interface.name().to_string()));
        }
        self.index
            .insert(interface.name().to_string(), self.interfaces.len());
        self.interfaces.push(Arc::new(interface));
        Ok(())
    }

    /// Look up an interface by name
    pub fn find(&self, name: &str) -> Option<&Arc<InterfaceAdaptor>> {
        self.index.get(name).map(|&i| &self.interfaces[i])
    }

    /// Pick the handler for `interface.member`
    ///
    /// Without an interface the first interface, in registration order,
    /// that has `member` wins.
    pub fn resolve(
        &self,
        interface: Option<&str>,
        member: &str,
    ) -> std::result::Result<(&Arc<InterfaceAdaptor>, &MethodHandler), MethodError> {
        match interface {
            Some(name) => {
                let iface = self.find(name).ok_or_else(|| {
                    MethodError::unknown_interface(format!("no such interface '{}'", name))
                })?;
                let handler = iface.method(member).ok_or_else(|| {
                    MethodError::unknown_method(format!(
                        "no such method '{}' on interface '{}'",
                        member, name
                    ))
                })?;
                Ok((iface, handler))
            }
            None => self
                .interfaces
                .iter()
                .find_map(|iface| iface.method(member).map(|h| (iface, h)))
                .ok_or_else(|| {
                    MethodError::unknown_method(format!("no such method '{}'", member))
                }),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<InterfaceAdaptor>> {
        self.interfaces.iter()
    }

    pub fn names(&self) -> Vec<&str> {
        self.interfaces.iter().map(|i| i.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.interfaces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.interfaces.is_empty()
    }
}
