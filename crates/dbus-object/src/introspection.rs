//! Introspection descriptors
//!
//! Structured descriptions of an object's interfaces. Rendering them into
//! any particular document format is left to the caller.

use dbus_core::{BusType, Signature};
use crate::properties::PropertyAccess;

/// A method or signal argument
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntrospectedArgument {
    pub name: String,
    pub signature: Signature,
    /// `true` for method inputs; signal arguments are always outputs
    pub input: bool,
}

impl IntrospectedArgument {
    pub fn input<T: BusType>(name: &str) -> Self {
        Self {
            name: name.to_string(),
            signature: T::signature(),
            input: true,
        }
    }

    pub fn output<T: BusType>(name: &str) -> Self {
        Self {
            name: name.to_string(),
            signature: T::signature(),
            input: false,
        }
    }
}

/// A method or a signal
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntrospectedMethod {
    pub name: String,
    pub args: Vec<IntrospectedArgument>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntrospectedProperty {
    pub name: String,
    pub signature: Signature,
    pub access: PropertyAccess,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntrospectedInterface {
    pub name: String,
    pub methods: Vec<IntrospectedMethod>,
    pub signals: Vec<IntrospectedMethod>,
    pub properties: Vec<IntrospectedProperty>,
}

impl IntrospectedInterface {
    pub fn method(&self, name: &str) -> Option<&IntrospectedMethod> {
        self.methods.iter().find(|m| m.name == name)
    }

    pub fn property(&self, name: &str) -> Option<&IntrospectedProperty> {
        self.properties.iter().find(|p| p.name == name)
    }
}
