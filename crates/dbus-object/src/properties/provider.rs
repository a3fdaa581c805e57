//! Property storage behind an interface

use std::collections::{BTreeMap, HashMap};
use parking_lot::RwLock;
use tracing::{trace, warn};
use dbus_core::{MethodError, Signature, Variant};
use crate::introspection::IntrospectedProperty;

/// Snapshot of property values keyed by name
pub type PropertyDict = HashMap<String, Variant>;

/// Who may touch a property from the bus
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyAccess {
    Read,
    Write,
    ReadWrite,
}

impl PropertyAccess {
    pub fn is_readable(self) -> bool {
        matches!(self, PropertyAccess::Read | PropertyAccess::ReadWrite)
    }

    pub fn is_writable(self) -> bool {
        matches!(self, PropertyAccess::Write | PropertyAccess::ReadWrite)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PropertyAccess::Read => "read",
            PropertyAccess::Write => "write",
            PropertyAccess::ReadWrite => "readwrite",
        }
    }
}

/// Property contract an interface exposes to the Properties overlay
///
/// `get_property` distinguishes three states: `Ok(None)` when the property
/// does not exist, an uninitialized variant when it exists without a value,
/// and an initialized variant otherwise.
pub trait PropertyProvider: Send + Sync {
    fn get_property(&self, name: &str) -> Result<Option<Variant>, MethodError>;

    /// Replace a value; an error leaves the previous value in place
    fn set_property(&self, name: &str, value: Variant) -> Result<(), MethodError>;

    /// Fresh snapshot of all readable properties
    fn get_all_properties(&self) -> PropertyDict;

    fn describe(&self) -> Vec<IntrospectedProperty> {
        Vec::new()
    }
}

struct PropertyEntry {
    signature: Signature,
    access: PropertyAccess,
    value: Variant,
}

/// Default [`PropertyProvider`]: typed slots with access control
pub struct PropertyTable {
    entries: RwLock<BTreeMap<String, PropertyEntry>>,
}

impl PropertyTable {
    /// Create a new, empty property table
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(BTreeMap::new()),
        }
    }

    /// Declare a property; an initial value of the wrong type is discarded
    pub fn declare(&self, name: &str, signature: Signature, access: PropertyAccess, initial: Option<Variant>) {
        let value = match initial {
            Some(v) if v.signature() == signature => v,
            Some(v) => {
                warn!(
                    "Initial value for {} has signature {}, expected {}",
                    name,
                    v.signature(),
                    signature
                );
                Variant::uninit()
            }
            None => Variant::uninit(),
        };
        self.entries.write().insert(
            name.to_string(),
            PropertyEntry {
                signature,
                access,
                value,
            },
        );
    }

    /// Server-side update, ignoring the access mode
    pub fn update(&self, name: &str, value: Variant) -> Result<(), MethodError> {
        let mut entries = self.entries.write();
        let entry = entries
            .get_mut(name)
            .ok_or_else(|| MethodError::unknown_property("requested property not found"))?;
        check_signature(name, &entry.signature, &value)?;
        entry.value = value;
        Ok(())
    }

    /// Current value regardless of the access mode
    pub fn value(&self, name: &str) -> Option<Variant> {
        self.entries.read().get(name).map(|e| e.value.clone())
    }

    pub fn names(&self) -> Vec<String> {
        self.entries.read().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl Default for PropertyTable {
    fn default() -> Self {
        Self::new()
    }
}

fn check_signature(name: &str, expected: &Signature, value: &Variant) -> Result<(), MethodError> {
    let got = value.signature();
    if &got == expected {
        Ok(())
    } else {
        Err(MethodError::invalid_signature(format!(
            "property {} has signature {}, got {}",
            name, expected, got
        )))
    }
}

impl PropertyProvider for PropertyTable {
    fn get_property(&self, name: &str) -> Result<Option<Variant>, MethodError> {
        let entries = self.entries.read();
        match entries.get(name) {
            Some(entry) if !entry.access.is_readable() => Err(MethodError::access_denied(format!(
                "property {} is not readable",
                name
            ))),
            Some(entry) => Ok(Some(entry.value.clone())),
            None => Ok(None),
        }
    }

    fn set_property(&self, name: &str, value: Variant) -> Result<(), MethodError> {
        let mut entries = self.entries.write();
        let entry = entries
            .get_mut(name)
            .ok_or_else(|| MethodError::unknown_property("requested property not found"))?;
        if !entry.access.is_writable() {
            return Err(MethodError::property_read_only(format!(
                "property {} is read-only",
                name
            )));
        }
        check_signature(name, &entry.signature, &value)?;
        trace!("Property {} set to {:?}", name, value);
        entry.value = value;
        Ok(())
    }

    fn get_all_properties(&self) -> PropertyDict {
        self.entries
            .read()
            .iter()
            .filter(|(_, e)| e.access.is_readable() && e.value.is_initialized())
            .map(|(name, e)| (name.clone(), e.value.clone()))
            .collect()
    }

    fn describe(&self) -> Vec<IntrospectedProperty> {
        self.entries
            .read()
            .iter()
            .map(|(name, e)| IntrospectedProperty {
                name: name.clone(),
                signature: e.signature.clone(),
                access: e.access,
            })
            .collect()
    }
}
