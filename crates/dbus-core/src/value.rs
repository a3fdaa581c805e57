//! Self-describing value model
//!
//! Every value carries enough information to derive its type signature, so
//! message bodies can be inspected without an external schema:
//! - Basic types: integers, booleans, doubles, strings, object paths, signatures
//! - Containers: arrays, dictionaries, structs
//! - Variants: a value boxed together with its signature

use std::collections::{BTreeMap, HashMap};
use std::hash::Hash;
use crate::error::{Error, Result};
use crate::types::{ObjectPath, Signature};

/// A single bus value
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Byte(u8),
    Bool(bool),
    Int16(i16),
    UInt16(u16),
    Int32(i32),
    UInt32(u32),
    Int64(i64),
    UInt64(u64),
    Double(f64),
    String(String),
    ObjectPath(ObjectPath),
    Signature(Signature),
    Array(Array),
    Dict(Dict),
    Struct(Vec<Value>),
    Variant(Variant),
}

impl Value {
    /// Derive the type signature of this value
    pub fn signature(&self) -> Signature {
        let code = match self {
            Value::Byte(_) => "y",
            Value::Bool(_) => "b",
            Value::Int16(_) => "n",
            Value::UInt16(_) => "q",
            Value::Int32(_) => "i",
            Value::UInt32(_) => "u",
            Value::Int64(_) => "x",
            Value::UInt64(_) => "t",
            Value::Double(_) => "d",
            Value::String(_) => "s",
            Value::ObjectPath(_) => "o",
            Value::Signature(_) => "g",
            Value::Variant(_) => "v",
            Value::Array(array) => {
                return Signature::new_unchecked(format!("a{}", array.element));
            }
            Value::Dict(dict) => {
                return Signature::new_unchecked(format!("a{{{}{}}}", dict.key, dict.value));
            }
            Value::Struct(fields) => {
                let inner: String = fields
                    .iter()
                    .map(|f| f.signature().to_string())
                    .collect();
                return Signature::new_unchecked(format!("({})", inner));
            }
        };
        Signature::new_unchecked(code)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

/// Homogeneous array with an explicit element signature
///
/// The element signature is kept separately so an empty array still has a
/// complete type.
#[derive(Clone, Debug, PartialEq)]
pub struct Array {
    element: Signature,
    items: Vec<Value>,
}

impl Array {
    pub fn new(element: Signature) -> Self {
        Self {
            element,
            items: Vec::new(),
        }
    }

    /// Build an array, checking every item against the element signature
    pub fn with_items(element: Signature, items: Vec<Value>) -> Result<Self> {
        let mut array = Self::new(element);
        for item in items {
            array.push(item)?;
        }
        Ok(array)
    }

    pub fn push(&mut self, item: Value) -> Result<()> {
        if item.signature() != self.element {
            return Err(Error::type_mismatch(self.element.as_str(), &item));
        }
        self.items.push(item);
        Ok(())
    }

    pub fn element_signature(&self) -> &Signature {
        &self.element
    }

    pub fn items(&self) -> &[Value] {
        &self.items
    }

    pub fn into_items(self) -> Vec<Value> {
        self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Dictionary (array of dict entries)
#[derive(Clone, Debug, PartialEq)]
pub struct Dict {
    key: Signature,
    value: Signature,
    entries: Vec<(Value, Value)>,
}

impl Dict {
    pub fn new(key: Signature, value: Signature) -> Self {
        Self {
            key,
            value,
            entries: Vec::new(),
        }
    }

    /// Insert an entry, replacing any entry with an equal key
    pub fn insert(&mut self, key: Value, value: Value) -> Result<()> {
        if key.signature() != self.key {
            return Err(Error::type_mismatch(self.key.as_str(), &key));
        }
        if value.signature() != self.value {
            return Err(Error::type_mismatch(self.value.as_str(), &value));
        }
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
        Ok(())
    }

    pub fn get(&self, key: &Value) -> Option<&Value> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }

    pub fn key_signature(&self) -> &Signature {
        &self.key
    }

    pub fn value_signature(&self) -> &Signature {
        &self.value
    }

    pub fn entries(&self) -> &[(Value, Value)] {
        &self.entries
    }

    pub fn into_entries(self) -> Vec<(Value, Value)> {
        self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A value paired with its runtime signature
///
/// A variant may be uninitialized: it then holds no value and reports the
/// empty signature. That state is distinct from a property being absent.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Variant(Option<Box<Value>>);

impl Variant {
    pub fn new<T: BusType>(value: T) -> Self {
        Self(Some(Box::new(value.into_value())))
    }

    /// Wrap an already built value
    pub fn wrap(value: Value) -> Self {
        Self(Some(Box::new(value)))
    }

    /// A variant that has never been assigned
    pub fn uninit() -> Self {
        Self(None)
    }

    pub fn is_initialized(&self) -> bool {
        self.0.is_some()
    }

    /// Signature of the contained value, empty when uninitialized
    pub fn signature(&self) -> Signature {
        match &self.0 {
            Some(value) => value.signature(),
            None => Signature::empty(),
        }
    }

    pub fn value(&self) -> Option<&Value> {
        self.0.as_deref()
    }

    pub fn into_inner(self) -> Option<Value> {
        self.0.map(|v| *v)
    }

    /// Extract the contained value as a concrete type
    pub fn get<T: BusType>(&self) -> Result<T> {
        match &self.0 {
            Some(value) => T::from_value((**value).clone()),
            None => Err(Error::TypeMismatch {
                expected: T::signature().to_string(),
                got: String::new(),
            }),
        }
    }
}

/// Rust types with a fixed mapping onto the bus type system
pub trait BusType: Sized {
    /// Static signature of the type
    fn signature() -> Signature;

    fn into_value(self) -> Value;

    fn from_value(value: Value) -> Result<Self>;
}

macro_rules! basic_type {
    ($ty:ty, $variant:ident, $code:expr) => {
        impl BusType for $ty {
            fn signature() -> Signature {
                Signature::new_unchecked($code)
            }

            fn into_value(self) -> Value {
                Value::$variant(self)
            }

            fn from_value(value: Value) -> Result<Self> {
                match value {
                    Value::$variant(v) => Ok(v),
                    other => Err(Error::type_mismatch($code, &other)),
                }
            }
        }
    };
}

basic_type!(u8, Byte, "y");
basic_type!(bool, Bool, "b");
basic_type!(i16, Int16, "n");
basic_type!(u16, UInt16, "q");
basic_type!(i32, Int32, "i");
basic_type!(u32, UInt32, "u");
basic_type!(i64, Int64, "x");
basic_type!(u64, UInt64, "t");
basic_type!(f64, Double, "d");
basic_type!(String, String, "s");
basic_type!(ObjectPath, ObjectPath, "o");
basic_type!(Signature, Signature, "g");
basic_type!(Variant, Variant, "v");

impl<T: BusType> BusType for Vec<T> {
    fn signature() -> Signature {
        Signature::new_unchecked(format!("a{}", T::signature()))
    }

    fn into_value(self) -> Value {
        Value::Array(Array {
            element: T::signature(),
            items: self.into_iter().map(BusType::into_value).collect(),
        })
    }

    fn from_value(value: Value) -> Result<Self> {
        let expected = Self::signature();
        match value {
            Value::Array(array) if array.element == T::signature() => {
                array.items.into_iter().map(T::from_value).collect()
            }
            other => Err(Error::type_mismatch(expected.as_str(), &other)),
        }
    }
}

fn dict_signature<K: BusType, V: BusType>() -> Signature {
    Signature::new_unchecked(format!("a{{{}{}}}", K::signature(), V::signature()))
}

fn dict_into_value<K, V, I>(entries: I) -> Value
where
    K: BusType,
    V: BusType,
    I: IntoIterator<Item = (K, V)>,
{
    Value::Dict(Dict {
        key: K::signature(),
        value: V::signature(),
        entries: entries
            .into_iter()
            .map(|(k, v)| (k.into_value(), v.into_value()))
            .collect(),
    })
}

fn dict_from_value<K, V, C>(value: Value) -> Result<C>
where
    K: BusType,
    V: BusType,
    C: FromIterator<(K, V)>,
{
    let expected = dict_signature::<K, V>();
    match value {
        Value::Dict(dict) if dict.key == K::signature() && dict.value == V::signature() => dict
            .entries
            .into_iter()
            .map(|(k, v)| -> Result<(K, V)> { Ok((K::from_value(k)?, V::from_value(v)?)) })
            .collect(),
        other => Err(Error::type_mismatch(expected.as_str(), &other)),
    }
}

impl<K: BusType + Eq + Hash, V: BusType> BusType for HashMap<K, V> {
    fn signature() -> Signature {
        dict_signature::<K, V>()
    }

    fn into_value(self) -> Value {
        dict_into_value(self)
    }

    fn from_value(value: Value) -> Result<Self> {
        dict_from_value::<K, V, Self>(value)
    }
}

impl<K: BusType + Ord, V: BusType> BusType for BTreeMap<K, V> {
    fn signature() -> Signature {
        dict_signature::<K, V>()
    }

    fn into_value(self) -> Value {
        dict_into_value(self)
    }

    fn from_value(value: Value) -> Result<Self> {
        dict_from_value::<K, V, Self>(value)
    }
}
