//! Object paths and type signatures

use std::fmt;
use std::str::FromStr;
use crate::error::{Error, Result};
use crate::value::BusType;

/// Hierarchical object path, e.g. `/org/example/Box`
///
/// Must start with `/`, segments are non-empty `[A-Za-z0-9_]+` and only the
/// root path may end with `/`.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectPath(String);

impl ObjectPath {
    /// Parse and validate a path
    pub fn new(path: impl Into<String>) -> Result<Self> {
        let path = path.into();
        if Self::is_valid(&path) {
            Ok(Self(path))
        } else {
            Err(Error::InvalidPath(path))
        }
    }

    /// The root path `/`
    pub fn root() -> Self {
        Self("/".to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Check whether `path` is a syntactically valid object path
    pub fn is_valid(path: &str) -> bool {
        if path == "/" {
            return true;
        }
        path.starts_with('/')
            && !path.ends_with('/')
            && path[1..].split('/').all(|segment| {
                !segment.is_empty()
                    && segment
                        .bytes()
                        .all(|b| b.is_ascii_alphanumeric() || b == b'_')
            })
    }
}

impl fmt::Debug for ObjectPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectPath({})", self.0)
    }
}

impl fmt::Display for ObjectPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ObjectPath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl FromStr for ObjectPath {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

impl TryFrom<&str> for ObjectPath {
    type Error = Error;

    fn try_from(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

/// Type codes accepted in a signature string
const SIGNATURE_CODES: &[u8] = b"ybnqiuxtdsogavh(){}";

/// Type signature, e.g. `a{sv}`
///
/// The empty signature describes "no value"; an uninitialized
/// [`Variant`](crate::Variant) reports it.
#[derive(Clone, Default, PartialEq, Eq, Hash)]
pub struct Signature(String);

impl Signature {
    /// Parse a signature, rejecting unknown type codes
    pub fn new(sig: impl Into<String>) -> Result<Self> {
        let sig = sig.into();
        if sig.bytes().all(|b| SIGNATURE_CODES.contains(&b)) {
            Ok(Self(sig))
        } else {
            Err(Error::InvalidSignature(sig))
        }
    }

    pub(crate) fn new_unchecked(sig: impl Into<String>) -> Self {
        Self(sig.into())
    }

    /// The empty signature
    pub fn empty() -> Self {
        Self(String::new())
    }

    /// Signature of a Rust type mapped onto the bus type system
    pub fn of<T: BusType>() -> Self {
        T::signature()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Signature({:?})", self.0)
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Signature {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl FromStr for Signature {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}
