//! `org.freedesktop.DBus.Properties`
//!
//! - Property providers and the default typed property table
//! - The server side overlay (`Get`, `Set`, `GetAll`) added to every object
//! - The proxy mirror with `PropertiesChanged` notifications

mod adaptor;
mod provider;
mod proxy;

pub use adaptor::*;
pub use provider::*;
pub use proxy::*;
