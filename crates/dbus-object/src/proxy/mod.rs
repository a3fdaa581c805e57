//! Remote object side
//!
//! - Object proxies that invoke methods and await correlated replies
//! - Interface proxies with signal stubs

mod interface;
mod object_proxy;

pub use interface::*;
pub use object_proxy::*;
