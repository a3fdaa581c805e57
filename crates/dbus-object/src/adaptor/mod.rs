//! Local object side
//!
//! - Interface adaptors with closure method handlers
//! - Per-object interface registry
//! - Method dispatch with immediate, failed or deferred replies
//! - Continuations for replies sent after the handler returned

mod continuation;
mod interface;
mod object_adaptor;
mod registry;

pub use continuation::*;
pub use interface::*;
pub use object_adaptor::*;
pub use registry::*;
