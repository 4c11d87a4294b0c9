//! Identifiers, scope sets, and secret wrappers shared by every connector.

pub mod id;
pub mod scope;
pub mod secret;

pub use id::*;
pub use scope::*;
pub use secret::*;
