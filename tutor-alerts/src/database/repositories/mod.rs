//! Repository layer for database access.

pub mod identity;
pub mod notification;

pub use identity::*;
pub use notification::*;
