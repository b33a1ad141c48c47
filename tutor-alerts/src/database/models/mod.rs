//! Database models.
//!
//! These map directly to the database schema.

pub mod identity;
pub mod notification;

pub use identity::*;
pub use notification::*;
