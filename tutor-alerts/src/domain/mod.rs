//! Domain layer.
//!
//! The notification entity, its acknowledgement state machine and the
//! identity types used to validate producers.

pub mod identity;
pub mod notification;
pub mod state;

pub use identity::{Identity, Role};
pub use notification::{DEFAULT_MESSAGE, NewNotification, Notification, NotificationStats};
pub use state::{Acknowledgement, NotificationState};
