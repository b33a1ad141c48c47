//! Notification acknowledgement state machine.

use serde::{Deserialize, Serialize};

/// Acknowledgement state of a notification.
///
/// The derived ordering is the monotone progression `Created < Read < Responded`.
/// Stores only ever move a record forward on this order.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Default,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    utoipa::ToSchema,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationState {
    /// Delivered to the store, not yet seen.
    #[default]
    Created,
    /// Seen by the student.
    Read,
    /// Acknowledged by the student. Terminal.
    Responded,
}

/// Client-issued acknowledgement actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum Acknowledgement {
    MarkRead,
    MarkResponded,
}

impl NotificationState {
    /// Derive the state from the stored flags.
    ///
    /// `responded` wins over `read`, so a record with `responded` set is
    /// always reported as `Responded`.
    pub fn from_flags(read: bool, responded: bool) -> Self {
        match (read, responded) {
            (_, true) => Self::Responded,
            (true, false) => Self::Read,
            (false, false) => Self::Created,
        }
    }

    /// Flags as `(read, responded)`.
    pub fn flags(&self) -> (bool, bool) {
        match self {
            Self::Created => (false, false),
            Self::Read => (true, false),
            Self::Responded => (true, true),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Responded)
    }

    /// Apply an acknowledgement.
    ///
    /// Every action is defined from every state: repeats and actions that
    /// would move backwards leave the state unchanged.
    pub fn apply(self, action: Acknowledgement) -> Self {
        let target = match action {
            Acknowledgement::MarkRead => Self::Read,
            Acknowledgement::MarkResponded => Self::Responded,
        };
        self.max(target)
    }
}
