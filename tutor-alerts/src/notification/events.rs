//! Real-time delivery events and room addressing.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::Error;
use crate::domain::Notification;

/// Event name carried on the push channel.
pub const NEW_NOTIFICATION_EVENT: &str = "new-notification";

/// An addressable push channel.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Room {
    /// Per-student room, `student-{id}`.
    Student(String),
    /// Per-group room, `group-{id}`.
    Group(String),
}

impl Room {
    pub fn student(id: impl Into<String>) -> Self {
        Self::Student(id.into())
    }

    pub fn group(id: impl Into<String>) -> Self {
        Self::Group(id.into())
    }

    /// The two rooms a notification is fanned out to.
    pub fn for_notification(notification: &Notification) -> [Room; 2] {
        [
            Self::Student(notification.student_id.clone()),
            Self::Group(notification.group_id.clone()),
        ]
    }
}

impl fmt::Display for Room {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Student(id) => write!(f, "student-{}", id),
            Self::Group(id) => write!(f, "group-{}", id),
        }
    }
}

impl FromStr for Room {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let room = if let Some(id) = s.strip_prefix("student-") {
            Self::Student(id.to_string())
        } else if let Some(id) = s.strip_prefix("group-") {
            Self::Group(id.to_string())
        } else {
            return Err(Error::validation(format!("unknown room '{}'", s)));
        };

        match &room {
            Self::Student(id) | Self::Group(id) if id.trim().is_empty() => {
                Err(Error::validation(format!("room '{}' has an empty id", s)))
            }
            _ => Ok(room),
        }
    }
}

/// Payload of a `new-notification` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewNotificationPayload {
    pub notification: Notification,
    pub message: String,
}

/// Events sent on the push channel.
///
/// Serialized as `{"event": "<name>", "data": {...}}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum DeliveryEvent {
    #[serde(rename = "new-notification")]
    NewNotification(NewNotificationPayload),
}

impl DeliveryEvent {
    pub fn new_notification(notification: &Notification) -> Self {
        Self::NewNotification(NewNotificationPayload {
            message: notification.message.clone(),
            notification: notification.clone(),
        })
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::NewNotification(_) => NEW_NOTIFICATION_EVENT,
        }
    }

    pub fn notification(&self) -> &Notification {
        match self {
            Self::NewNotification(payload) => &payload.notification,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn sample() -> Notification {
        Notification {
            id: "n1".into(),
            group_id: "G1".into(),
            student_id: "S1".into(),
            tutor_id: "T1".into(),
            created_at: Utc::now(),
            read: false,
            responded: false,
            message: "hi".into(),
        }
    }

    #[test]
    fn test_rooms_for_notification() {
        let rooms = Room::for_notification(&sample());
        assert_eq!(rooms[0].to_string(), "student-S1");
        assert_eq!(rooms[1].to_string(), "group-G1");
    }

    #[test]
    fn test_room_parse() {
        assert_eq!("student-S1".parse::<Room>().unwrap(), Room::student("S1"));
        assert_eq!("group-G-7".parse::<Room>().unwrap(), Room::group("G-7"));
        assert!("teacher-T1".parse::<Room>().is_err());
        assert!("student-".parse::<Room>().is_err());
    }

    #[test]
    fn test_event_wire_format() {
        let event = DeliveryEvent::new_notification(&sample());
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], NEW_NOTIFICATION_EVENT);
        assert_eq!(json["data"]["message"], "hi");
        assert_eq!(json["data"]["notification"]["studentId"], "S1");

        let back: DeliveryEvent = serde_json::from_value(json).unwrap();
        assert_eq!(back, event);
    }
}
