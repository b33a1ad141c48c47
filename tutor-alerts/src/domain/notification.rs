//! Notification entity.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::NotificationState;
use crate::{Error, Result};

/// Message stored when the producer does not supply one.
pub const DEFAULT_MESSAGE: &str = "Tu tutor te está llamando";

/// A tutor-to-student alert.
///
/// Everything except `read` and `responded` is write-once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: String,
    pub group_id: String,
    pub student_id: String,
    pub tutor_id: String,
    pub created_at: DateTime<Utc>,
    pub read: bool,
    pub responded: bool,
    pub message: String,
}

impl Notification {
    pub fn state(&self) -> NotificationState {
        NotificationState::from_flags(self.read, self.responded)
    }
}

/// Validated input for creating a notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewNotification {
    pub group_id: String,
    pub student_id: String,
    pub tutor_id: String,
    pub message: String,
}

impl NewNotification {
    /// Validate the producer's fields.
    ///
    /// Missing or blank identifiers fail with `Validation`. Only an absent
    /// message falls back to [`DEFAULT_MESSAGE`]; a supplied one is stored as given.
    pub fn new(
        group_id: Option<String>,
        student_id: Option<String>,
        tutor_id: Option<String>,
        message: Option<String>,
    ) -> Result<Self> {
        let mut missing = Vec::new();
        let group_id = required(group_id, "groupId", &mut missing);
        let student_id = required(student_id, "studentId", &mut missing);
        let tutor_id = required(tutor_id, "tutorId", &mut missing);

        if !missing.is_empty() {
            return Err(Error::validation(format!(
                "missing required field(s): {}",
                missing.join(", ")
            )));
        }

        let message = message.unwrap_or_else(|| DEFAULT_MESSAGE.to_string());

        Ok(Self {
            group_id,
            student_id,
            tutor_id,
            message,
        })
    }
}

fn required(value: Option<String>, field: &'static str, missing: &mut Vec<&'static str>) -> String {
    match value.map(|v| v.trim().to_string()) {
        Some(v) if !v.is_empty() => v,
        _ => {
            missing.push(field);
            String::new()
        }
    }
}

/// Per-student counters.
///
/// `responded <= read <= total` and `unread == total - read`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct NotificationStats {
    pub total: u64,
    pub read: u64,
    pub responded: u64,
    pub unread: u64,
}

impl NotificationStats {
    pub fn new(total: u64, read: u64, responded: u64) -> Self {
        Self {
            total,
            read,
            responded,
            unread: total.saturating_sub(read),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn s(v: &str) -> Option<String> {
        Some(v.to_string())
    }

    #[test]
    fn test_default_message_when_absent() {
        let new = NewNotification::new(s("G1"), s("S1"), s("T1"), None).unwrap();
        assert_eq!(new.message, DEFAULT_MESSAGE);
    }

    #[test]
    fn test_message_kept_verbatim() {
        let new = NewNotification::new(s("G1"), s("S1"), s("T1"), s("hi")).unwrap();
        assert_eq!(new.message, "hi");

        let blank = NewNotification::new(s("G1"), s("S1"), s("T1"), s("   ")).unwrap();
        assert_eq!(blank.message, "   ");

        let empty = NewNotification::new(s("G1"), s("S1"), s("T1"), s("")).unwrap();
        assert_eq!(empty.message, "");
    }

    #[test]
    fn test_missing_fields_are_listed() {
        let err = NewNotification::new(None, s("S1"), s(""), None).unwrap_err();
        match err {
            Error::Validation(msg) => {
                assert!(msg.contains("groupId"));
                assert!(msg.contains("tutorId"));
                assert!(!msg.contains("studentId"));
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_wire_format_is_camel_case() {
        let n = Notification {
            id: "n1".into(),
            group_id: "G1".into(),
            student_id: "S1".into(),
            tutor_id: "T1".into(),
            created_at: Utc::now(),
            read: false,
            responded: false,
            message: "hi".into(),
        };
        let json = serde_json::to_value(&n).unwrap();
        assert_eq!(json["groupId"], "G1");
        assert_eq!(json["studentId"], "S1");
        assert!(json.get("createdAt").is_some());
        assert_eq!(json["read"], false);
    }

    #[test]
    fn test_stats_unread() {
        let stats = NotificationStats::new(5, 3, 1);
        assert_eq!(stats.unread, 2);
    }
}
