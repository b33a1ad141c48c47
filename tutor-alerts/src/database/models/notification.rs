//! Notification database model.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::database::time::{ms_to_datetime, now_ms};
use crate::domain::{NewNotification, Notification, NotificationState};

/// Notification database model.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct NotificationDbModel {
    pub id: String,
    pub group_id: String,
    pub student_id: String,
    pub tutor_id: String,
    pub message: String,
    pub is_read: bool,
    pub is_responded: bool,
    /// Unix epoch milliseconds (UTC), set by the store.
    pub created_at: i64,
}

impl NotificationDbModel {
    /// Build a fresh record: new id, `created_at = now`, both flags false.
    pub fn new(input: NewNotification) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            group_id: input.group_id,
            student_id: input.student_id,
            tutor_id: input.tutor_id,
            message: input.message,
            is_read: false,
            is_responded: false,
            created_at: now_ms(),
        }
    }

    pub fn state(&self) -> NotificationState {
        NotificationState::from_flags(self.is_read, self.is_responded)
    }
}

impl From<NotificationDbModel> for Notification {
    fn from(row: NotificationDbModel) -> Self {
        // Normalize through the state so responded always implies read.
        let (read, responded) = row.state().flags();
        Self {
            id: row.id,
            group_id: row.group_id,
            student_id: row.student_id,
            tutor_id: row.tutor_id,
            created_at: ms_to_datetime(row.created_at),
            read,
            responded,
            message: row.message,
        }
    }
}

/// Outcome of an acknowledgement update.
#[derive(Debug, Clone)]
pub struct StateUpdate {
    /// State before the update was applied.
    pub previous: NotificationState,
    /// Record after the update.
    pub record: NotificationDbModel,
}

impl StateUpdate {
    pub fn changed(&self) -> bool {
        self.previous != self.record.state()
    }
}

/// Aggregate counters row for one student.
#[derive(Debug, Clone, Copy, Default, FromRow)]
pub struct NotificationCountsRow {
    pub total: i64,
    pub read: i64,
    pub responded: i64,
}
