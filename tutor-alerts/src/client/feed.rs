//! Snapshot source for client-side reconciliation.

use async_trait::async_trait;

use crate::Result;
use crate::domain::Notification;
use crate::notification::NotificationGateway;

/// Authoritative list source polled by the reconciliation loop.
///
/// Every response is a full snapshot, newest first.
#[async_trait]
pub trait NotificationFeed: Send + Sync {
    async fn fetch_snapshot(
        &self,
        student_id: &str,
        unread_only: bool,
        limit: Option<u32>,
    ) -> Result<Vec<Notification>>;
}

#[async_trait]
impl NotificationFeed for NotificationGateway {
    async fn fetch_snapshot(
        &self,
        student_id: &str,
        unread_only: bool,
        limit: Option<u32>,
    ) -> Result<Vec<Notification>> {
        self.list_by_student(student_id, unread_only, limit).await
    }
}
