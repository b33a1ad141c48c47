//! Per-student counters derived from the store on every call.

use std::sync::Arc;

use crate::Result;
use crate::database::repositories::NotificationRepository;
use crate::domain::NotificationStats;

/// Derives `{total, read, responded, unread}` for a student.
///
/// Holds no cached state; each call is a fresh aggregate query.
#[derive(Clone)]
pub struct StatsAggregator {
    store: Arc<dyn NotificationRepository>,
}

impl StatsAggregator {
    pub fn new(store: Arc<dyn NotificationRepository>) -> Self {
        Self { store }
    }

    pub async fn stats(&self, student_id: &str) -> Result<NotificationStats> {
        let counts = self.store.counts_for_student(student_id).await?;

        let total = counts.total.max(0) as u64;
        let read = (counts.read.max(0) as u64).min(total);
        let responded = (counts.responded.max(0) as u64).min(read);

        Ok(NotificationStats::new(total, read, responded))
    }
}
