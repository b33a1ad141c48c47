//! Notification repository.
//!
//! The store is the sole writer of notification state. Acknowledgement
//! updates are conditional `UPDATE`s that only ever set flags to true, so
//! racing writers can never move a record backwards.

use async_trait::async_trait;
use sqlx::SqlitePool;

use crate::database::models::{NotificationCountsRow, NotificationDbModel, StateUpdate};
use crate::database::retry::{NotificationWrite, with_write_retry};
use crate::domain::{Acknowledgement, NotificationState};
use crate::{Error, Result};

const ENTITY: &str = "Notification";

/// Notification repository trait.
#[async_trait]
pub trait NotificationRepository: Send + Sync {
    /// Persist a new record.
    async fn insert(&self, notification: &NotificationDbModel) -> Result<()>;

    /// Fetch a record by id.
    async fn get(&self, id: &str) -> Result<NotificationDbModel>;

    /// Set `read`. Idempotent.
    async fn mark_read(&self, id: &str) -> Result<StateUpdate>;

    /// Set `read` and `responded`. Idempotent.
    async fn mark_responded(&self, id: &str) -> Result<StateUpdate>;

    /// Records for a student, newest first.
    async fn list_by_student(
        &self,
        student_id: &str,
        unread_only: bool,
        limit: i64,
    ) -> Result<Vec<NotificationDbModel>>;

    /// Records for a group, newest first.
    async fn list_by_group(&self, group_id: &str, limit: i64) -> Result<Vec<NotificationDbModel>>;

    /// Unconditional removal.
    async fn delete(&self, id: &str) -> Result<()>;

    /// Aggregate counters for a student.
    async fn counts_for_student(&self, student_id: &str) -> Result<NotificationCountsRow>;
}

/// SQLx implementation of NotificationRepository.
pub struct SqlxNotificationRepository {
    pool: SqlitePool,
}

impl SqlxNotificationRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn acknowledge(&self, id: &str, action: Acknowledgement) -> Result<StateUpdate> {
        let current = self.get(id).await?;
        let previous = current.state();
        let target = previous.apply(action);

        if target == previous {
            return Ok(StateUpdate {
                previous,
                record: current,
            });
        }

        let sql = match target {
            NotificationState::Responded => {
                "UPDATE notification SET is_read = 1, is_responded = 1 \
                 WHERE id = ? AND is_responded = 0"
            }
            _ => "UPDATE notification SET is_read = 1 WHERE id = ? AND is_read = 0",
        };

        with_write_retry(action.into(), id, || async {
            sqlx::query(sql).bind(id).execute(&self.pool).await?;
            Ok(())
        })
        .await?;

        // A concurrent delete between the update and this read surfaces as NotFound.
        let record = self.get(id).await?;
        Ok(StateUpdate { previous, record })
    }
}

#[async_trait]
impl NotificationRepository for SqlxNotificationRepository {
    async fn insert(&self, notification: &NotificationDbModel) -> Result<()> {
        with_write_retry(NotificationWrite::Insert, &notification.id, || async {
            sqlx::query(
                r#"
                INSERT INTO notification (
                    id, group_id, student_id, tutor_id, message,
                    is_read, is_responded, created_at
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&notification.id)
            .bind(&notification.group_id)
            .bind(&notification.student_id)
            .bind(&notification.tutor_id)
            .bind(&notification.message)
            .bind(notification.is_read)
            .bind(notification.is_responded)
            .bind(notification.created_at)
            .execute(&self.pool)
            .await?;
            Ok(())
        })
        .await
    }

    async fn get(&self, id: &str) -> Result<NotificationDbModel> {
        sqlx::query_as::<_, NotificationDbModel>("SELECT * FROM notification WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| Error::not_found(ENTITY, id))
    }

    async fn mark_read(&self, id: &str) -> Result<StateUpdate> {
        self.acknowledge(id, Acknowledgement::MarkRead).await
    }

    async fn mark_responded(&self, id: &str) -> Result<StateUpdate> {
        self.acknowledge(id, Acknowledgement::MarkResponded).await
    }

    async fn list_by_student(
        &self,
        student_id: &str,
        unread_only: bool,
        limit: i64,
    ) -> Result<Vec<NotificationDbModel>> {
        let sql = if unread_only {
            "SELECT * FROM notification WHERE student_id = ? AND is_read = 0 \
             ORDER BY created_at DESC, rowid DESC LIMIT ?"
        } else {
            "SELECT * FROM notification WHERE student_id = ? \
             ORDER BY created_at DESC, rowid DESC LIMIT ?"
        };

        let rows = sqlx::query_as::<_, NotificationDbModel>(sql)
            .bind(student_id)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    async fn list_by_group(&self, group_id: &str, limit: i64) -> Result<Vec<NotificationDbModel>> {
        let rows = sqlx::query_as::<_, NotificationDbModel>(
            "SELECT * FROM notification WHERE group_id = ? \
             ORDER BY created_at DESC, rowid DESC LIMIT ?",
        )
        .bind(group_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let result = with_write_retry(NotificationWrite::Delete, id, || async {
            Ok(sqlx::query("DELETE FROM notification WHERE id = ?")
                .bind(id)
                .execute(&self.pool)
                .await?)
        })
        .await?;

        if result.rows_affected() == 0 {
            return Err(Error::not_found(ENTITY, id));
        }
        Ok(())
    }

    async fn counts_for_student(&self, student_id: &str) -> Result<NotificationCountsRow> {
        let row = sqlx::query_as::<_, NotificationCountsRow>(
            r#"
            SELECT
                COUNT(*) AS total,
                COALESCE(SUM(CASE WHEN is_read = 1 OR is_responded = 1 THEN 1 ELSE 0 END), 0) AS read,
                COALESCE(SUM(CASE WHEN is_responded = 1 THEN 1 ELSE 0 END), 0) AS responded
            FROM notification
            WHERE student_id = ?
            "#,
        )
        .bind(student_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::{init_pool, run_migrations};
    use crate::domain::NewNotification;

    async fn setup() -> SqlxNotificationRepository {
        let pool = init_pool("sqlite::memory:").await.unwrap();
        run_migrations(&pool).await.unwrap();
        SqlxNotificationRepository::new(pool)
    }

    fn record(student: &str, group: &str, created_at: i64) -> NotificationDbModel {
        let input = NewNotification::new(
            Some(group.to_string()),
            Some(student.to_string()),
            Some("T1".to_string()),
            Some("hi".to_string()),
        )
        .unwrap();
        let mut row = NotificationDbModel::new(input);
        row.created_at = created_at;
        row
    }

    #[tokio::test]
    async fn test_insert_then_get() {
        let repo = setup().await;
        let row = record("S1", "G1", 1_000);
        repo.insert(&row).await.unwrap();

        let fetched = repo.get(&row.id).await.unwrap();
        assert_eq!(fetched.message, "hi");
        assert!(!fetched.is_read);
        assert!(!fetched.is_responded);
        assert_eq!(fetched.created_at, 1_000);
    }

    #[tokio::test]
    async fn test_get_missing_is_not_found() {
        let repo = setup().await;
        let err = repo.get("missing").await.unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_mark_read_is_idempotent() {
        let repo = setup().await;
        let row = record("S1", "G1", 1_000);
        repo.insert(&row).await.unwrap();

        let first = repo.mark_read(&row.id).await.unwrap();
        assert!(first.changed());
        assert_eq!(first.previous, NotificationState::Created);
        assert!(first.record.is_read);

        let second = repo.mark_read(&row.id).await.unwrap();
        assert!(!second.changed());
        assert_eq!(second.record.state(), NotificationState::Read);
    }

    #[tokio::test]
    async fn test_mark_responded_sets_read() {
        let repo = setup().await;
        let row = record("S1", "G1", 1_000);
        repo.insert(&row).await.unwrap();

        let update = repo.mark_responded(&row.id).await.unwrap();
        assert!(update.record.is_read);
        assert!(update.record.is_responded);

        // Marking read afterwards never reverts anything.
        let after = repo.mark_read(&row.id).await.unwrap();
        assert!(!after.changed());
        assert_eq!(after.record.state(), NotificationState::Responded);

        let again = repo.mark_responded(&row.id).await.unwrap();
        assert!(!again.changed());
    }

    #[tokio::test]
    async fn test_mark_missing_is_not_found() {
        let repo = setup().await;
        assert!(matches!(
            repo.mark_read("nope").await,
            Err(Error::NotFound { .. })
        ));
        assert!(matches!(
            repo.mark_responded("nope").await,
            Err(Error::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_list_by_student_orders_newest_first() {
        let repo = setup().await;
        let t1 = record("S1", "G1", 1_000);
        let t2 = record("S1", "G1", 2_000);
        let t3 = record("S1", "G1", 3_000);
        for row in [&t2, &t1, &t3] {
            repo.insert(row).await.unwrap();
        }
        repo.insert(&record("S2", "G1", 4_000)).await.unwrap();

        let list = repo.list_by_student("S1", false, 10).await.unwrap();
        let ids: Vec<&str> = list.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec![t3.id.as_str(), t2.id.as_str(), t1.id.as_str()]);
    }

    #[tokio::test]
    async fn test_same_timestamp_ties_break_by_insertion() {
        let repo = setup().await;
        let a = record("S1", "G1", 5_000);
        let b = record("S1", "G1", 5_000);
        repo.insert(&a).await.unwrap();
        repo.insert(&b).await.unwrap();

        let list = repo.list_by_student("S1", false, 10).await.unwrap();
        assert_eq!(list[0].id, b.id);
        assert_eq!(list[1].id, a.id);
    }

    #[tokio::test]
    async fn test_list_unread_only_and_limit() {
        let repo = setup().await;
        let rows: Vec<_> = (0..4).map(|i| record("S1", "G1", 1_000 + i)).collect();
        for row in &rows {
            repo.insert(row).await.unwrap();
        }
        repo.mark_read(&rows[3].id).await.unwrap();

        let unread = repo.list_by_student("S1", true, 10).await.unwrap();
        assert_eq!(unread.len(), 3);
        assert!(unread.iter().all(|n| !n.is_read));

        let limited = repo.list_by_student("S1", false, 2).await.unwrap();
        assert_eq!(limited.len(), 2);

        assert!(repo.list_by_student("nobody", false, 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_list_by_group() {
        let repo = setup().await;
        repo.insert(&record("S1", "G1", 1_000)).await.unwrap();
        repo.insert(&record("S2", "G1", 2_000)).await.unwrap();
        repo.insert(&record("S3", "G2", 3_000)).await.unwrap();

        let list = repo.list_by_group("G1", 10).await.unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].student_id, "S2");
    }

    #[tokio::test]
    async fn test_delete() {
        let repo = setup().await;
        let row = record("S1", "G1", 1_000);
        repo.insert(&row).await.unwrap();

        repo.delete(&row.id).await.unwrap();
        assert!(matches!(repo.get(&row.id).await, Err(Error::NotFound { .. })));
        assert!(matches!(
            repo.delete(&row.id).await,
            Err(Error::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_counts_for_student() {
        let repo = setup().await;
        let rows: Vec<_> = (0..3).map(|i| record("S1", "G1", 1_000 + i)).collect();
        for row in &rows {
            repo.insert(row).await.unwrap();
        }
        repo.mark_read(&rows[0].id).await.unwrap();
        repo.mark_responded(&rows[1].id).await.unwrap();

        let counts = repo.counts_for_student("S1").await.unwrap();
        assert_eq!(counts.total, 3);
        assert_eq!(counts.read, 2);
        assert_eq!(counts.responded, 1);

        let empty = repo.counts_for_student("S9").await.unwrap();
        assert_eq!(empty.total, 0);
        assert_eq!(empty.read, 0);
    }
}
