//! Bounded retry for notification writes that lose the SQLite writer lock.
//!
//! Only inserts, acknowledgements and deletes go through here; reads never
//! contend for the writer lock in WAL mode. The total wait stays inside
//! [`WRITE_RETRY_BUDGET`] so a caller's request does not time out first.

use std::future::Future;
use std::time::Duration;

use tokio::time::{Instant, sleep};
use tracing::{debug, warn};

use crate::domain::Acknowledgement;
use crate::{Error, Result};

/// Longest a single write may spend waiting for the writer lock.
pub const WRITE_RETRY_BUDGET: Duration = Duration::from_secs(5);

const FIRST_BACKOFF: Duration = Duration::from_millis(20);
const MAX_BACKOFF: Duration = Duration::from_millis(500);

/// Store writes that take the SQLite writer lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum NotificationWrite {
    Insert,
    MarkRead,
    MarkResponded,
    Delete,
}

impl From<Acknowledgement> for NotificationWrite {
    fn from(action: Acknowledgement) -> Self {
        match action {
            Acknowledgement::MarkRead => Self::MarkRead,
            Acknowledgement::MarkResponded => Self::MarkResponded,
        }
    }
}

/// SQLITE_BUSY (5) or SQLITE_LOCKED (6), including their extended codes.
pub fn lost_writer_lock(err: &Error) -> bool {
    let Error::DatabaseSqlx(sqlx::Error::Database(db_err)) = err else {
        return false;
    };
    db_err
        .code()
        .and_then(|code| code.parse::<i32>().ok())
        .is_some_and(|code| matches!(code & 0xff, 5 | 6))
}

/// Backoff before retry number `attempt` (0-based), with up to 25% jitter.
fn backoff(attempt: u32) -> Duration {
    let base = FIRST_BACKOFF
        .saturating_mul(1u32 << attempt.min(16))
        .min(MAX_BACKOFF);
    base.mul_f64(1.0 + rand::random::<f64>() * 0.25)
}

/// Run `op` with [`WRITE_RETRY_BUDGET`].
pub async fn with_write_retry<T, F, Fut>(
    write: NotificationWrite,
    notification_id: &str,
    op: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    with_write_retry_budget(write, notification_id, WRITE_RETRY_BUDGET, op).await
}

/// Run `op`, retrying while the writer lock is held elsewhere and the next
/// backoff still fits in `budget`. Any other error returns immediately.
pub async fn with_write_retry_budget<T, F, Fut>(
    write: NotificationWrite,
    notification_id: &str,
    budget: Duration,
    mut op: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let deadline = Instant::now() + budget;
    let mut attempt = 0u32;

    loop {
        let err = match op().await {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };
        if !lost_writer_lock(&err) {
            return Err(err);
        }

        let delay = backoff(attempt);
        if Instant::now() + delay > deadline {
            warn!(
                notification_id = %notification_id,
                write = %write,
                attempts = attempt + 1,
                "Writer lock still held, giving up"
            );
            return Err(err);
        }

        debug!(
            notification_id = %notification_id,
            write = %write,
            attempt = attempt + 1,
            delay_ms = delay.as_millis() as u64,
            "Writer lock busy, retrying"
        );
        sleep(delay).await;
        attempt += 1;
    }
}
