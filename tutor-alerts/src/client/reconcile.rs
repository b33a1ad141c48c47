//! Periodic reconciliation loop.
//!
//! Re-fetches the authoritative list on a fixed interval and replaces the
//! local view wholesale. It runs regardless of push delivery, so a client
//! that missed a push still converges within one interval. Failed polls are
//! logged and leave the view untouched; the next tick retries.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::feed::NotificationFeed;
use super::view::LocalView;
use crate::{Error, Result};

/// Default polling interval; also the staleness bound when push is lost.
pub const DEFAULT_RECONCILE_INTERVAL: Duration = Duration::from_secs(60);

/// Reconciliation settings.
#[derive(Debug, Clone)]
pub struct ReconcileConfig {
    pub interval: Duration,
    /// Fetch only unread notifications (the alert view) instead of the full history.
    pub unread_only: bool,
    pub limit: Option<u32>,
}

impl ReconcileConfig {
    /// Default settings with a custom interval.
    pub fn with_interval(interval: Duration) -> Result<Self> {
        let config = Self {
            interval,
            ..Default::default()
        };
        config.validate()?;
        Ok(config)
    }

    /// A zero interval would make the ticker panic inside the task.
    pub fn validate(&self) -> Result<()> {
        if self.interval.is_zero() {
            return Err(Error::config("reconcile interval must be greater than zero"));
        }
        Ok(())
    }
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_RECONCILE_INTERVAL,
            unread_only: true,
            limit: None,
        }
    }
}

/// Poll outcome counters.
#[derive(Debug, Default)]
pub struct PollCounters {
    succeeded: AtomicU64,
    failed: AtomicU64,
}

impl PollCounters {
    pub fn succeeded(&self) -> u64 {
        self.succeeded.load(Ordering::Relaxed)
    }

    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }
}

/// Cloneable handle that requests an out-of-cycle refresh.
#[derive(Clone)]
pub struct RefreshTrigger {
    notify: Arc<Notify>,
}

impl RefreshTrigger {
    pub fn fire(&self) {
        self.notify.notify_one();
    }
}

/// A running reconciliation task for one student.
///
/// Dropping the handle cancels the task.
pub struct ReconciliationLoop {
    student_id: String,
    cancel: CancellationToken,
    refresh: RefreshTrigger,
    counters: Arc<PollCounters>,
    handle: Option<JoinHandle<()>>,
}

impl ReconciliationLoop {
    /// Start polling. The first fetch happens immediately.
    pub fn spawn(
        feed: Arc<dyn NotificationFeed>,
        student_id: impl Into<String>,
        view: LocalView,
        config: ReconcileConfig,
    ) -> Result<Self> {
        config.validate()?;
        let student_id = student_id.into();
        let cancel = CancellationToken::new();
        let refresh = RefreshTrigger {
            notify: Arc::new(Notify::new()),
        };
        let counters = Arc::new(PollCounters::default());

        let handle = tokio::spawn(run(
            feed,
            student_id.clone(),
            view,
            config,
            cancel.clone(),
            Arc::clone(&refresh.notify),
            Arc::clone(&counters),
        ));

        Ok(Self {
            student_id,
            cancel,
            refresh,
            counters,
            handle: Some(handle),
        })
    }

    pub fn student_id(&self) -> &str {
        &self.student_id
    }

    /// Fetch now instead of waiting for the next tick.
    pub fn refresh_now(&self) {
        self.refresh.fire();
    }

    pub fn refresh_trigger(&self) -> RefreshTrigger {
        self.refresh.clone()
    }

    pub fn counters(&self) -> Arc<PollCounters> {
        Arc::clone(&self.counters)
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Cancel and wait for the task to exit.
    pub async fn stop(mut self) {
        self.cancel.cancel();
        if let Some(handle) = self.handle.take()
            && let Err(e) = handle.await
        {
            warn!(student_id = %self.student_id, "Reconciliation task ended abnormally: {}", e);
        }
    }
}

impl Drop for ReconciliationLoop {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn run(
    feed: Arc<dyn NotificationFeed>,
    student_id: String,
    view: LocalView,
    config: ReconcileConfig,
    cancel: CancellationToken,
    refresh: Arc<Notify>,
    counters: Arc<PollCounters>,
) {
    let mut ticker = tokio::time::interval(config.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    debug!(
        student_id = %student_id,
        interval_secs = config.interval.as_secs_f64(),
        "Reconciliation loop started"
    );

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
            _ = refresh.notified() => {}
        }

        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            result = feed.fetch_snapshot(&student_id, config.unread_only, config.limit) => result,
        };

        match result {
            Ok(snapshot) => {
                counters.succeeded.fetch_add(1, Ordering::Relaxed);
                debug!(student_id = %student_id, count = snapshot.len(), "Snapshot applied");
                view.replace(snapshot);
            }
            Err(e) => {
                counters.failed.fetch_add(1, Ordering::Relaxed);
                warn!(student_id = %student_id, error = %e, "Poll failed, keeping local state");
            }
        }
    }

    debug!(student_id = %student_id, "Reconciliation loop stopped");
}
