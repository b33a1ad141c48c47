//! Per-student client session.
//!
//! Owns exactly one reconciliation loop and one push subscription for the
//! active student. Push events only nudge the loop to fetch a fresh
//! snapshot; nothing is merged from the event itself.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, info, warn};

use super::feed::NotificationFeed;
use super::push::PushTransport;
use super::reconcile::{ReconcileConfig, ReconciliationLoop, RefreshTrigger};
use super::view::LocalView;
use crate::Result;
use crate::notification::{PushSubscription, Room};

struct ActiveSession {
    student_id: String,
    reconcile: ReconciliationLoop,
    listener: JoinHandle<()>,
    _guard: DropGuard,
}

const PUSH_RECONNECT_MIN: Duration = Duration::from_secs(1);
const PUSH_RECONNECT_MAX: Duration = Duration::from_secs(30);

/// Client session bound to one student identity at a time.
///
/// Dropping it cancels the push listener and the reconciliation loop.
pub struct StudentSession {
    feed: Arc<dyn NotificationFeed>,
    push: Arc<dyn PushTransport>,
    config: ReconcileConfig,
    view: LocalView,
    active: Mutex<Option<ActiveSession>>,
}

impl StudentSession {
    pub fn new(
        feed: Arc<dyn NotificationFeed>,
        push: Arc<dyn PushTransport>,
        config: ReconcileConfig,
    ) -> Self {
        Self {
            feed,
            push,
            config,
            view: LocalView::new(),
            active: Mutex::new(None),
        }
    }

    /// Shared local view. Stays the same instance across restarts.
    pub fn view(&self) -> LocalView {
        self.view.clone()
    }

    pub fn student_id(&self) -> Option<String> {
        self.active.lock().as_ref().map(|s| s.student_id.clone())
    }

    pub fn is_active(&self) -> bool {
        self.active.lock().is_some()
    }

    /// Begin a session for `student_id`, ending any previous one first.
    ///
    /// A push connection failure is not fatal: the loop alone still bounds
    /// staleness to one interval while the listener keeps reconnecting.
    pub async fn start(&self, student_id: impl Into<String>) -> Result<()> {
        let student_id = student_id.into();
        self.config.validate()?;
        self.end().await;

        let reconcile = ReconciliationLoop::spawn(
            Arc::clone(&self.feed),
            student_id.clone(),
            self.view.clone(),
            self.config.clone(),
        )?;

        let room = Room::student(student_id.clone());
        let subscription = match self.push.connect(room.clone()).await {
            Ok(subscription) => Some(subscription),
            Err(e) => {
                warn!(
                    student_id = %student_id,
                    error = %e,
                    "Push unavailable, relying on polling"
                );
                None
            }
        };

        let cancel = CancellationToken::new();
        let listener = tokio::spawn(listen(
            Arc::clone(&self.push),
            room,
            subscription,
            reconcile.refresh_trigger(),
            cancel.clone(),
        ));

        let session = ActiveSession {
            student_id: student_id.clone(),
            reconcile,
            listener,
            _guard: cancel.drop_guard(),
        };

        // A concurrent start may have raced us; keep the newest.
        let previous = self.active.lock().replace(session);
        if let Some(previous) = previous {
            shutdown(previous).await;
        }

        info!(student_id = %student_id, "Student session started");
        Ok(())
    }

    /// Unsubscribe, stop the loop and clear the local view.
    pub async fn end(&self) {
        let previous = self.active.lock().take();
        if let Some(previous) = previous {
            let student_id = previous.student_id.clone();
            shutdown(previous).await;
            self.view.clear();
            info!(student_id = %student_id, "Student session ended");
        }
    }

    /// Fetch now instead of waiting for the next tick.
    pub fn refresh_now(&self) {
        if let Some(active) = self.active.lock().as_ref() {
            active.reconcile.refresh_now();
        }
    }
}

async fn shutdown(session: ActiveSession) {
    let ActiveSession {
        reconcile,
        listener,
        _guard: guard,
        ..
    } = session;

    drop(guard);
    if let Err(e) = listener.await {
        warn!("Push listener ended abnormally: {}", e);
    }
    reconcile.stop().await;
}

/// Forward push events to the loop as refresh requests.
///
/// A dropped subscription is re-established with exponential backoff. Each
/// successful reconnect triggers a refresh, since events may have been missed
/// while disconnected.
async fn listen(
    push: Arc<dyn PushTransport>,
    room: Room,
    mut subscription: Option<PushSubscription>,
    refresh: RefreshTrigger,
    cancel: CancellationToken,
) {
    let mut backoff = PUSH_RECONNECT_MIN;

    loop {
        let Some(active) = subscription.as_mut() else {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(backoff) => {}
            }
            match push.connect(room.clone()).await {
                Ok(reconnected) => {
                    info!(room = %room, "Push reconnected");
                    subscription = Some(reconnected);
                    backoff = PUSH_RECONNECT_MIN;
                    refresh.fire();
                }
                Err(e) => {
                    backoff = (backoff * 2).min(PUSH_RECONNECT_MAX);
                    debug!(
                        room = %room,
                        error = %e,
                        retry_in_secs = backoff.as_secs(),
                        "Push reconnect failed"
                    );
                }
            }
            continue;
        };

        let event = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            event = active.recv() => event,
        };

        match event {
            Some(event) => {
                debug!(
                    room = %room,
                    notification_id = %event.notification().id,
                    "Push received, refreshing"
                );
                refresh.fire();
            }
            None => {
                warn!(room = %room, "Push channel closed, reconnecting");
                if let Some(closed) = subscription.take() {
                    closed.unsubscribe();
                }
            }
        }
    }

    if let Some(subscription) = subscription {
        subscription.unsubscribe();
    }
}
