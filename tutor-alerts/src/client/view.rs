//! Client-side local state.
//!
//! The only mutation is wholesale replacement with an authoritative
//! snapshot. Push events and poll responses are never merged as deltas.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::watch;

use crate::domain::Notification;

/// A point-in-time copy of the local view.
#[derive(Debug, Clone, Default)]
pub struct ViewState {
    /// Newest first, exactly as returned by the last snapshot.
    pub notifications: Vec<Notification>,
    /// Incremented on every replacement.
    pub revision: u64,
    pub refreshed_at: Option<DateTime<Utc>>,
}

impl ViewState {
    pub fn contains(&self, id: &str) -> bool {
        self.notifications.iter().any(|n| n.id == id)
    }

    pub fn unread_count(&self) -> usize {
        self.notifications.iter().filter(|n| !n.read).count()
    }
}

/// Observable local view shared between the session and UI consumers.
#[derive(Clone)]
pub struct LocalView {
    tx: Arc<watch::Sender<Arc<ViewState>>>,
}

impl LocalView {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(Arc::new(ViewState::default()));
        Self { tx: Arc::new(tx) }
    }

    /// Replace the whole view with `snapshot`.
    pub fn replace(&self, snapshot: Vec<Notification>) {
        self.tx.send_modify(|state| {
            let revision = state.revision + 1;
            *state = Arc::new(ViewState {
                notifications: snapshot,
                revision,
                refreshed_at: Some(Utc::now()),
            });
        });
    }

    /// Drop everything, e.g. when the identity is cleared.
    pub fn clear(&self) {
        self.tx.send_modify(|state| {
            let revision = state.revision + 1;
            *state = Arc::new(ViewState {
                revision,
                ..ViewState::default()
            });
        });
    }

    pub fn snapshot(&self) -> Arc<ViewState> {
        Arc::clone(&self.tx.borrow())
    }

    /// Observe replacements.
    pub fn subscribe(&self) -> watch::Receiver<Arc<ViewState>> {
        self.tx.subscribe()
    }
}

impl Default for LocalView {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn n(id: &str, read: bool) -> Notification {
        Notification {
            id: id.into(),
            group_id: "G1".into(),
            student_id: "S1".into(),
            tutor_id: "T1".into(),
            created_at: Utc::now(),
            read,
            responded: false,
            message: "hi".into(),
        }
    }

    #[test]
    fn test_replace_is_wholesale() {
        let view = LocalView::new();
        view.replace(vec![n("a", false), n("b", true)]);
        assert_eq!(view.snapshot().notifications.len(), 2);
        assert_eq!(view.snapshot().unread_count(), 1);

        view.replace(vec![n("c", false)]);
        let state = view.snapshot();
        assert!(!state.contains("a"));
        assert!(state.contains("c"));
        assert_eq!(state.revision, 2);
    }

    #[test]
    fn test_clear() {
        let view = LocalView::new();
        view.replace(vec![n("a", false)]);
        view.clear();
        let state = view.snapshot();
        assert!(state.notifications.is_empty());
        assert!(state.refreshed_at.is_none());
        assert_eq!(state.revision, 2);
    }

    #[tokio::test]
    async fn test_subscribers_see_replacements() {
        let view = LocalView::new();
        let mut rx = view.subscribe();
        view.replace(vec![n("a", false)]);
        rx.changed().await.unwrap();
        assert!(rx.borrow().contains("a"));
    }
}
