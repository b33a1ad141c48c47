//! In-process room hub.
//!
//! One bounded broadcast channel per room, created on first subscribe and
//! pruned when the last subscriber leaves. Emitting to a room without
//! subscribers drops the event.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, warn};

use super::events::{DeliveryEvent, Room};
use crate::Result;

/// Default per-room buffer before slow subscribers start losing events.
pub const DEFAULT_ROOM_CAPACITY: usize = 64;

/// Server-side emission seam used by the broadcaster.
pub trait DeliveryTransport: Send + Sync {
    /// Emit an event to a room.
    ///
    /// Returns the number of subscribers the event was handed to. Zero means
    /// the event was dropped.
    fn emit(&self, room: &Room, event: Arc<DeliveryEvent>) -> Result<usize>;
}

/// A live subscription to one room.
///
/// Dropping it (or calling [`PushSubscription::unsubscribe`]) removes the
/// listener.
pub struct PushSubscription {
    room: Room,
    rx: mpsc::Receiver<Arc<DeliveryEvent>>,
    _guard: DropGuard,
}

impl PushSubscription {
    /// Build a subscription fed by `rx`; `cancel` is fired when it is dropped.
    pub fn new(room: Room, rx: mpsc::Receiver<Arc<DeliveryEvent>>, cancel: CancellationToken) -> Self {
        Self {
            room,
            rx,
            _guard: cancel.drop_guard(),
        }
    }

    pub fn room(&self) -> &Room {
        &self.room
    }

    /// Next event, or `None` once the transport is gone.
    pub async fn recv(&mut self) -> Option<Arc<DeliveryEvent>> {
        self.rx.recv().await
    }

    pub fn unsubscribe(self) {
        debug!(room = %self.room, "Push subscription closed");
    }
}

/// In-process fan-out hub keyed by room.
#[derive(Clone)]
pub struct RoomHub {
    rooms: Arc<DashMap<Room, broadcast::Sender<Arc<DeliveryEvent>>>>,
    capacity: usize,
}

impl RoomHub {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_ROOM_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            rooms: Arc::new(DashMap::new()),
            capacity: capacity.max(1),
        }
    }

    /// Subscribe to a room. Must be called from within a tokio runtime.
    ///
    /// Events emitted after this returns are captured by the subscription.
    pub fn subscribe(&self, room: Room) -> PushSubscription {
        let mut broadcast_rx = self
            .rooms
            .entry(room.clone())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .subscribe();

        let (tx, rx) = mpsc::channel(self.capacity);
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let rooms = Arc::clone(&self.rooms);
        let task_room = room.clone();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    result = broadcast_rx.recv() => {
                        match result {
                            Ok(event) => {
                                if tx.send(event).await.is_err() {
                                    break;
                                }
                            }
                            Err(broadcast::error::RecvError::Lagged(n)) => {
                                warn!(room = %task_room, "Push subscriber lagged, {} events lost", n);
                            }
                            Err(broadcast::error::RecvError::Closed) => break,
                        }
                    }
                }
            }
            drop(broadcast_rx);
            rooms.remove_if(&task_room, |_, sender| sender.receiver_count() == 0);
        });

        debug!(room = %room, "Push subscription opened");
        PushSubscription::new(room, rx, cancel)
    }

    /// Number of live subscribers in a room.
    pub fn subscriber_count(&self, room: &Room) -> usize {
        self.rooms
            .get(room)
            .map(|sender| sender.receiver_count())
            .unwrap_or(0)
    }

    /// Number of rooms with at least one channel allocated.
    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }
}

impl Default for RoomHub {
    fn default() -> Self {
        Self::new()
    }
}

impl DeliveryTransport for RoomHub {
    fn emit(&self, room: &Room, event: Arc<DeliveryEvent>) -> Result<usize> {
        let Some(sender) = self.rooms.get(room).map(|entry| entry.value().clone()) else {
            return Ok(0);
        };
        // send() only fails when there are no receivers
        Ok(sender.send(event).unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Notification;
    use chrono::Utc;
    use std::time::Duration;

    fn event(student: &str) -> Arc<DeliveryEvent> {
        Arc::new(DeliveryEvent::new_notification(&Notification {
            id: uuid::Uuid::new_v4().to_string(),
            group_id: "G1".into(),
            student_id: student.into(),
            tutor_id: "T1".into(),
            created_at: Utc::now(),
            read: false,
            responded: false,
            message: "hi".into(),
        }))
    }

    #[tokio::test]
    async fn test_emit_without_subscribers_drops() {
        let hub = RoomHub::new();
        let delivered = hub.emit(&Room::student("S1"), event("S1")).unwrap();
        assert_eq!(delivered, 0);
        assert_eq!(hub.room_count(), 0);
    }

    #[tokio::test]
    async fn test_subscriber_receives_once() {
        let hub = RoomHub::new();
        let mut sub = hub.subscribe(Room::student("S1"));

        let e = event("S1");
        assert_eq!(hub.emit(&Room::student("S1"), e.clone()).unwrap(), 1);

        let received = tokio::time::timeout(Duration::from_secs(1), sub.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(received, e);

        // Nothing else queued for this subscriber.
        assert!(
            tokio::time::timeout(Duration::from_millis(50), sub.recv())
                .await
                .is_err()
        );
    }

    #[tokio::test]
    async fn test_rooms_are_isolated() {
        let hub = RoomHub::new();
        let mut s1 = hub.subscribe(Room::student("S1"));
        let _s2 = hub.subscribe(Room::student("S2"));

        assert_eq!(hub.emit(&Room::student("S2"), event("S2")).unwrap(), 1);
        assert!(
            tokio::time::timeout(Duration::from_millis(50), s1.recv())
                .await
                .is_err()
        );
    }

    #[tokio::test]
    async fn test_unsubscribe_prunes_room() {
        let hub = RoomHub::new();
        let room = Room::group("G1");
        let sub = hub.subscribe(room.clone());
        assert_eq!(hub.subscriber_count(&room), 1);

        sub.unsubscribe();

        for _ in 0..50 {
            if hub.room_count() == 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(hub.subscriber_count(&room), 0);
        assert_eq!(hub.room_count(), 0);
        assert_eq!(hub.emit(&room, event("S1")).unwrap(), 0);
    }
}
