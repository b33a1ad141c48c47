//! Best-effort real-time fan-out of new notifications.
//!
//! Every new notification is emitted once to `student-{studentId}` and once
//! to `group-{groupId}`. Delivery is at-most-once per subscriber and not
//! guaranteed: rooms without subscribers drop the event and transport
//! failures are logged and swallowed. Clients rely on the reconciliation
//! loop to converge.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;
use tracing::{debug, warn};

use super::events::{DeliveryEvent, Room};
use super::hub::DeliveryTransport;
use crate::domain::Notification;

/// Result of a single fan-out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FanOutReport {
    /// Subscribers the event was handed to, across both rooms.
    pub deliveries: usize,
    /// Rooms that had no subscribers.
    pub dropped_rooms: usize,
    /// Rooms whose emission failed.
    pub failed_rooms: usize,
}

/// Running totals, for diagnostics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, utoipa::ToSchema)]
pub struct DeliveryCounters {
    pub fan_outs: u64,
    pub deliveries: u64,
    pub dropped: u64,
    pub failures: u64,
}

#[derive(Default)]
struct AtomicCounters {
    fan_outs: AtomicU64,
    deliveries: AtomicU64,
    dropped: AtomicU64,
    failures: AtomicU64,
}

/// Fans new notifications out over an injected transport.
#[derive(Clone)]
pub struct DeliveryBroadcaster {
    transport: Arc<dyn DeliveryTransport>,
    counters: Arc<AtomicCounters>,
}

impl DeliveryBroadcaster {
    pub fn new(transport: Arc<dyn DeliveryTransport>) -> Self {
        Self {
            transport,
            counters: Arc::new(AtomicCounters::default()),
        }
    }

    /// Emit `new-notification` to the student and group rooms.
    ///
    /// Never fails and never blocks on subscribers.
    pub fn fan_out(&self, notification: &Notification) -> FanOutReport {
        let event = Arc::new(DeliveryEvent::new_notification(notification));
        let mut report = FanOutReport::default();

        for room in Room::for_notification(notification) {
            match self.transport.emit(&room, Arc::clone(&event)) {
                Ok(0) => {
                    debug!(
                        room = %room,
                        notification_id = %notification.id,
                        "No subscribers, push dropped"
                    );
                    report.dropped_rooms += 1;
                }
                Ok(n) => report.deliveries += n,
                Err(e) => {
                    warn!(
                        room = %room,
                        notification_id = %notification.id,
                        error = %e,
                        "Failed to emit {}", event.name()
                    );
                    report.failed_rooms += 1;
                }
            }
        }

        self.counters.fan_outs.fetch_add(1, Ordering::Relaxed);
        self.counters
            .deliveries
            .fetch_add(report.deliveries as u64, Ordering::Relaxed);
        self.counters
            .dropped
            .fetch_add(report.dropped_rooms as u64, Ordering::Relaxed);
        self.counters
            .failures
            .fetch_add(report.failed_rooms as u64, Ordering::Relaxed);

        report
    }

    pub fn counters(&self) -> DeliveryCounters {
        DeliveryCounters {
            fan_outs: self.counters.fan_outs.load(Ordering::Relaxed),
            deliveries: self.counters.deliveries.load(Ordering::Relaxed),
            dropped: self.counters.dropped.load(Ordering::Relaxed),
            failures: self.counters.failures.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use crate::notification::hub::RoomHub;
    use chrono::Utc;
    use std::time::Duration;

    struct FailingTransport;

    impl DeliveryTransport for FailingTransport {
        fn emit(&self, _room: &Room, _event: Arc<DeliveryEvent>) -> crate::Result<usize> {
            Err(Error::transport("socket closed"))
        }
    }

    fn sample() -> Notification {
        Notification {
            id: "n1".into(),
            group_id: "G1".into(),
            student_id: "S1".into(),
            tutor_id: "T1".into(),
            created_at: Utc::now(),
            read: false,
            responded: false,
            message: "hi".into(),
        }
    }

    #[tokio::test]
    async fn test_fan_out_reaches_both_rooms() {
        let hub = RoomHub::new();
        let mut student = hub.subscribe(Room::student("S1"));
        let mut group = hub.subscribe(Room::group("G1"));
        let broadcaster = DeliveryBroadcaster::new(Arc::new(hub));

        let report = broadcaster.fan_out(&sample());
        assert_eq!(report.deliveries, 2);
        assert_eq!(report.dropped_rooms, 0);

        for sub in [&mut student, &mut group] {
            let event = tokio::time::timeout(Duration::from_secs(1), sub.recv())
                .await
                .unwrap()
                .unwrap();
            assert_eq!(event.notification().id, "n1");
        }
    }

    #[tokio::test]
    async fn test_fan_out_without_subscribers_is_dropped() {
        let broadcaster = DeliveryBroadcaster::new(Arc::new(RoomHub::new()));
        let report = broadcaster.fan_out(&sample());

        assert_eq!(report.deliveries, 0);
        assert_eq!(report.dropped_rooms, 2);
        assert_eq!(broadcaster.counters().dropped, 2);
    }

    #[test]
    fn test_transport_errors_are_swallowed() {
        let broadcaster = DeliveryBroadcaster::new(Arc::new(FailingTransport));
        let report = broadcaster.fan_out(&sample());

        assert_eq!(report.failed_rooms, 2);
        let counters = broadcaster.counters();
        assert_eq!(counters.fan_outs, 1);
        assert_eq!(counters.failures, 2);
    }
}
