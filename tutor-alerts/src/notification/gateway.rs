//! Notification gateway.
//!
//! The request/response boundary in front of the store: validates
//! producers against identity lookup, persists, fans out new notifications
//! after persistence, applies acknowledgement transitions and bounds list
//! sizes. Every acknowledgement is idempotent; `create` is not (a retried
//! create inserts a second record).

use std::sync::Arc;

use tracing::{debug, info};

use super::broadcaster::{DeliveryBroadcaster, DeliveryCounters};
use super::stats::StatsAggregator;
use crate::database::models::{NotificationDbModel, StateUpdate};
use crate::database::repositories::{IdentityRepository, NotificationRepository};
use crate::domain::{NewNotification, Notification, NotificationStats, Role};
use crate::{Error, Result};

/// Default page size for list operations.
pub const DEFAULT_LIST_LIMIT: u32 = 50;

/// Hard upper bound for list operations.
pub const MAX_LIST_LIMIT: u32 = 100;

/// Bounds applied to caller-supplied list limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListLimits {
    pub default_limit: u32,
    pub max_limit: u32,
}

impl ListLimits {
    pub fn new(default_limit: u32, max_limit: u32) -> Result<Self> {
        if default_limit == 0 || max_limit == 0 {
            return Err(Error::config("list limits must be greater than zero"));
        }
        if default_limit > max_limit {
            return Err(Error::config(format!(
                "default list limit {} exceeds maximum {}",
                default_limit, max_limit
            )));
        }
        Ok(Self {
            default_limit,
            max_limit,
        })
    }

    /// Resolve a requested limit: absent or zero means the default, anything
    /// above the maximum is capped.
    pub fn resolve(&self, requested: Option<u32>) -> u32 {
        match requested {
            None | Some(0) => self.default_limit,
            Some(n) => n.min(self.max_limit),
        }
    }
}

impl Default for ListLimits {
    fn default() -> Self {
        Self {
            default_limit: DEFAULT_LIST_LIMIT,
            max_limit: MAX_LIST_LIMIT,
        }
    }
}

/// Boundary for all notification operations.
#[derive(Clone)]
pub struct NotificationGateway {
    store: Arc<dyn NotificationRepository>,
    identities: Arc<dyn IdentityRepository>,
    broadcaster: DeliveryBroadcaster,
    stats: StatsAggregator,
    limits: ListLimits,
}

impl NotificationGateway {
    pub fn new(
        store: Arc<dyn NotificationRepository>,
        identities: Arc<dyn IdentityRepository>,
        broadcaster: DeliveryBroadcaster,
    ) -> Self {
        Self {
            stats: StatsAggregator::new(Arc::clone(&store)),
            store,
            identities,
            broadcaster,
            limits: ListLimits::default(),
        }
    }

    pub fn with_limits(mut self, limits: ListLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn limits(&self) -> ListLimits {
        self.limits
    }

    /// Create a notification from a trusted producer.
    ///
    /// Fails with `NotFound` if the student or tutor does not exist and
    /// `InvalidRole` if either resolves to the wrong role. The push fan-out
    /// happens only after the record is durably stored.
    pub async fn create(&self, input: NewNotification) -> Result<Notification> {
        self.require_role(&input.student_id, Role::Student).await?;
        self.require_role(&input.tutor_id, Role::Tutor).await?;

        let row = NotificationDbModel::new(input);
        self.store.insert(&row).await?;

        let notification = Notification::from(row);
        info!(
            notification_id = %notification.id,
            student_id = %notification.student_id,
            group_id = %notification.group_id,
            tutor_id = %notification.tutor_id,
            "Notification created"
        );

        let report = self.broadcaster.fan_out(&notification);
        debug!(
            notification_id = %notification.id,
            deliveries = report.deliveries,
            dropped_rooms = report.dropped_rooms,
            "Notification fanned out"
        );

        Ok(notification)
    }

    pub async fn get(&self, id: &str) -> Result<Notification> {
        Ok(self.store.get(id).await?.into())
    }

    /// Newest-first notifications for a student.
    pub async fn list_by_student(
        &self,
        student_id: &str,
        unread_only: bool,
        limit: Option<u32>,
    ) -> Result<Vec<Notification>> {
        let limit = self.limits.resolve(limit);
        let rows = self
            .store
            .list_by_student(student_id, unread_only, i64::from(limit))
            .await?;
        Ok(rows.into_iter().map(Notification::from).collect())
    }

    /// Newest-first notifications for a group.
    pub async fn list_by_group(&self, group_id: &str, limit: Option<u32>) -> Result<Vec<Notification>> {
        let limit = self.limits.resolve(limit);
        let rows = self.store.list_by_group(group_id, i64::from(limit)).await?;
        Ok(rows.into_iter().map(Notification::from).collect())
    }

    pub async fn mark_read(&self, id: &str) -> Result<Notification> {
        let update = self.store.mark_read(id).await?;
        Ok(Self::log_transition("mark_read", update))
    }

    /// Mark responded; also marks read.
    pub async fn mark_responded(&self, id: &str) -> Result<Notification> {
        let update = self.store.mark_responded(id).await?;
        Ok(Self::log_transition("mark_responded", update))
    }

    pub async fn stats(&self, student_id: &str) -> Result<NotificationStats> {
        self.stats.stats(student_id).await
    }

    /// Administrative, unconditional delete.
    pub async fn delete(&self, id: &str) -> Result<()> {
        self.store.delete(id).await?;
        info!(notification_id = %id, "Notification deleted");
        Ok(())
    }

    pub fn delivery_counters(&self) -> DeliveryCounters {
        self.broadcaster.counters()
    }

    async fn require_role(&self, id: &str, expected: Role) -> Result<()> {
        let identity = self
            .identities
            .find_by_id(id)
            .await?
            .ok_or_else(|| Error::not_found(expected.to_string(), id))?;

        if identity.role != expected {
            return Err(Error::invalid_role(id, expected, identity.role));
        }
        Ok(())
    }

    fn log_transition(action: &'static str, update: StateUpdate) -> Notification {
        if update.changed() {
            info!(
                notification_id = %update.record.id,
                from = %update.previous,
                to = %update.record.state(),
                "{}", action
            );
        } else {
            debug!(
                notification_id = %update.record.id,
                state = %update.previous,
                "{} was a no-op", action
            );
        }
        update.record.into()
    }
}
