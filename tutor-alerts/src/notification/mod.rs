//! Tutor-call notification delivery.
//!
//! - [`gateway::NotificationGateway`]: validated create, acknowledgements,
//!   bounded lists, stats and delete over the store
//! - [`broadcaster::DeliveryBroadcaster`]: best-effort push to the student
//!   and group rooms after a notification is persisted
//! - [`hub::RoomHub`]: in-process room transport
//! - [`stats::StatsAggregator`]: per-student counters computed on demand

pub mod broadcaster;
pub mod events;
pub mod gateway;
pub mod hub;
pub mod stats;

pub use broadcaster::{DeliveryBroadcaster, DeliveryCounters, FanOutReport};
pub use events::{DeliveryEvent, NEW_NOTIFICATION_EVENT, NewNotificationPayload, Room};
pub use gateway::{ListLimits, NotificationGateway};
pub use hub::{DEFAULT_ROOM_CAPACITY, DeliveryTransport, PushSubscription, RoomHub};
pub use stats::StatsAggregator;
