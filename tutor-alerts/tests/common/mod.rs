// Each test crate uses a different subset of these helpers.
#![allow(dead_code)]

use std::sync::Arc;

use tutor_alerts::database::repositories::{
    IdentityRepository, SqlxIdentityRepository, SqlxNotificationRepository,
};
use tutor_alerts::database::{DbPool, init_pool, run_migrations};
use tutor_alerts::domain::{Identity, NewNotification, Role};
use tutor_alerts::notification::{DeliveryBroadcaster, NotificationGateway, RoomHub};

pub struct TestApp {
    pub pool: DbPool,
    pub gateway: NotificationGateway,
    pub hub: RoomHub,
}

/// Gateway over a seeded database: students S1/S2, tutor T1, admin A1.
pub async fn setup(database_url: &str) -> TestApp {
    let pool = init_pool(database_url).await.unwrap();
    run_migrations(&pool).await.unwrap();

    let identities = Arc::new(SqlxIdentityRepository::new(pool.clone()));
    for identity in [
        Identity::new("S1", "Student One", Role::Student),
        Identity::new("S2", "Student Two", Role::Student),
        Identity::new("T1", "Tutor One", Role::Tutor),
        Identity::new("A1", "Admin", Role::Admin),
    ] {
        identities.upsert(&identity).await.unwrap();
    }

    let hub = RoomHub::new();
    let gateway = NotificationGateway::new(
        Arc::new(SqlxNotificationRepository::new(pool.clone())),
        identities,
        DeliveryBroadcaster::new(Arc::new(hub.clone())),
    );

    TestApp { pool, gateway, hub }
}

pub fn new_notification(student: &str, message: Option<&str>) -> NewNotification {
    NewNotification::new(
        Some("G1".into()),
        Some(student.into()),
        Some("T1".into()),
        message.map(str::to_string),
    )
    .unwrap()
}
