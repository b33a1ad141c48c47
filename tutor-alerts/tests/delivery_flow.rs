//! End-to-end delivery: gateway, room hub and student session in one process.

mod common;

use std::sync::Arc;
use std::time::{Duration, Instant};

use tutor_alerts::client::{LocalView, ReconcileConfig, StudentSession};
use tutor_alerts::domain::DEFAULT_MESSAGE;
use tutor_alerts::notification::Room;

use common::{new_notification, setup};

async fn wait_for(view: &LocalView, id: &str, timeout: Duration) -> bool {
    let mut rx = view.subscribe();
    let wait = async {
        while !rx.borrow_and_update().contains(id) {
            if rx.changed().await.is_err() {
                return false;
            }
        }
        true
    };
    tokio::time::timeout(timeout, wait).await.unwrap_or(false)
}

#[tokio::test]
async fn test_push_reaches_subscribed_session() {
    let app = setup("sqlite::memory:").await;
    // Long interval: only the push path can make this fast.
    let config = ReconcileConfig {
        interval: Duration::from_secs(3600),
        ..Default::default()
    };
    let session = StudentSession::new(
        Arc::new(app.gateway.clone()),
        Arc::new(app.hub.clone()),
        config,
    );
    session.start("S1").await.unwrap();
    assert_eq!(app.hub.subscriber_count(&Room::student("S1")), 1);

    // Let the immediate first poll finish before creating.
    let view = session.view();
    let mut rx = view.subscribe();
    tokio::time::timeout(Duration::from_secs(5), async {
        while rx.borrow_and_update().revision == 0 {
            rx.changed().await.unwrap();
        }
    })
    .await
    .unwrap();

    let created = app
        .gateway
        .create(new_notification("S1", None))
        .await
        .unwrap();
    assert_eq!(created.message, DEFAULT_MESSAGE);

    assert!(wait_for(&view, &created.id, Duration::from_secs(5)).await);
    assert_eq!(app.gateway.delivery_counters().deliveries, 1);

    session.end().await;
}

#[tokio::test]
async fn test_missed_push_is_backstopped_by_polling() {
    let app = setup("sqlite::memory:").await;
    let interval = Duration::from_millis(300);
    let config = ReconcileConfig {
        interval,
        ..Default::default()
    };

    // Reconciliation only; nobody is in the student room.
    let view = LocalView::new();
    let reconcile = tutor_alerts::client::ReconciliationLoop::spawn(
        Arc::new(app.gateway.clone()),
        "S1",
        view.clone(),
        config,
    )
    .unwrap();
    assert_eq!(app.hub.subscriber_count(&Room::student("S1")), 0);

    let created = app
        .gateway
        .create(new_notification("S1", Some("hi")))
        .await
        .unwrap();
    let started = Instant::now();
    assert_eq!(app.gateway.delivery_counters().dropped, 2);

    assert!(wait_for(&view, &created.id, interval * 10).await);
    // One interval plus scheduling slack.
    assert!(started.elapsed() < interval + Duration::from_secs(2));

    reconcile.stop().await;
}

#[tokio::test]
async fn test_acknowledged_notification_leaves_unread_view() {
    let app = setup("sqlite::memory:").await;
    let session = StudentSession::new(
        Arc::new(app.gateway.clone()),
        Arc::new(app.hub.clone()),
        ReconcileConfig {
            interval: Duration::from_millis(200),
            unread_only: true,
            limit: None,
        },
    );

    let created = app
        .gateway
        .create(new_notification("S1", None))
        .await
        .unwrap();
    session.start("S1").await.unwrap();
    let view = session.view();
    assert!(wait_for(&view, &created.id, Duration::from_secs(5)).await);

    app.gateway.mark_responded(&created.id).await.unwrap();
    session.refresh_now();

    let mut rx = view.subscribe();
    let gone = tokio::time::timeout(Duration::from_secs(5), async {
        while rx.borrow_and_update().contains(&created.id) {
            rx.changed().await.unwrap();
        }
    })
    .await;
    assert!(gone.is_ok());

    let stats = app.gateway.stats("S1").await.unwrap();
    assert_eq!(stats.total, 1);
    assert_eq!(stats.read, 1);
    assert_eq!(stats.responded, 1);
    assert_eq!(stats.unread, 0);

    session.end().await;
}

#[tokio::test]
async fn test_sessions_are_isolated_per_student() {
    let app = setup("sqlite::memory:").await;
    let config = ReconcileConfig {
        interval: Duration::from_millis(200),
        ..Default::default()
    };
    let s1 = StudentSession::new(
        Arc::new(app.gateway.clone()),
        Arc::new(app.hub.clone()),
        config.clone(),
    );
    let s2 = StudentSession::new(
        Arc::new(app.gateway.clone()),
        Arc::new(app.hub.clone()),
        config,
    );
    s1.start("S1").await.unwrap();
    s2.start("S2").await.unwrap();

    let for_s2 = app
        .gateway
        .create(new_notification("S2", None))
        .await
        .unwrap();
    assert!(wait_for(&s2.view(), &for_s2.id, Duration::from_secs(5)).await);
    assert!(!s1.view().snapshot().contains(&for_s2.id));

    s1.end().await;
    s2.end().await;
}
