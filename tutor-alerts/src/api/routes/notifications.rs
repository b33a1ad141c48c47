//! Notification routes.
//!
//! REST operations over the gateway plus the push WebSocket that streams
//! `new-notification` events for one room.

use std::time::Duration;

use axum::{
    Json, Router,
    extract::{
        Path, Query, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    http::StatusCode,
    response::IntoResponse,
    routing::{get, patch},
};
use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use tracing::{debug, warn};

use crate::api::error::{ApiError, ApiResult};
use crate::api::models::{CreateNotificationRequest, GroupListQuery, PushQuery, StudentListQuery};
use crate::api::server::AppState;
use crate::domain::{Notification, NotificationStats};
use crate::notification::{DeliveryCounters, PushSubscription, Room};

/// Heartbeat ping interval in seconds.
const HEARTBEAT_INTERVAL_SECS: u64 = 30;

/// Create the notifications router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", axum::routing::post(create_notification))
        .route("/student/{student_id}", get(list_for_student))
        .route("/group/{group_id}", get(list_for_group))
        .route("/stats/{student_id}", get(get_stats))
        .route("/delivery", get(get_delivery_counters))
        .route("/ws", get(push_ws))
        .route("/{id}", get(get_notification).delete(delete_notification))
        .route("/{id}/read", patch(mark_read))
        .route("/{id}/respond", patch(mark_responded))
}

#[utoipa::path(
    post,
    path = "/api/notifications",
    tag = "notifications",
    request_body = CreateNotificationRequest,
    responses(
        (status = 201, description = "Notification created", body = Notification),
        (status = 404, description = "Student or tutor not found", body = crate::api::error::ApiErrorResponse),
        (status = 422, description = "Missing fields or wrong role", body = crate::api::error::ApiErrorResponse)
    )
)]
pub async fn create_notification(
    State(state): State<AppState>,
    Json(request): Json<CreateNotificationRequest>,
) -> ApiResult<(StatusCode, Json<Notification>)> {
    let input = request.into_new()?;
    let notification = state.gateway.create(input).await?;
    Ok((StatusCode::CREATED, Json(notification)))
}

#[utoipa::path(
    get,
    path = "/api/notifications/student/{student_id}",
    tag = "notifications",
    params(
        ("student_id" = String, Path, description = "Student ID"),
        StudentListQuery
    ),
    responses(
        (status = 200, description = "Newest first", body = Vec<Notification>)
    )
)]
pub async fn list_for_student(
    State(state): State<AppState>,
    Path(student_id): Path<String>,
    Query(query): Query<StudentListQuery>,
) -> ApiResult<Json<Vec<Notification>>> {
    let notifications = state
        .gateway
        .list_by_student(&student_id, query.unread_only, query.limit)
        .await?;
    Ok(Json(notifications))
}

#[utoipa::path(
    get,
    path = "/api/notifications/group/{group_id}",
    tag = "notifications",
    params(
        ("group_id" = String, Path, description = "Group ID"),
        GroupListQuery
    ),
    responses(
        (status = 200, description = "Newest first", body = Vec<Notification>)
    )
)]
pub async fn list_for_group(
    State(state): State<AppState>,
    Path(group_id): Path<String>,
    Query(query): Query<GroupListQuery>,
) -> ApiResult<Json<Vec<Notification>>> {
    let notifications = state.gateway.list_by_group(&group_id, query.limit).await?;
    Ok(Json(notifications))
}

#[utoipa::path(
    get,
    path = "/api/notifications/stats/{student_id}",
    tag = "notifications",
    params(("student_id" = String, Path, description = "Student ID")),
    responses(
        (status = 200, description = "Per-student counters", body = NotificationStats)
    )
)]
pub async fn get_stats(
    State(state): State<AppState>,
    Path(student_id): Path<String>,
) -> ApiResult<Json<NotificationStats>> {
    Ok(Json(state.gateway.stats(&student_id).await?))
}

#[utoipa::path(
    get,
    path = "/api/notifications/delivery",
    tag = "notifications",
    responses(
        (status = 200, description = "Push fan-out counters since start", body = DeliveryCounters)
    )
)]
pub async fn get_delivery_counters(State(state): State<AppState>) -> Json<DeliveryCounters> {
    Json(state.gateway.delivery_counters())
}

#[utoipa::path(
    get,
    path = "/api/notifications/{id}",
    tag = "notifications",
    params(("id" = String, Path, description = "Notification ID")),
    responses(
        (status = 200, description = "Notification", body = Notification),
        (status = 404, description = "Not found", body = crate::api::error::ApiErrorResponse)
    )
)]
pub async fn get_notification(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Notification>> {
    Ok(Json(state.gateway.get(&id).await?))
}

#[utoipa::path(
    patch,
    path = "/api/notifications/{id}/read",
    tag = "notifications",
    params(("id" = String, Path, description = "Notification ID")),
    responses(
        (status = 200, description = "Notification after the update", body = Notification),
        (status = 404, description = "Not found", body = crate::api::error::ApiErrorResponse)
    )
)]
pub async fn mark_read(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Notification>> {
    Ok(Json(state.gateway.mark_read(&id).await?))
}

#[utoipa::path(
    patch,
    path = "/api/notifications/{id}/respond",
    tag = "notifications",
    params(("id" = String, Path, description = "Notification ID")),
    responses(
        (status = 200, description = "Notification after the update", body = Notification),
        (status = 404, description = "Not found", body = crate::api::error::ApiErrorResponse)
    )
)]
pub async fn mark_responded(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Notification>> {
    Ok(Json(state.gateway.mark_responded(&id).await?))
}

#[utoipa::path(
    delete,
    path = "/api/notifications/{id}",
    tag = "notifications",
    params(("id" = String, Path, description = "Notification ID")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 404, description = "Not found", body = crate::api::error::ApiErrorResponse)
    )
)]
pub async fn delete_notification(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    state.gateway.delete(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Push WebSocket for one room.
///
/// Streams `{"event":"new-notification","data":{...}}` text frames. Events
/// emitted while no socket is joined to the room are not replayed.
#[utoipa::path(
    get,
    path = "/api/notifications/ws",
    tag = "notifications",
    params(PushQuery),
    responses(
        (status = 101, description = "Switching to WebSocket"),
        (status = 422, description = "Malformed room", body = crate::api::error::ApiErrorResponse)
    )
)]
pub async fn push_ws(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Query(query): Query<PushQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let room: Room = query.room.parse()?;
    let subscription = state.hub.subscribe(room);
    Ok(ws.on_upgrade(|socket| handle_socket(socket, subscription)))
}

async fn handle_socket(socket: WebSocket, mut subscription: PushSubscription) {
    let (mut sender, mut receiver) = socket.split();
    let mut heartbeat_interval =
        tokio::time::interval(Duration::from_secs(HEARTBEAT_INTERVAL_SECS));
    // The first tick completes immediately.
    heartbeat_interval.tick().await;
    let mut awaiting_pong = false;

    loop {
        tokio::select! {
            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(Message::Ping(data))) => {
                        if sender.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Pong(_))) => {
                        awaiting_pong = false;
                    }
                    Some(Err(e)) => {
                        debug!("WebSocket error: {}", e);
                        break;
                    }
                    _ => {}
                }
            }

            event = subscription.recv() => {
                let Some(event) = event else {
                    break;
                };
                let text = match serde_json::to_string(event.as_ref()) {
                    Ok(text) => text,
                    Err(e) => {
                        warn!("Failed to encode {}: {}", event.name(), e);
                        continue;
                    }
                };
                if sender.send(Message::Text(text.into())).await.is_err() {
                    debug!(room = %subscription.room(), "Client gone, dropping push");
                    break;
                }
            }

            _ = heartbeat_interval.tick() => {
                if awaiting_pong {
                    debug!(room = %subscription.room(), "Client failed to respond to Ping, closing connection");
                    break;
                }
                if sender.send(Message::Ping(Bytes::new())).await.is_ok() {
                    awaiting_pong = true;
                } else {
                    break;
                }
            }
        }
    }

    subscription.unsubscribe();
}
