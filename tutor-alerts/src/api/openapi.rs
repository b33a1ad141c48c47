//! OpenAPI document generated with `utoipa`, served at `/api/openapi.json`.

use utoipa::OpenApi;

use crate::api::error::ApiErrorResponse;
use crate::api::models::{
    CreateNotificationRequest, HealthResponse, LoggingConfigResponse, ModuleInfo,
    UpdateLogFilterRequest,
};
use crate::domain::{Notification, NotificationState, NotificationStats};
use crate::notification::DeliveryCounters;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "tutor-alerts API",
        version = "0.1.0",
        description = "Tutor-call notifications: create, list, acknowledge, stats and real-time push.",
        license(name = "MIT OR Apache-2.0")
    ),
    servers(
        (url = "http://localhost:12580", description = "Local development server")
    ),
    tags(
        (name = "health", description = "Health check endpoints for monitoring and orchestration"),
        (name = "notifications", description = "Tutor-to-student notification endpoints"),
        (name = "logging", description = "Logging configuration endpoints")
    ),
    paths(
        crate::api::routes::health::health_check,
        crate::api::routes::notifications::create_notification,
        crate::api::routes::notifications::list_for_student,
        crate::api::routes::notifications::list_for_group,
        crate::api::routes::notifications::get_stats,
        crate::api::routes::notifications::get_delivery_counters,
        crate::api::routes::notifications::get_notification,
        crate::api::routes::notifications::mark_read,
        crate::api::routes::notifications::mark_responded,
        crate::api::routes::notifications::delete_notification,
        crate::api::routes::notifications::push_ws,
        crate::api::routes::logging::get_logging_config,
        crate::api::routes::logging::update_logging_config,
    ),
    components(schemas(
        Notification,
        NotificationState,
        NotificationStats,
        CreateNotificationRequest,
        DeliveryCounters,
        HealthResponse,
        LoggingConfigResponse,
        ModuleInfo,
        UpdateLogFilterRequest,
        ApiErrorResponse,
    ))
)]
pub struct ApiDoc;
