//! API request and response models.

use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::domain::NewNotification;
use crate::Result;

/// Body of `POST /api/notifications`.
///
/// All identifiers are optional on the wire so that missing fields surface
/// as a validation error instead of a body rejection.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateNotificationRequest {
    pub group_id: Option<String>,
    pub student_id: Option<String>,
    pub tutor_id: Option<String>,
    /// Defaults to "Tu tutor te está llamando" when absent.
    pub message: Option<String>,
}

impl CreateNotificationRequest {
    pub fn into_new(self) -> Result<NewNotification> {
        NewNotification::new(self.group_id, self.student_id, self.tutor_id, self.message)
    }
}

/// Query for `GET /api/notifications/student/{studentId}`.
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query, rename_all = "camelCase")]
pub struct StudentListQuery {
    /// Maximum number of results; capped server-side.
    pub limit: Option<u32>,
    /// Only return unread notifications.
    #[serde(default)]
    pub unread_only: bool,
}

/// Query for `GET /api/notifications/group/{groupId}`.
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct GroupListQuery {
    /// Maximum number of results; capped server-side.
    pub limit: Option<u32>,
}

/// Query for the push WebSocket.
#[derive(Debug, Clone, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PushQuery {
    /// `student-{id}` or `group-{id}`.
    pub room: String,
}

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct LoggingConfigResponse {
    pub filter: String,
    pub available_modules: Vec<ModuleInfo>,
}

/// A tunable logging target.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ModuleInfo {
    pub name: String,
    pub description: String,
}

/// Request to update the log filter.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct UpdateLogFilterRequest {
    pub filter: String,
}
