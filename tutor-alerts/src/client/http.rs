//! REST client for a remote notification server.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

use super::feed::NotificationFeed;
use crate::api::error::ApiErrorResponse;
use crate::domain::{Notification, NotificationStats};
use crate::{Error, Result};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Body of `POST /api/notifications`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateBody<'a> {
    group_id: &'a str,
    student_id: &'a str,
    tutor_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<&'a str>,
}

/// Typed client for `/api/notifications`.
///
/// Server error bodies are mapped back onto [`Error`]; network failures and
/// 5xx responses become `Transport`.
#[derive(Debug, Clone)]
pub struct HttpNotificationClient {
    client: Client,
    base_url: Url,
}

impl HttpNotificationClient {
    pub fn new(base_url: Url) -> Result<Self> {
        super::tls::install_rustls_provider();
        let client = Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .map_err(|e| Error::config(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self::with_client(client, base_url))
    }

    pub fn with_client(client: Client, base_url: Url) -> Self {
        Self { client, base_url }
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub async fn list_for_student(
        &self,
        student_id: &str,
        unread_only: bool,
        limit: Option<u32>,
    ) -> Result<Vec<Notification>> {
        let mut request = self
            .request(Method::GET, &["student", student_id])?
            .query(&[("unreadOnly", unread_only)]);
        if let Some(limit) = limit {
            request = request.query(&[("limit", limit)]);
        }
        self.send_json(request).await
    }

    pub async fn list_for_group(&self, group_id: &str, limit: Option<u32>) -> Result<Vec<Notification>> {
        let mut request = self.request(Method::GET, &["group", group_id])?;
        if let Some(limit) = limit {
            request = request.query(&[("limit", limit)]);
        }
        self.send_json(request).await
    }

    pub async fn create(
        &self,
        group_id: &str,
        student_id: &str,
        tutor_id: &str,
        message: Option<&str>,
    ) -> Result<Notification> {
        let body = CreateBody {
            group_id,
            student_id,
            tutor_id,
            message,
        };
        let request = self.request(Method::POST, &[])?.json(&body);
        self.send_json(request).await
    }

    pub async fn mark_read(&self, id: &str) -> Result<Notification> {
        let request = self.request(Method::PATCH, &[id, "read"])?;
        self.send_json(request).await
    }

    pub async fn mark_responded(&self, id: &str) -> Result<Notification> {
        let request = self.request(Method::PATCH, &[id, "respond"])?;
        self.send_json(request).await
    }

    pub async fn stats(&self, student_id: &str) -> Result<NotificationStats> {
        let request = self.request(Method::GET, &["stats", student_id])?;
        self.send_json(request).await
    }

    pub async fn delete(&self, id: &str) -> Result<()> {
        let request = self.request(Method::DELETE, &[id])?;
        self.send(request).await?;
        Ok(())
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| Error::config(format!("{} cannot be a base url", self.base_url)))?
            .pop_if_empty()
            .extend(["api", "notifications"])
            .extend(segments);
        Ok(url)
    }

    fn request(&self, method: Method, segments: &[&str]) -> Result<RequestBuilder> {
        let url = self.endpoint(segments)?;
        debug!(%method, %url, "Notification API request");
        Ok(self.client.request(method, url))
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response> {
        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(error_from_response(status, &body))
    }

    async fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        let response = self.send(request).await?;
        Ok(response.json::<T>().await?)
    }
}

#[async_trait]
impl NotificationFeed for HttpNotificationClient {
    async fn fetch_snapshot(
        &self,
        student_id: &str,
        unread_only: bool,
        limit: Option<u32>,
    ) -> Result<Vec<Notification>> {
        self.list_for_student(student_id, unread_only, limit).await
    }
}

fn error_from_response(status: StatusCode, body: &str) -> Error {
    let parsed = serde_json::from_str::<ApiErrorResponse>(body).ok();
    let message = parsed
        .as_ref()
        .map(|p| p.message.clone())
        .unwrap_or_else(|| format!("HTTP {}", status));

    if status.is_server_error() {
        return Error::transport(message);
    }

    let Some(parsed) = parsed else {
        return Error::ApiError(message);
    };

    match parsed.code.as_str() {
        "NOT_FOUND" => {
            let detail = |key: &str| {
                parsed
                    .details
                    .as_ref()
                    .and_then(|d| d.get(key))
                    .and_then(|v| v.as_str())
                    .map(str::to_string)
            };
            Error::not_found(
                detail("entityType").unwrap_or_else(|| "Entity".to_string()),
                detail("id").unwrap_or_default(),
            )
        }
        "INVALID_ROLE" => {
            let detail = |key: &str| {
                parsed
                    .details
                    .as_ref()
                    .and_then(|d| d.get(key))
                    .and_then(|v| v.as_str())
                    .unwrap_or_default()
                    .to_string()
            };
            Error::InvalidRole {
                id: detail("id"),
                expected: detail("expected"),
                actual: detail("actual"),
            }
        }
        "VALIDATION_ERROR" => Error::validation(message),
        _ => Error::ApiError(message),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_endpoint_building() {
        let client =
            HttpNotificationClient::new(Url::parse("http://localhost:12580").unwrap()).unwrap();
        let url = client.endpoint(&["student", "S 1"]).unwrap();
        assert_eq!(
            url.as_str(),
            "http://localhost:12580/api/notifications/student/S%201"
        );

        let url = client.endpoint(&[]).unwrap();
        assert_eq!(url.as_str(), "http://localhost:12580/api/notifications");
    }

    #[test]
    fn test_invalid_role_body_is_decoded() {
        let body = json!({
            "code": "INVALID_ROLE",
            "message": "T1 is not a student",
            "details": {"id": "T1", "expected": "STUDENT", "actual": "TUTOR"}
        })
        .to_string();

        match error_from_response(StatusCode::UNPROCESSABLE_ENTITY, &body) {
            Error::InvalidRole {
                id,
                expected,
                actual,
            } => {
                assert_eq!(id, "T1");
                assert_eq!(expected, "STUDENT");
                assert_eq!(actual, "TUTOR");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_not_found_and_validation_bodies() {
        let body = json!({
            "code": "NOT_FOUND",
            "message": "missing",
            "details": {"entityType": "Notification", "id": "n1"}
        })
        .to_string();
        assert!(matches!(
            error_from_response(StatusCode::NOT_FOUND, &body),
            Error::NotFound { ref id, .. } if id == "n1"
        ));

        let body = json!({"code": "VALIDATION_ERROR", "message": "missing groupId"}).to_string();
        assert!(matches!(
            error_from_response(StatusCode::UNPROCESSABLE_ENTITY, &body),
            Error::Validation(_)
        ));
    }

    #[test]
    fn test_server_errors_are_transient() {
        let err = error_from_response(StatusCode::BAD_GATEWAY, "<html>bad gateway</html>");
        assert!(err.is_transient());
    }
}
