//! Operator endpoints for the reminder pipeline.
//!
//! - `/notifications/run-alerts` - Run the dispatch pipeline now
//! - `/notifications/test-email` - Send a probe email

use crate::AppResources;
use crate::error::{DeliveryError, RunError};
use crate::notifications::{DispatchResult, send_test_email};
use axum::{Extension, Json, http::StatusCode, response::IntoResponse};
use serde::{Deserialize, Serialize};
use serde_json::json;
use utoipa::ToSchema;
use utoipa_axum::{router::OpenApiRouter, routes};

/// Tag for OpenAPI documentation.
pub const NOTIFICATIONS_TAG: &str = "Notifications API";

#[derive(Deserialize, ToSchema)]
pub struct TestEmailRequest {
    pub recipient: String,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TestEmailResponse {
    pub status: String,
    pub message_id: String,
}

pub fn router() -> OpenApiRouter {
    OpenApiRouter::new()
        .routes(routes!(run_alerts))
        .routes(routes!(test_email))
}

#[tracing::instrument(skip(resources))]
#[utoipa::path(
    post,
    path = "/notifications/run-alerts",
    tag = NOTIFICATIONS_TAG,
    operation_id = "Run Alerts",
    summary = "Run the reminder dispatch now",
    description = "Runs the same pipeline as the daily trigger over the standard window and returns its counts.\n\n\
                   Collaborators already reminded for an event are skipped, so calling this repeatedly is safe.",
    responses(
        (status = 200, description = "Run finished", body = DispatchResult, content_type = "application/json"),
        (status = 409, description = "A run is already in progress", content_type = "application/json", example = json!({"error": "A dispatch run is already in progress"})),
        (status = 500, description = "Run aborted", content_type = "application/json")
    )
)]
async fn run_alerts(Extension(resources): Extension<AppResources>) -> impl IntoResponse {
    match resources.scheduler.run_manually().await {
        Ok(result) => (StatusCode::OK, Json(json!(result))),
        Err(RunError::AlreadyRunning) => (
            StatusCode::CONFLICT,
            Json(json!({ "error": RunError::AlreadyRunning.to_string() })),
        ),
        Err(RunError::LedgerUnavailable { source, partial }) => {
            tracing::error!(
                name = "api.notifications.run_failed",
                target = concat!(env!("CARGO_PKG_NAME"), "::", module_path!()),
                error = %source,
                message = "Manual dispatch run aborted"
            );
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "error": "Dispatch run aborted",
                    "detail": source.to_string(),
                    "partial": partial,
                })),
            )
        }
        Err(e) => {
            tracing::error!(
                name = "api.notifications.run_failed",
                target = concat!(env!("CARGO_PKG_NAME"), "::", module_path!()),
                error = %e,
                message = "Manual dispatch run failed"
            );
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "Dispatch run failed", "detail": e.to_string() })),
            )
        }
    }
}

#[tracing::instrument(skip(resources, payload))]
#[utoipa::path(
    post,
    path = "/notifications/test-email",
    tag = NOTIFICATIONS_TAG,
    operation_id = "Send Test Email",
    summary = "Send a probe email through the configured backend",
    request_body(content = TestEmailRequest, description = "Address to send the probe to"),
    responses(
        (status = 200, description = "Email accepted by the backend", body = TestEmailResponse, content_type = "application/json"),
        (status = 400, description = "Missing or invalid recipient", content_type = "application/json"),
        (status = 502, description = "The mail backend failed", content_type = "application/json")
    )
)]
async fn test_email(
    Extension(resources): Extension<AppResources>,
    Json(payload): Json<TestEmailRequest>,
) -> impl IntoResponse {
    match send_test_email(&resources.mailer, &payload.recipient).await {
        Ok(message_id) => (
            StatusCode::OK,
            Json(json!(TestEmailResponse {
                status: "sent".to_string(),
                message_id: message_id.0,
            })),
        ),
        Err(e @ DeliveryError::InvalidRecipient(_)) => (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": e.to_string() })),
        ),
        Err(e) => {
            tracing::warn!(
                name = "api.notifications.test_email_failed",
                target = concat!(env!("CARGO_PKG_NAME"), "::", module_path!()),
                error = %e,
                message = "Test email failed"
            );
            (
                StatusCode::BAD_GATEWAY,
                Json(json!({ "error": "Email delivery failed", "detail": e.to_string() })),
            )
        }
    }
}
