//! Assignment endpoints.

use crate::AppResources;
use crate::entity::{assignment, collaborator, onboarding_event};
use crate::notifications::{DueEvent, Recipient};
use axum::{Extension, Json, http::StatusCode, response::IntoResponse};
use sea_orm::{ActiveValue::Set, DbErr, EntityTrait, SqlErr};
use serde::{Deserialize, Serialize};
use serde_json::json;
use time::OffsetDateTime;
use utoipa::ToSchema;
use utoipa_axum::{router::OpenApiRouter, routes};

/// Tag for OpenAPI documentation.
pub const ASSIGNMENTS_TAG: &str = "Assignments API";

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateAssignment {
    pub collaborator_id: i32,
    pub event_id: i32,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentDto {
    pub collaborator_id: i32,
    pub event_id: i32,
    pub completed: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub assigned_at: OffsetDateTime,
}

pub fn router() -> OpenApiRouter {
    OpenApiRouter::new().routes(routes!(create_assignment))
}

fn internal_error(context: &str, e: &DbErr) -> (StatusCode, Json<serde_json::Value>) {
    tracing::error!(
        name = "api.assignments.db_error",
        target = concat!(env!("CARGO_PKG_NAME"), "::", module_path!()),
        context = context,
        error = %e,
        message = "Database error"
    );
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": "Database error", "detail": e.to_string() })),
    )
}

fn duplicate() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::CONFLICT,
        Json(json!({ "error": "Collaborator is already assigned to this event" })),
    )
}

#[tracing::instrument(skip(resources, payload), fields(collaborator_id = payload.collaborator_id, event_id = payload.event_id))]
#[utoipa::path(
    post,
    path = "/assignments",
    tag = ASSIGNMENTS_TAG,
    operation_id = "Create Assignment",
    summary = "Assign a collaborator to an onboarding event",
    description = "Creates the assignment and queues a confirmation email to the collaborator.\n\n\
                   The response does not wait for the email; delivery failures are only logged.",
    request_body(content = CreateAssignment, description = "Collaborator and event to link"),
    responses(
        (status = 201, description = "Assignment created", body = AssignmentDto, content_type = "application/json"),
        (status = 404, description = "Collaborator or event not found", content_type = "application/json"),
        (status = 409, description = "Assignment already exists", content_type = "application/json"),
        (status = 500, description = "Database error", content_type = "application/json")
    )
)]
async fn create_assignment(
    Extension(resources): Extension<AppResources>,
    Json(payload): Json<CreateAssignment>,
) -> impl IntoResponse {
    let db = resources.db.as_ref();

    let collaborator = match collaborator::Entity::find_by_id(payload.collaborator_id)
        .one(db)
        .await
    {
        Ok(Some(c)) => c,
        Ok(None) => {
            return (
                StatusCode::NOT_FOUND,
                Json(json!({ "error": "Collaborator not found" })),
            );
        }
        Err(e) => return internal_error("load collaborator", &e),
    };

    let event = match onboarding_event::Entity::find_by_id(payload.event_id)
        .one(db)
        .await
    {
        Ok(Some(ev)) => ev,
        Ok(None) => {
            return (
                StatusCode::NOT_FOUND,
                Json(json!({ "error": "Event not found" })),
            );
        }
        Err(e) => return internal_error("load event", &e),
    };

    match assignment::Entity::find_by_id((payload.collaborator_id, payload.event_id))
        .one(db)
        .await
    {
        Ok(Some(_)) => return duplicate(),
        Ok(None) => {}
        Err(e) => return internal_error("check assignment", &e),
    }

    let assigned_at = OffsetDateTime::now_utc();
    let row = assignment::ActiveModel {
        collaborator_id: Set(payload.collaborator_id),
        event_id: Set(payload.event_id),
        completed: Set(false),
        completed_at: Set(None),
        assigned_at: Set(assigned_at),
    };

    if let Err(e) = assignment::Entity::insert(row)
        .exec_without_returning(db)
        .await
    {
        // Lost a race with a concurrent request for the same pair.
        if matches!(e.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) {
            return duplicate();
        }
        return internal_error("insert assignment", &e);
    }

    tracing::info!(
        name = "api.assignments.created",
        target = concat!(env!("CARGO_PKG_NAME"), "::", module_path!()),
        collaborator_id = payload.collaborator_id,
        event_id = payload.event_id,
        message = "Assignment created"
    );

    // Not awaited: the confirmation must never hold up or fail the request.
    let _confirmation = resources
        .assignment_hook
        .notify_assignment_created(Recipient::from(collaborator), DueEvent::from(event));

    let dto = AssignmentDto {
        collaborator_id: payload.collaborator_id,
        event_id: payload.event_id,
        completed: false,
        assigned_at,
    };
    match serde_json::to_value(&dto) {
        Ok(body) => (StatusCode::CREATED, Json(body)),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": "Failed to encode assignment", "detail": e.to_string() })),
        ),
    }
}
