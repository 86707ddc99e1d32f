//! OpenAPI/Utoipa configuration.

use crate::api::{assignments::ASSIGNMENTS_TAG, health::MISC_TAG, notifications::NOTIFICATIONS_TAG};
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Onboarding Alerts API",
        version = "1.0.0",
        description = "Operator endpoints of the onboarding notification service."
    ),
    tags(
        (name = MISC_TAG, description = "Miscellaneous endpoints"),
        (name = NOTIFICATIONS_TAG, description = "Reminder runs and mail checks"),
        (name = ASSIGNMENTS_TAG, description = "Collaborator assignments")
    )
)]
pub struct ApiDoc;
