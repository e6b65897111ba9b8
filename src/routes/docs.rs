use axum::{response::IntoResponse, Json};
use utoipa::OpenApi;

use crate::dto::application_dto::{
    ApplicationListResponse, ApplicationStatsResponse, SendMessagePayload, UnreadCountResponse,
    UpdateStatusPayload,
};
use crate::models::{
    application::{Application, ApplicationStatus, ApplicationView},
    job::JobSummary,
    message::Message,
};
use crate::routes::application;

#[derive(OpenApi)]
#[openapi(
    paths(
        application::list_my_applications,
        application::get_application_stats,
        application::apply_for_job,
        application::list_job_applications,
        application::update_application_status,
        application::send_message,
        application::list_messages,
        application::get_unread_count,
    ),
    components(schemas(
        Application,
        ApplicationStatus,
        ApplicationView,
        JobSummary,
        Message,
        ApplicationListResponse,
        ApplicationStatsResponse,
        UpdateStatusPayload,
        SendMessagePayload,
        UnreadCountResponse,
    )),
    tags(
        (name = "applications", description = "Job applications and their status workflow"),
        (name = "messages", description = "Per-application message threads")
    )
)]
pub struct ApiDoc;

pub async fn openapi_json() -> impl IntoResponse {
    Json(ApiDoc::openapi())
}
