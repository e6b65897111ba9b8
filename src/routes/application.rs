use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Multipart, Path, Query, State,
    },
    http::StatusCode,
    response::{IntoResponse, Json},
    Extension,
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    dto::application_dto::{
        ApplicationListQuery, ApplicationListResponse, ApplicationStatsResponse,
        SendMessagePayload, UnreadCountResponse, UpdateStatusPayload,
    },
    error::{Error, Result},
    models::{application::Application, message::Message, user::Identity},
    services::storage_service::ResumeStorage,
    AppState,
};

const MAX_COVER_LETTER_CHARS: usize = 10_000;

#[derive(Default)]
struct ApplicationForm {
    cover_letter: Option<String>,
    resume_ref: Option<String>,
}

/// Reads the apply form, storing the resume as it streams in. If anything
/// fails after the file was written, the file is removed again.
async fn read_application_form(
    storage: &ResumeStorage,
    multipart: &mut Multipart,
) -> Result<ApplicationForm> {
    let mut form = ApplicationForm::default();
    if let Err(err) = read_form_fields(storage, multipart, &mut form).await {
        if let Some(reference) = form.resume_ref.take() {
            storage.remove(&reference).await;
        }
        return Err(err);
    }
    Ok(form)
}

async fn read_form_fields(
    storage: &ResumeStorage,
    multipart: &mut Multipart,
    form: &mut ApplicationForm,
) -> Result<()> {
    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "cover_letter" => {
                let text = field.text().await?;
                if text.chars().count() > MAX_COVER_LETTER_CHARS {
                    return Err(Error::InvalidArgument(format!(
                        "Cover letter exceeds {} characters",
                        MAX_COVER_LETTER_CHARS
                    )));
                }
                let text = text.trim();
                if !text.is_empty() {
                    form.cover_letter = Some(text.to_string());
                }
            }
            "resume" => {
                if form.resume_ref.is_some() {
                    return Err(Error::InvalidArgument(
                        "Only one resume may be uploaded".into(),
                    ));
                }
                let filename = field.file_name().unwrap_or_default().to_string();
                let data: bytes::Bytes = field.bytes().await?;
                if !data.is_empty() {
                    form.resume_ref = Some(storage.store(&filename, &data).await?);
                }
            }
            other => {
                return Err(Error::InvalidArgument(format!(
                    "Unexpected form field '{}'",
                    other
                )))
            }
        }
    }
    Ok(())
}

#[utoipa::path(
    get,
    path = "/api/applications/me",
    tag = "applications",
    params(
        ("status" = Option<String>, Query, description = "Filter by status"),
        ("search" = Option<String>, Query, description = "Match job title or company"),
        ("page" = Option<i64>, Query, description = "Page number, starting at 1"),
        ("limit" = Option<i64>, Query, description = "Items per page, at most 100")
    ),
    responses(
        (status = 200, description = "Caller's applications", body = ApplicationListResponse),
        (status = 400, description = "Invalid filter or page")
    )
)]
#[axum::debug_handler]
pub async fn list_my_applications(
    State(state): State<AppState>,
    Extension(caller): Extension<Identity>,
    query: std::result::Result<Query<ApplicationListQuery>, QueryRejection>,
) -> Result<impl IntoResponse> {
    let Query(query) = query?;
    let (filter, page) = query.into_parts()?;
    let list = state
        .application_service
        .list_my_applications(caller.user_id, filter, page)
        .await?;
    Ok(Json(ApplicationListResponse::from(list)))
}

#[utoipa::path(
    get,
    path = "/api/applications/stats",
    tag = "applications",
    responses(
        (status = 200, description = "Status counts and recent activity", body = ApplicationStatsResponse)
    )
)]
#[axum::debug_handler]
pub async fn get_application_stats(
    State(state): State<AppState>,
    Extension(caller): Extension<Identity>,
) -> Result<impl IntoResponse> {
    let stats = state
        .application_service
        .application_stats(caller.user_id)
        .await?;
    Ok(Json(ApplicationStatsResponse::from(stats)))
}

/// Multipart form with an optional `cover_letter` text field and an optional
/// `resume` file (pdf, doc or docx, up to 5 MB).
#[utoipa::path(
    post,
    path = "/api/jobs/{job_id}/apply",
    tag = "applications",
    params(
        ("job_id" = Uuid, Path, description = "Job ID")
    ),
    responses(
        (status = 201, description = "Application submitted", body = Application),
        (status = 400, description = "Invalid upload"),
        (status = 403, description = "Caller is not a job seeker"),
        (status = 404, description = "Job not found"),
        (status = 409, description = "Already applied")
    )
)]
#[axum::debug_handler]
pub async fn apply_for_job(
    State(state): State<AppState>,
    Extension(caller): Extension<Identity>,
    Path(job_id): Path<Uuid>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse> {
    let form = read_application_form(&state.resume_storage, &mut multipart).await?;

    let submitted = state
        .application_service
        .submit_application(&caller, job_id, form.cover_letter, form.resume_ref.clone())
        .await;

    match submitted {
        Ok(application) => Ok((StatusCode::CREATED, Json(application))),
        Err(err) => {
            if let Some(reference) = form.resume_ref {
                state.resume_storage.remove(&reference).await;
            }
            Err(err)
        }
    }
}

#[utoipa::path(
    get,
    path = "/api/jobs/{job_id}/applications",
    tag = "applications",
    params(
        ("job_id" = Uuid, Path, description = "Job ID"),
        ("status" = Option<String>, Query, description = "Filter by status"),
        ("search" = Option<String>, Query, description = "Match job title or company"),
        ("page" = Option<i64>, Query, description = "Page number, starting at 1"),
        ("limit" = Option<i64>, Query, description = "Items per page, at most 100")
    ),
    responses(
        (status = 200, description = "Applications received for the job", body = ApplicationListResponse),
        (status = 403, description = "Caller does not own the job"),
        (status = 404, description = "Job not found")
    )
)]
#[axum::debug_handler]
pub async fn list_job_applications(
    State(state): State<AppState>,
    Extension(caller): Extension<Identity>,
    Path(job_id): Path<Uuid>,
    query: std::result::Result<Query<ApplicationListQuery>, QueryRejection>,
) -> Result<impl IntoResponse> {
    let Query(query) = query?;
    let (filter, page) = query.into_parts()?;
    let list = state
        .application_service
        .list_job_applications(caller.user_id, job_id, filter, page)
        .await?;
    Ok(Json(ApplicationListResponse::from(list)))
}

#[utoipa::path(
    put,
    path = "/api/applications/{id}/status",
    tag = "applications",
    params(
        ("id" = Uuid, Path, description = "Application ID")
    ),
    request_body = UpdateStatusPayload,
    responses(
        (status = 200, description = "Status updated", body = Application),
        (status = 400, description = "Unknown status"),
        (status = 403, description = "Caller does not own the job"),
        (status = 404, description = "Application not found")
    )
)]
#[axum::debug_handler]
pub async fn update_application_status(
    State(state): State<AppState>,
    Extension(caller): Extension<Identity>,
    Path(id): Path<Uuid>,
    payload: std::result::Result<Json<UpdateStatusPayload>, JsonRejection>,
) -> Result<impl IntoResponse> {
    let Json(payload) = payload?;
    payload.validate()?;
    let application = state
        .application_service
        .update_status(caller.user_id, id, payload.status.trim())
        .await?;
    Ok(Json(application))
}

#[utoipa::path(
    post,
    path = "/api/applications/{id}/messages",
    tag = "messages",
    params(
        ("id" = Uuid, Path, description = "Application ID")
    ),
    request_body = SendMessagePayload,
    responses(
        (status = 201, description = "Message sent", body = Message),
        (status = 400, description = "Empty or oversized message"),
        (status = 403, description = "Caller is not a party to the application"),
        (status = 404, description = "Application not found")
    )
)]
#[axum::debug_handler]
pub async fn send_message(
    State(state): State<AppState>,
    Extension(caller): Extension<Identity>,
    Path(id): Path<Uuid>,
    payload: std::result::Result<Json<SendMessagePayload>, JsonRejection>,
) -> Result<impl IntoResponse> {
    let Json(payload) = payload?;
    payload.validate()?;
    let message = state
        .application_service
        .send_message(caller.user_id, id, &payload.content)
        .await?;
    Ok((StatusCode::CREATED, Json(message)))
}

#[utoipa::path(
    get,
    path = "/api/applications/{id}/messages",
    tag = "messages",
    params(
        ("id" = Uuid, Path, description = "Application ID")
    ),
    responses(
        (status = 200, description = "Thread, oldest first", body = [Message]),
        (status = 403, description = "Caller is not a party to the application"),
        (status = 404, description = "Application not found")
    )
)]
#[axum::debug_handler]
pub async fn list_messages(
    State(state): State<AppState>,
    Extension(caller): Extension<Identity>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let messages = state
        .application_service
        .list_messages(caller.user_id, id)
        .await?;
    Ok(Json(messages))
}

#[utoipa::path(
    get,
    path = "/api/messages/unread",
    tag = "messages",
    responses(
        (status = 200, description = "Unread messages addressed to the caller", body = UnreadCountResponse)
    )
)]
#[axum::debug_handler]
pub async fn get_unread_count(
    State(state): State<AppState>,
    Extension(caller): Extension<Identity>,
) -> Result<impl IntoResponse> {
    let unread = state
        .application_service
        .unread_message_count(caller.user_id)
        .await?;
    Ok(Json(UnreadCountResponse { unread }))
}
