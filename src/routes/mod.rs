pub mod application;
pub mod docs;
pub mod health;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post, put},
    Router,
};

use crate::middleware::{auth::require_bearer_auth, rate_limit};
use crate::services::storage_service::MAX_RESUME_BYTES;
use crate::AppState;

/// Room for a maximal resume plus the rest of the multipart body.
const BODY_LIMIT: usize = MAX_RESUME_BYTES + 1024 * 1024;

/// Builds the full route table. `/health` and the OpenAPI document are open;
/// everything under `/api` needs a bearer token and is rate limited.
pub fn router(state: AppState, api_rps: u32) -> Router {
    let api = Router::new()
        .route(
            "/api/applications/me",
            get(application::list_my_applications),
        )
        .route(
            "/api/applications/stats",
            get(application::get_application_stats),
        )
        .route(
            "/api/applications/:id/status",
            put(application::update_application_status),
        )
        .route(
            "/api/applications/:id/messages",
            get(application::list_messages).post(application::send_message),
        )
        .route("/api/jobs/:job_id/apply", post(application::apply_for_job))
        .route(
            "/api/jobs/:job_id/applications",
            get(application::list_job_applications),
        )
        .route("/api/messages/unread", get(application::get_unread_count))
        .layer(axum::middleware::from_fn_with_state(
            state.jwt.clone(),
            require_bearer_auth,
        ))
        .layer(axum::middleware::from_fn_with_state(
            rate_limit::RateLimiter::new(api_rps),
            rate_limit::rps_middleware,
        ));

    Router::new()
        .route("/health", get(health::health))
        .route("/api/openapi.json", get(docs::openapi_json))
        .merge(api)
        .layer(DefaultBodyLimit::max(BODY_LIMIT))
        .with_state(state)
}
