use axum::http::{header, HeaderValue, Method};
use tower_http::cors::{Any, CorsLayer};

/// Restricts browsers to the configured frontend origin, or allows any origin
/// when none is configured.
pub fn cors_layer(origin: Option<&str>) -> CorsLayer {
    let Some(origin) = origin.and_then(|o| o.parse::<HeaderValue>().ok()) else {
        return CorsLayer::new()
            .allow_methods(Any)
            .allow_headers(Any)
            .allow_origin(Any);
    };

    CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_credentials(true)
}
