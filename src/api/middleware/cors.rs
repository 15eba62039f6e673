//! Cross-origin policy stage.

use axum::{
    extract::Request,
    http::{Method, StatusCode},
    middleware::Next,
    response::Response,
};
use tower_http::cors::{AllowHeaders, Any, CorsLayer};

/// Permissive CORS: any origin, the usual REST verbs, request headers mirrored.
///
/// Real preflights (`OPTIONS` with `Access-Control-Request-Method`) are
/// answered by the layer itself.
pub fn layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::HEAD,
            Method::PUT,
            Method::PATCH,
            Method::POST,
            Method::DELETE,
        ])
        .allow_headers(AllowHeaders::mirror_request())
}

/// Answers `OPTIONS` with `204 No Content`.
///
/// [`layer`] short-circuits every `OPTIONS` request with the allowed methods
/// and headers; this stage sits directly outside it and only fixes the status.
pub async fn options_responder(req: Request, next: Next) -> Response {
    let is_options = req.method() == Method::OPTIONS;
    let mut response = next.run(req).await;
    if is_options && response.status() == StatusCode::OK {
        *response.status_mut() = StatusCode::NO_CONTENT;
    }
    response
}
