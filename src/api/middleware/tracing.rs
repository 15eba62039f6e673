//! Development request logging.
//!
//! Only mounted when `APP_ENV` is `development`; production builds of the
//! pipeline never contain this stage.

use std::time::Instant;

use axum::{extract::Request, http::header, middleware::Next, response::Response};
use tower_http::classify::{ServerErrorsAsFailures, SharedClassifier};
use tower_http::trace::{DefaultMakeSpan, TraceLayer};
use tracing::Level;

/// Opens a `DEBUG` span per request so events from later stages carry
/// method and URI.
pub fn span_layer() -> TraceLayer<SharedClassifier<ServerErrorsAsFailures>> {
    TraceLayer::new_for_http().make_span_with(DefaultMakeSpan::new().level(Level::DEBUG))
}

/// Logs one line per request once the response is known:
///
/// ```text
/// INFO GET /api/v1/tours?sort=price 200 12.418 ms - 3184
/// ```
pub async fn access_log(req: Request, next: Next) -> Response {
    let start = Instant::now();

    let method = req.method().clone();
    let target = req
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| req.uri().path().to_string());

    let response = next.run(req).await;

    let size = response
        .headers()
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("-")
        .to_string();
    let ms = start.elapsed().as_secs_f64() * 1000.0;

    tracing::info!(
        "{method} {target} {status} {ms:.3} ms - {size}",
        status = response.status().as_u16(),
    );

    response
}
