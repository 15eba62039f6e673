//! Not-found fallback and the terminal error stage.
//!
//! Every failure in the pipeline ends up here as an [`AppError`] attached to the
//! response: explicit errors from stages and collaborators, bodiless error
//! statuses from library layers, and panics caught by [`on_panic`]. The
//! terminal stage is the only place that decides the client-visible shape.
//!
//! # Response shapes
//!
//! API paths get JSON:
//!
//! ```json
//! { "status": "fail", "message": "Can't find /api/v1/nope on this server!" }
//! ```
//!
//! Development adds an `error` object with code, status and details.
//! Programming faults in production collapse to
//! `{"status":"error","message":"Something went very wrong!"}`.
//!
//! Other paths get the HTML error page.

use std::any::Any;
use std::sync::Arc;

use axum::{
    body::{Body, HttpBody},
    extract::{Request, State},
    http::{HeaderValue, Method, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde_json::json;

use crate::api::middleware::rate_limit::is_under_prefix;
use crate::config::Environment;
use crate::error::AppError;
use crate::web::error_page::ErrorPage;

/// Title of the HTML error page.
pub const PAGE_TITLE: &str = "Something went wrong!";

/// Message shown on the HTML page for faults in production.
pub const PAGE_FALLBACK_MESSAGE: &str = "Please try again later.";

#[derive(Debug, Clone)]
pub struct ErrorRendering {
    pub environment: Environment,
    pub api_prefix: Arc<str>,
}

/// Fallback for requests no router claimed.
pub async fn not_found(req: Request) -> AppError {
    let target = req
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| req.uri().path().to_string());

    AppError::not_found(
        format!("Can't find {target} on this server!"),
        json!({ "path": target }),
    )
}

/// Converts a caught panic into a programming fault.
pub fn on_panic(payload: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "handler panicked".to_string()
    };

    AppError::internal(detail, json!({ "panic": true })).into_response()
}

pub async fn terminal(State(rendering): State<ErrorRendering>, req: Request, next: Next) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    let response = next.run(req).await;

    let error = match response.extensions().get::<AppError>() {
        Some(error) => error.clone(),
        None if is_bodiless_error(&response) => AppError::from_status(response.status()),
        None => return response,
    };

    report(&error, &method, &path);

    let html = !is_under_prefix(&path, &rendering.api_prefix);
    render(&error, response, rendering.environment, html)
}

fn is_bodiless_error(response: &Response) -> bool {
    let status = response.status();
    (status.is_client_error() || status.is_server_error())
        && response.body().size_hint().exact() == Some(0)
}

fn report(error: &AppError, method: &Method, path: &str) {
    if error.is_operational() {
        if error.status().is_server_error() {
            tracing::warn!(%method, path, status = error.status().as_u16(), "{error}");
        } else {
            tracing::debug!(%method, path, status = error.status().as_u16(), "{error}");
        }
    } else {
        metrics::counter!("natours_programming_faults_total").increment(1);
        tracing::error!(
            %method,
            path,
            details = %error.details(),
            "ERROR 💥 {error}"
        );
    }
}

/// Replaces the body of `response` with the rendered error, keeping headers
/// such as `Retry-After` or CORS that earlier stages set.
fn render(error: &AppError, response: Response, environment: Environment, html: bool) -> Response {
    let verbose = !environment.is_production();
    let (mut parts, _) = response.into_parts();

    parts.status = error.status();
    parts.headers.remove(header::CONTENT_LENGTH);
    parts.headers.remove(header::CONTENT_ENCODING);

    let (content_type, body) = if html {
        let message = if verbose || error.is_operational() {
            error.message()
        } else {
            PAGE_FALLBACK_MESSAGE
        };
        let page = ErrorPage {
            title: PAGE_TITLE,
            message,
            status: error.status().as_u16(),
        };
        ("text/html; charset=utf-8", Body::from(page.to_html()))
    } else {
        let json = serde_json::to_vec(&error.to_json(verbose)).unwrap_or_else(|_| {
            br#"{"status":"error","message":"Something went very wrong!"}"#.to_vec()
        });
        ("application/json", Body::from(json))
    };

    parts
        .headers
        .insert(header::CONTENT_TYPE, HeaderValue::from_static(content_type));
    Response::from_parts(parts, body)
}
