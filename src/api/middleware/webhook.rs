//! Raw-body passthrough for the payment webhook.
//!
//! The payment processor signs the exact bytes it sends, so the webhook
//! collaborator must see the body before any parser touches it. This stage sits
//! ahead of body parsing and hands `POST <webhook path>` straight to the
//! webhook router; the rest of the pipeline never sees those requests.

use std::sync::Arc;

use axum::{
    Router,
    extract::{Request, State},
    http::Method,
    middleware::Next,
    response::Response,
};
use tower::ServiceExt;

#[derive(Clone)]
pub struct WebhookRoute {
    pub path: Arc<str>,
    pub router: Router,
}

pub async fn layer(State(hook): State<WebhookRoute>, req: Request, next: Next) -> Response {
    if req.method() != Method::POST || req.uri().path() != &*hook.path {
        return next.run(req).await;
    }

    tracing::debug!(path = %hook.path, "Dispatching webhook with unparsed body");
    match hook.router.oneshot(req).await {
        Ok(response) => response,
        Err(never) => match never {},
    }
}
