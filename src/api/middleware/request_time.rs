//! Context annotation stage: stamps when the request reached the handlers.

use axum::{extract::Request, middleware::Next, response::Response};
use chrono::Utc;

use crate::context::RequestContext;

pub async fn layer(mut req: Request, next: Next) -> Response {
    RequestContext::update(&mut req, |ctx| ctx.received_at = Some(Utc::now()));
    next.run(req).await
}
