//! Static asset stage: serves files from the public root before any parsing.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Request, State},
    http::Method,
    middleware::Next,
    response::Response,
};
use tower::ServiceExt;
use tower_http::services::ServeFile;

use crate::infrastructure::{AssetStore, ResolveError};

/// Serves `GET`/`HEAD` requests that resolve to a file under the asset root.
///
/// Everything else (other methods, directories, missing files) passes through
/// untouched. Content type, `Last-Modified` and range handling come from
/// [`ServeFile`].
pub async fn layer(
    State(assets): State<Arc<dyn AssetStore>>,
    req: Request,
    next: Next,
) -> Response {
    if !matches!(*req.method(), Method::GET | Method::HEAD) {
        return next.run(req).await;
    }

    let located = assets.locate(req.uri().path()).await;
    match located {
        Ok(path) => match ServeFile::new(path).oneshot(req).await {
            Ok(response) => response.map(Body::new),
            Err(never) => match never {},
        },
        Err(ResolveError::Forbidden) => {
            tracing::warn!(path = %req.uri().path(), "Rejected asset path outside the public root");
            next.run(req).await
        }
        Err(_) => next.run(req).await,
    }
}
