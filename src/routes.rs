//! Top-level router configuration.
//!
//! # Route Structure
//!
//! - `GET  /health`               - Pipeline health (public, not rate limited)
//! - `/`                          - Site views (collaborator)
//! - `/api/v1/tours/*`            - Tours API (collaborator)
//! - `/api/v1/users/*`            - Users API (collaborator)
//! - `/api/v1/reviews/*`          - Reviews API (collaborator)
//! - `/api/v1/bookings/*`         - Bookings API (collaborator)
//! - `POST /webhook-checkout`     - Payment webhook, raw body (collaborator)
//! - `/*`                         - Files under the static root
//!
//! Stage order and middleware are described in [`crate::pipeline`].

use axum::Router;
use tower::Layer;
use tower_http::normalize_path::{NormalizePath, NormalizePathLayer};

use crate::pipeline;
use crate::state::AppState;

/// Route handler collaborators the pipeline mounts but does not implement.
///
/// Each router is opaque to the pipeline. API routers are nested under
/// `{API_PREFIX}/v1/<resource>` and see paths relative to that mount point;
/// `views` is merged at the root; `webhook` receives `POST {WEBHOOK_PATH}`
/// with the untouched body and must route that full path itself.
///
/// Handlers read sanitized input through the [`crate::context::RequestContext`]
/// extractor and fail with [`crate::AppError`].
#[derive(Default)]
pub struct Collaborators {
    pub views: Router,
    pub tours: Router,
    pub users: Router,
    pub reviews: Router,
    pub bookings: Router,
    pub webhook: Router,
}

/// Builds the pipeline and normalizes trailing slashes ahead of routing.
///
/// # Errors
///
/// Fails if the pipeline cannot be assembled from the configuration.
pub fn app_router(
    state: AppState,
    collaborators: Collaborators,
) -> anyhow::Result<NormalizePath<Router>> {
    let router = pipeline::build(state, collaborators)?;
    Ok(NormalizePathLayer::trim_trailing_slash().layer(router))
}
