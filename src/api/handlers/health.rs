//! Handler for health check endpoint.

use axum::{Json, extract::State, http::StatusCode};

use crate::api::dto::health::{CheckStatus, HealthChecks, HealthResponse};
use crate::state::AppState;

/// Returns pipeline health status with component checks.
///
/// # Endpoint
///
/// `GET /health`
///
/// # Response Codes
///
/// - **200 OK**: All components healthy
/// - **503 Service Unavailable**: One or more components degraded
///
/// # Components Checked
///
/// 1. **Static assets**: The public root exists and is a directory
/// 2. **Rate limiter**: Reports limit, window and tracked clients
///
/// # Response
///
/// ```json
/// {
///   "status": "healthy",
///   "version": "0.1.0",
///   "environment": "production",
///   "checks": {
///     "static_assets": { "status": "ok", "message": "Serving public" },
///     "rate_limiter": { "status": "ok", "message": "100 per 3600s, 12 clients tracked" }
///   }
/// }
/// ```
pub async fn health_handler(
    State(state): State<AppState>,
) -> Result<Json<HealthResponse>, (StatusCode, Json<HealthResponse>)> {
    let assets_check = check_static_assets(&state).await;
    let limiter_check = check_rate_limiter(&state);

    let all_healthy = assets_check.status == "ok" && limiter_check.status == "ok";

    let response = HealthResponse {
        status: if all_healthy { "healthy" } else { "degraded" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        environment: state.config.environment.to_string(),
        checks: HealthChecks {
            static_assets: assets_check,
            rate_limiter: limiter_check,
        },
    };

    if all_healthy {
        Ok(Json(response))
    } else {
        Err((StatusCode::SERVICE_UNAVAILABLE, Json(response)))
    }
}

/// Checks that the static root is a readable directory.
async fn check_static_assets(state: &AppState) -> CheckStatus {
    let root = &state.config.static_root;
    match tokio::fs::metadata(root).await {
        Ok(meta) if meta.is_dir() => CheckStatus {
            status: "ok".to_string(),
            message: Some(format!("Serving {}", root.display())),
        },
        Ok(_) => CheckStatus {
            status: "error".to_string(),
            message: Some(format!("{} is not a directory", root.display())),
        },
        Err(e) => CheckStatus {
            status: "error".to_string(),
            message: Some(format!("Static root unavailable: {}", e)),
        },
    }
}

/// Reports rate limiter settings and load.
fn check_rate_limiter(state: &AppState) -> CheckStatus {
    let limiter = &state.limiter;
    CheckStatus {
        status: "ok".to_string(),
        message: Some(format!(
            "{} per {}s, {} clients tracked",
            limiter.max_requests(),
            limiter.window().as_secs(),
            limiter.tracked_clients()
        )),
    }
}
