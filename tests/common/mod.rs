#![allow(dead_code)]

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use axum::{
    Json, Router,
    body::Bytes,
    extract::Query,
    http::header,
    response::IntoResponse,
    routing::{get, post},
};
use axum_test::TestServer;
use natours::config::{Environment, PipelineConfig, RateLimitConfig};
use natours::context::RequestContext;
use natours::pipeline;
use natours::routes::Collaborators;
use natours::state::AppState;
use serde_json::{Value, json};
use tempfile::TempDir;

/// Client address used by tests that do not care about rate limiting.
pub const CLIENT_IP: &str = "203.0.113.7";

/// Pipeline config for tests: identity from `X-Forwarded-For`, since the mock
/// transport carries no peer address.
pub fn test_config(environment: Environment, static_root: &Path) -> PipelineConfig {
    PipelineConfig {
        environment,
        static_root: static_root.to_path_buf(),
        rate_limit: RateLimitConfig {
            behind_proxy: true,
            ..RateLimitConfig::default()
        },
        ..PipelineConfig::default()
    }
}

/// Counts how many requests reached a collaborator handler.
#[derive(Clone, Default)]
pub struct HitCounter(Arc<AtomicUsize>);

impl HitCounter {
    pub fn hit(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }

    pub fn count(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

/// Echoes the sanitized request context back as JSON.
pub async fn echo_context(ctx: RequestContext) -> Json<Value> {
    Json(json!({
        "query": ctx.query,
        "queryPolluted": ctx.query_polluted,
        "body": ctx.body,
        "cookies": ctx.cookies,
        "receivedAt": ctx.received_at.map(|t| t.to_rfc3339()),
    }))
}

async fn explode() -> &'static str {
    panic!("template exploded")
}

/// Collaborators standing in for the Natours routers.
///
/// - `GET /` renders a small page; `GET /boom` panics
/// - tours echo the context and count hits; `/api/v1/tours/large` returns 4 KiB
///   and `/api/v1/tours/crash` panics
/// - `/api/v1/tours/raw-query` echoes what axum's `Query` extractor sees
/// - the webhook echoes its raw body and content type
pub fn collaborators(hits: HitCounter) -> Collaborators {
    let views = Router::new()
        .route("/", get(|| async { "<h1>All tours</h1>" }))
        .route("/boom", get(explode));

    let tours = Router::new()
        .route(
            "/",
            get(echo_context).post(move |ctx: RequestContext| {
                let hits = hits.clone();
                async move {
                    hits.hit();
                    echo_context(ctx).await
                }
            }),
        )
        .route("/large", get(|| async { "tour ".repeat(820) }))
        .route("/crash", get(explode))
        .route(
            "/raw-query",
            get(|Query(query): Query<HashMap<String, String>>| async move { Json(query) }),
        );

    let webhook = Router::new().route(
        "/webhook-checkout",
        post(|headers: axum::http::HeaderMap, body: Bytes| async move {
            let content_type = headers
                .get(header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default()
                .to_string();
            ([(header::CONTENT_TYPE, content_type)], body).into_response()
        }),
    );

    Collaborators {
        views,
        tours,
        webhook,
        ..Collaborators::default()
    }
}

pub struct TestApp {
    pub server: TestServer,
    pub hits: HitCounter,
    pub state: AppState,
    _public: TempDir,
}

/// Builds the full pipeline over a temporary public root holding
/// `css/style.css`.
pub fn make_app(environment: Environment) -> TestApp {
    make_app_with(environment, |_| {})
}

pub fn make_app_with(
    environment: Environment,
    configure: impl FnOnce(&mut PipelineConfig),
) -> TestApp {
    let public = TempDir::new().unwrap();
    std::fs::create_dir_all(public.path().join("css")).unwrap();
    std::fs::write(public.path().join("css/style.css"), "body { color: #55c57a; }").unwrap();

    let mut config = test_config(environment, public.path());
    configure(&mut config);

    let state = AppState::new(config);
    let hits = HitCounter::default();
    let app = pipeline::build(state.clone(), collaborators(hits.clone())).unwrap();

    TestApp {
        server: TestServer::new(app).unwrap(),
        hits,
        state,
        _public: public,
    }
}
