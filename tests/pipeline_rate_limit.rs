mod common;

use axum::http::StatusCode;
use natours::api::middleware::rate_limit::LIMIT_MESSAGE;
use natours::config::Environment;
use serde_json::Value;

const LIMIT: u32 = 3;

fn make_app() -> common::TestApp {
    common::make_app_with(Environment::Production, |config| {
        config.rate_limit.max_requests = LIMIT;
    })
}

#[tokio::test]
async fn test_limit_exceeded_returns_429() {
    let app = make_app();

    for expected_remaining in (0..LIMIT).rev() {
        let response = app
            .server
            .get("/api/v1/tours")
            .add_header("X-Forwarded-For", "198.51.100.1")
            .await;
        response.assert_status_ok();
        assert_eq!(response.header("x-ratelimit-limit"), "3");
        assert_eq!(
            response.header("x-ratelimit-remaining"),
            expected_remaining.to_string().as_str()
        );
        assert!(response.maybe_header("x-ratelimit-reset").is_some());
    }

    let response = app
        .server
        .get("/api/v1/tours")
        .add_header("X-Forwarded-For", "198.51.100.1")
        .await;

    response.assert_status(StatusCode::TOO_MANY_REQUESTS);
    assert!(response.maybe_header("retry-after").is_some());
    let json = response.json::<Value>();
    assert_eq!(json["status"], "fail");
    assert_eq!(json["message"], LIMIT_MESSAGE);
}

#[tokio::test]
async fn test_limited_requests_never_reach_handler() {
    let app = make_app();

    for _ in 0..LIMIT + 2 {
        app.server
            .post("/api/v1/tours")
            .add_header("X-Forwarded-For", "198.51.100.2")
            .json(&serde_json::json!({ "name": "x" }))
            .await;
    }

    assert_eq!(app.hits.count(), LIMIT as usize);
}

#[tokio::test]
async fn test_clients_are_counted_separately() {
    let app = make_app();

    for _ in 0..=LIMIT {
        app.server
            .get("/api/v1/tours")
            .add_header("X-Forwarded-For", "198.51.100.3")
            .await;
    }

    let response = app
        .server
        .get("/api/v1/tours")
        .add_header("X-Forwarded-For", "198.51.100.4")
        .await;

    response.assert_status_ok();
    assert_eq!(app.state.limiter.tracked_clients(), 2);
}

#[tokio::test]
async fn test_unmatched_api_paths_count_too() {
    let app = make_app();

    for _ in 0..LIMIT {
        app.server
            .get("/api/v1/nothing-here")
            .add_header("X-Forwarded-For", "198.51.100.5")
            .await
            .assert_status_not_found();
    }

    app.server
        .get("/api/v1/nothing-here")
        .add_header("X-Forwarded-For", "198.51.100.5")
        .await
        .assert_status(StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
async fn test_site_pages_are_not_limited() {
    let app = make_app();

    for _ in 0..LIMIT * 2 {
        let response = app
            .server
            .get("/")
            .add_header("X-Forwarded-For", "198.51.100.6")
            .await;
        response.assert_status_ok();
        assert!(response.maybe_header("x-ratelimit-limit").is_none());
    }
}
