mod common;

use axum::body::Bytes;
use natours::config::Environment;

#[tokio::test]
async fn test_webhook_receives_exact_bytes() {
    let app = common::make_app(Environment::Production);
    let payload: &'static [u8] =
        b"{\"type\":\"checkout.session.completed\",  \"data\":{\"object\":{\"amount_total\":49700}}}\n";

    let response = app
        .server
        .post("/webhook-checkout")
        .bytes(Bytes::from_static(payload))
        .content_type("application/json")
        .await;

    response.assert_status_ok();
    assert_eq!(response.as_bytes().as_ref(), payload);
    assert_eq!(response.header("content-type"), "application/json");
}

#[tokio::test]
async fn test_webhook_accepts_invalid_json_untouched() {
    let app = common::make_app(Environment::Production);
    let payload: &'static [u8] = b"{\"$where\": \"<script>\", broken";

    let response = app
        .server
        .post("/webhook-checkout")
        .bytes(Bytes::from_static(payload))
        .content_type("application/json")
        .await;

    response.assert_status_ok();
    assert_eq!(response.as_bytes().as_ref(), payload);
}

#[tokio::test]
async fn test_webhook_is_not_subject_to_body_cap() {
    let app = common::make_app(Environment::Production);
    let payload = format!("{{\"blob\":\"{}\"}}", "z".repeat(20 * 1024));

    let response = app
        .server
        .post("/webhook-checkout")
        .bytes(Bytes::from(payload.clone()))
        .content_type("application/json")
        .await;

    response.assert_status_ok();
    assert_eq!(response.as_bytes().as_ref(), payload.as_bytes());
}

#[tokio::test]
async fn test_other_paths_still_parse_bodies() {
    let app = common::make_app(Environment::Production);

    let response = app
        .server
        .post("/api/v1/tours")
        .add_header("X-Forwarded-For", common::CLIENT_IP)
        .bytes(Bytes::from_static(b"{\"type\": broken"))
        .content_type("application/json")
        .await;

    response.assert_status_bad_request();
}

#[tokio::test]
async fn test_webhook_path_only_claims_post() {
    let app = common::make_app(Environment::Production);

    let response = app.server.get("/webhook-checkout").await;

    response.assert_status_not_found();
}
