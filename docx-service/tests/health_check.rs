mod common;

use chrono::{DateTime, Utc};
use common::TestApp;
use docx_service::services::init_metrics;

#[tokio::test]
async fn root_reports_running_with_environment() {
    let app = TestApp::spawn().await;

    let response = app
        .client
        .get(&app.address)
        .send()
        .await
        .expect("Failed to execute request");

    assert!(response.status().is_success());
    assert!(response.headers().contains_key("x-request-id"));
    assert_eq!(response.headers()["x-content-type-options"], "nosniff");

    let body: serde_json::Value = response.json().await.expect("Failed to parse JSON");
    assert_eq!(body["status"], "running");
    assert_eq!(body["environment"], "test");
    assert!(body["message"].as_str().is_some_and(|m| !m.is_empty()));
    let time = body["timeUtc"].as_str().expect("timeUtc missing");
    assert!(time.ends_with('Z'));
    DateTime::parse_from_rfc3339(time).expect("timeUtc is not RFC 3339");
}

#[tokio::test]
async fn root_timestamps_do_not_decrease() {
    let app = TestApp::spawn().await;

    let mut previous: Option<DateTime<Utc>> = None;
    for _ in 0..3 {
        let body: serde_json::Value = app
            .client
            .get(&app.address)
            .send()
            .await
            .expect("Failed to execute request")
            .json()
            .await
            .expect("Failed to parse JSON");

        let time = DateTime::parse_from_rfc3339(body["timeUtc"].as_str().unwrap())
            .unwrap()
            .with_timezone(&Utc);
        if let Some(previous) = previous {
            assert!(time >= previous);
        }
        previous = Some(time);
    }
}

#[tokio::test]
async fn health_check_works() {
    let app = TestApp::spawn().await;

    let response = app
        .client
        .get(format!("{}/health", app.address))
        .send()
        .await
        .expect("Failed to execute request");

    assert!(response.status().is_success());

    let body: serde_json::Value = response.json().await.expect("Failed to parse JSON");
    assert_eq!(body["status"], "ok");
    assert_eq!(body["service"], "docx-service");
}

#[tokio::test]
async fn metrics_endpoint_returns_prometheus_format() {
    init_metrics();
    let app = TestApp::spawn().await;

    let response = app
        .client
        .get(format!("{}/metrics", app.address))
        .send()
        .await
        .expect("Failed to execute request");

    assert!(response.status().is_success());

    let content_type = response
        .headers()
        .get("content-type")
        .expect("Missing content-type header")
        .to_str()
        .expect("Invalid content-type");
    assert!(content_type.starts_with("text/plain"));

    let body = response.text().await.expect("Failed to get response body");
    assert!(
        body.is_empty() || body.contains('#') || body.contains('_'),
        "Unexpected metrics format: {}",
        body
    );
}
