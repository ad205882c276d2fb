//! Integration tests for the operator API
//!
//! Requests go straight to the router with `tower::ServiceExt::oneshot`.

mod common;

use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;
use wiremock::matchers::{method, path};
use wiremock::{Mock, ResponseTemplate};

use common::{MockStore, TestHarness};
use seft_publisher::api::{self, AppState};
use seft_publisher::scheduler::Scheduler;

fn app(harness: &TestHarness, scheduler: &Scheduler) -> Router {
    api::router(AppState {
        coordinator: harness.coordinator.clone(),
        health: harness.health(),
        trigger: scheduler.trigger_handle(),
    })
}

fn scheduler(harness: &TestHarness) -> Scheduler {
    Scheduler::new(harness.coordinator.clone(), harness.config.schedule.clone())
}

async fn send(app: Router, method: Method, uri: &str) -> (StatusCode, Value) {
    let response = app
        .oneshot(Request::builder().method(method).uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();

    let status = response.status();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    (status, serde_json::from_slice(&body).unwrap())
}

async fn ingestion_alive(harness: &TestHarness, alive: bool) {
    let status = if alive { 200 } else { 503 };
    Mock::given(method("HEAD"))
        .and(path("/healthcheck"))
        .respond_with(ResponseTemplate::new(status))
        .mount(&harness.ingest)
        .await;
}

#[tokio::test]
async fn test_healthcheck_ok() {
    let harness = TestHarness::start(MockStore::empty()).await;
    ingestion_alive(&harness, true).await;
    let scheduler = scheduler(&harness);

    let (status, body) = send(app(&harness, &scheduler), Method::GET, "/healthcheck").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "OK");
    assert_eq!(body["remote_store"], "OK");
    assert_eq!(body["ingestion_endpoint"], "OK");
    assert_eq!(harness.store.noops.load(std::sync::atomic::Ordering::SeqCst), 1);
    assert_eq!(harness.store.close_count(), 1);
}

#[tokio::test]
async fn test_healthcheck_reports_ingestion_down() {
    let harness = TestHarness::start(MockStore::empty()).await;
    ingestion_alive(&harness, false).await;
    let scheduler = scheduler(&harness);

    let (status, body) = send(app(&harness, &scheduler), Method::GET, "/healthcheck").await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["status"], "FAILED");
    assert_eq!(body["remote_store"], "OK");
    assert_eq!(body["ingestion_endpoint"], "FAILED");
}

#[tokio::test]
async fn test_healthcheck_reports_remote_store_down() {
    let store = MockStore::empty();
    store.refuse_connects(true);
    let harness = TestHarness::start(store).await;
    ingestion_alive(&harness, true).await;
    let scheduler = scheduler(&harness);

    let (status, body) = send(app(&harness, &scheduler), Method::GET, "/healthcheck").await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["remote_store"], "FAILED");
    assert_eq!(body["ingestion_endpoint"], "OK");
}

#[tokio::test]
async fn test_recent_lists_cycles_newest_first() {
    let store = MockStore::with_files(&[("a.xlsx", b"a")]);
    let harness = TestHarness::start(store.clone()).await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&harness.ingest)
        .await;

    store.refuse_connects(true);
    harness.coordinator.run_cycle().await.unwrap();
    store.refuse_connects(false);
    harness.coordinator.run_cycle().await.unwrap();

    let scheduler = scheduler(&harness);
    let (status, body) = send(app(&harness, &scheduler), Method::GET, "/recent").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["state"], "idle");
    let cycles = body["cycles"].as_array().unwrap();
    assert_eq!(cycles.len(), 2);
    assert_eq!(cycles[0]["status"], "completed");
    assert_eq!(cycles[0]["deleted"], 1);
    assert_eq!(cycles[1]["status"], "aborted");
}

#[tokio::test]
async fn test_trigger_is_accepted() {
    let harness = TestHarness::start(MockStore::empty()).await;
    let scheduler = scheduler(&harness);

    let (status, body) = send(app(&harness, &scheduler), Method::POST, "/trigger").await;

    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["accepted"], true);
}

#[tokio::test]
async fn test_unknown_route() {
    let harness = TestHarness::start(MockStore::empty()).await;
    let scheduler = scheduler(&harness);

    let response = app(&harness, &scheduler)
        .oneshot(Request::builder().uri("/nope").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
