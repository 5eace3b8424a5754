// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
// GET /health is open and reports the detector

use crate::common::*;
use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use labelsum_detect::api::HealthResponse;
use tower::ServiceExt;

#[tokio::test]
async fn test_health_needs_no_key() {
    let app = build_app(StubDetector::with_labels(&[]));
    let request = Request::builder()
        .uri("/health")
        .body(Body::empty())
        .unwrap();

    let response = app.router.clone().oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let health: HealthResponse = serde_json::from_slice(&body).unwrap();
    assert_eq!(health.status, "healthy");
    assert_eq!(health.detector, "stub");
    assert_eq!(health.classes, 10);
    assert_eq!(health.version, labelsum_detect::version::VERSION_NUMBER);
}

#[tokio::test]
async fn test_detect_rejects_get() {
    let app = build_app(StubDetector::with_labels(&[]));
    let request = Request::builder()
        .uri("/detect")
        .header(KEY_HEADER, API_KEY)
        .body(Body::empty())
        .unwrap();

    let response = app.router.clone().oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(app.detector.calls(), 0);
}
