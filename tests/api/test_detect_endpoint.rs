// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
// POST /detect end-to-end through the router with a stub detector

use crate::common::*;
use axum::body::to_bytes;
use axum::http::{header, StatusCode};
use axum::response::Response;
use labelsum_detect::api::ErrorResponse;
use labelsum_detect::pipeline::LabelPolicy;
use labelsum_detect::vision::{class_color, decode_rgb_image};
use std::time::Duration;
use tower::ServiceExt;

async fn body_bytes(response: Response) -> Vec<u8> {
    to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec()
}

async fn error_body(response: Response) -> ErrorResponse {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

fn sum_header(response: &Response) -> String {
    response.headers()[SUM_HEADER].to_str().unwrap().to_string()
}

#[tokio::test]
async fn test_sum_excludes_sentinels() {
    let app = build_app(StubDetector::with_labels(&["5", "3", "NULL", "JOK", "2"]));

    let response = app
        .router
        .clone()
        .oneshot(upload_request(&test_png(200, 120)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "image/png");
    assert_eq!(sum_header(&response), "10");
    assert!(response.headers().contains_key("x-request-id"));

    let png = body_bytes(response).await;
    let (image, info) = decode_rgb_image(&png, usize::MAX, u32::MAX).unwrap();
    assert_eq!((info.width, info.height), (200, 120));
    assert_ne!(image, test_image(200, 120));
}

#[tokio::test]
async fn test_leading_zeros_parse_as_decimal() {
    let app = build_app(StubDetector::with_labels(&["007"]));

    let response = app
        .router
        .clone()
        .oneshot(upload_request(&test_png(64, 64)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(sum_header(&response), "7");
}

#[tokio::test]
async fn test_zero_detections_return_input_pixels() {
    let app = build_app(StubDetector::with_labels(&[]));

    let response = app
        .router
        .clone()
        .oneshot(upload_request(&test_png(90, 70)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(sum_header(&response), "0");
    let (image, _) = decode_rgb_image(&body_bytes(response).await, usize::MAX, u32::MAX).unwrap();
    assert_eq!(image, test_image(90, 70));
}

#[tokio::test]
async fn test_identical_requests_give_identical_responses() {
    let app = build_app(StubDetector::with_labels(&["4", "NULL", "9"]));
    let input = test_png(128, 96);

    let first = app.router.clone().oneshot(upload_request(&input)).await.unwrap();
    let second = app.router.clone().oneshot(upload_request(&input)).await.unwrap();

    assert_eq!(sum_header(&first), sum_header(&second));
    assert_eq!(sum_header(&first), "13");
    assert_eq!(body_bytes(first).await, body_bytes(second).await);
    assert_eq!(app.detector.calls(), 2);
}

#[tokio::test]
async fn test_box_colors_follow_class_index() {
    let app = build_app(StubDetector::with_labels(&["1", "2"]));

    let response = app
        .router
        .clone()
        .oneshot(upload_request(&test_png(120, 80)))
        .await
        .unwrap();
    let (image, _) = decode_rgb_image(&body_bytes(response).await, usize::MAX, u32::MAX).unwrap();

    // Bottom-right corners of the stub boxes (class 0 at x=4, class 1 at x=32)
    assert_eq!(*image.get_pixel(24, 76), class_color(0));
    assert_eq!(*image.get_pixel(52, 76), class_color(1));
}

#[tokio::test]
async fn test_trailing_slash_route() {
    let app = build_app(StubDetector::with_labels(&["1"]));
    let request = detect_request(
        "/detect/",
        Some(API_KEY),
        multipart_body("file", "a.png", &test_png(48, 48)),
    );

    let response = app.router.clone().oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(sum_header(&response), "1");
}

#[tokio::test]
async fn test_undecodable_upload_is_invalid_image() {
    let app = build_app(StubDetector::with_labels(&["1"]));

    let response = app
        .router
        .clone()
        .oneshot(upload_request(b"this is not an image"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let error = error_body(response).await;
    assert_eq!(error.error_type, "invalid_image");
    assert!(error.request_id.is_some());

    let stats = app.pipeline.stats();
    assert_eq!(stats.decode_calls, 1);
    assert_eq!(stats.detect_calls, 0);
    assert_eq!(stats.encode_calls, 0);
    assert_eq!(app.detector.calls(), 0);
}

#[tokio::test]
async fn test_missing_file_field_is_invalid_request() {
    let app = build_app(StubDetector::with_labels(&["1"]));
    let request = detect_request(
        "/detect",
        Some(API_KEY),
        multipart_body("image", "a.png", &test_png(16, 16)),
    );

    let response = app.router.clone().oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(error_body(response).await.error_type, "invalid_request");
    assert_eq!(app.pipeline.stats().decode_calls, 0);
}

#[tokio::test]
async fn test_non_numeric_label_is_rejected_under_strict_policy() {
    let app = build_app(StubDetector::with_labels(&["5", "car"]));

    let response = app
        .router
        .clone()
        .oneshot(upload_request(&test_png(96, 64)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let error = error_body(response).await;
    assert_eq!(error.error_type, "label_parse_failure");
    assert_eq!(error.details.unwrap()["label"], serde_json::json!("car"));
    assert_eq!(app.pipeline.stats().encode_calls, 0);
}

#[tokio::test]
async fn test_non_numeric_label_is_skipped_under_skip_policy() {
    let app = build_app_with(
        StubDetector::with_labels(&["5", "car", "JOK"]),
        LabelPolicy::Skip,
        Duration::from_secs(5),
    );

    let response = app
        .router
        .clone()
        .oneshot(upload_request(&test_png(120, 64)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(sum_header(&response), "5");
}

#[tokio::test]
async fn test_detector_failure_is_bad_gateway() {
    let app = build_app(StubDetector::failing());

    let response = app
        .router
        .clone()
        .oneshot(upload_request(&test_png(32, 32)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    assert_eq!(error_body(response).await.error_type, "detector_failure");
    assert_eq!(app.pipeline.stats().failures, 1);
}

#[tokio::test]
async fn test_slow_detector_times_out() {
    let app = build_app_with(
        StubDetector::slow(Duration::from_millis(500)),
        LabelPolicy::Strict,
        Duration::from_millis(20),
    );

    let response = app
        .router
        .clone()
        .oneshot(upload_request(&test_png(32, 32)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);
    assert_eq!(error_body(response).await.error_type, "timeout");
}

#[tokio::test]
async fn test_busy_detector_slot_is_service_unavailable() {
    let app = build_single_slot_app(
        StubDetector::slow(Duration::from_millis(800)),
        Duration::from_millis(50),
    );

    let first = app
        .router
        .clone()
        .oneshot(upload_request(&test_png(32, 32)))
        .await
        .unwrap();
    assert_eq!(first.status(), StatusCode::GATEWAY_TIMEOUT);

    let started = std::time::Instant::now();
    let second = app
        .router
        .clone()
        .oneshot(upload_request(&test_png(32, 32)))
        .await
        .unwrap();

    assert!(started.elapsed() < Duration::from_millis(400));
    assert_eq!(second.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert!(second.headers().contains_key("x-request-id"));
    assert_eq!(error_body(second).await.error_type, "service_unavailable");
    assert_eq!(app.detector.calls(), 1);
}

#[tokio::test]
async fn test_upload_over_limit_is_rejected() {
    let app = build_app(StubDetector::with_labels(&[]));
    let oversized = vec![0u8; MAX_UPLOAD_BYTES + 1024];

    let response = app
        .router
        .clone()
        .oneshot(upload_request(&oversized))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(app.detector.calls(), 0);
}
