// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
// Shared fixtures for integration tests
#![allow(dead_code)]

use axum::body::Body;
use axum::http::{header, HeaderName, Request};
use axum::Router;
use image::{Rgb, RgbImage};
use labelsum_detect::api::{create_router, ApiKeyGate, AppState};
use labelsum_detect::pipeline::{DetectionPipeline, LabelAggregator, LabelPolicy};
use labelsum_detect::vision::{
    encode_png, Annotator, BoundingBox, Detection, Detector, DetectorError,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

pub const API_KEY: &str = "integration-secret";
pub const KEY_HEADER: &str = "access_token";
pub const SUM_HEADER: &str = "x-label-sum";
pub const BOUNDARY: &str = "labelsum-test-boundary";
pub const MAX_UPLOAD_BYTES: usize = 2 * 1024 * 1024;

/// Detector stub returning fixed labels and counting its calls
pub struct StubDetector {
    labels: Vec<String>,
    fail: bool,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl StubDetector {
    pub fn with_labels(labels: &[&str]) -> Self {
        Self {
            labels: labels.iter().map(|l| l.to_string()).collect(),
            fail: false,
            delay: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::with_labels(&[])
        }
    }

    pub fn slow(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::with_labels(&[])
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Detector for StubDetector {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn detect(&self, image: &RgbImage) -> Result<Vec<Detection>, DetectorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            std::thread::sleep(delay);
        }
        if self.fail {
            return Err(DetectorError::Inference("stub failure".to_string()));
        }

        // Boxes laid out left to right in the lower half of the image
        let (w, h) = (image.width() as f32, image.height() as f32);
        Ok(self
            .labels
            .iter()
            .enumerate()
            .map(|(i, label)| {
                let x1 = 4.0 + i as f32 * 28.0;
                let bbox = BoundingBox::new(x1, h * 0.5, x1 + 20.0, h - 4.0).clamp(w, h);
                Detection::new(bbox, i, label.as_str())
            })
            .collect())
    }
}

pub struct TestApp {
    pub router: Router,
    pub pipeline: Arc<DetectionPipeline>,
    pub detector: Arc<StubDetector>,
}

pub fn build_app(detector: StubDetector) -> TestApp {
    build_app_with(detector, LabelPolicy::Strict, Duration::from_secs(5))
}

pub fn build_app_with(detector: StubDetector, policy: LabelPolicy, timeout: Duration) -> TestApp {
    assemble(detector, policy, |pipeline| pipeline.with_detector_timeout(timeout))
}

/// App whose pipeline allows a single detector call at a time
pub fn build_single_slot_app(detector: StubDetector, timeout: Duration) -> TestApp {
    assemble(detector, LabelPolicy::Strict, |pipeline| {
        pipeline
            .with_detector_timeout(timeout)
            .with_max_concurrent_inferences(1)
    })
}

fn assemble(
    detector: StubDetector,
    policy: LabelPolicy,
    configure: impl FnOnce(DetectionPipeline) -> DetectionPipeline,
) -> TestApp {
    let detector = Arc::new(detector);
    let pipeline = Arc::new(configure(DetectionPipeline::new(
        detector.clone(),
        Annotator::new().unwrap(),
        LabelAggregator::new(policy),
    )));
    let state = AppState {
        gate: Arc::new(ApiKeyGate::new(KEY_HEADER, API_KEY).unwrap()),
        pipeline: pipeline.clone(),
        sum_header: HeaderName::from_static(SUM_HEADER),
        classes: 10,
    };

    TestApp {
        router: create_router(state, MAX_UPLOAD_BYTES),
        pipeline,
        detector,
    }
}

/// Deterministic gradient test image
pub fn test_image(width: u32, height: u32) -> RgbImage {
    RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x * 3 % 256) as u8, (y * 7 % 256) as u8, ((x + y) % 256) as u8])
    })
}

pub fn test_png(width: u32, height: u32) -> Vec<u8> {
    encode_png(&test_image(width, height)).unwrap()
}

/// Single-part multipart body
pub fn multipart_body(field: &str, file_name: &str, content: &[u8]) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
    body.extend_from_slice(
        format!(
            "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n",
            field, file_name
        )
        .as_bytes(),
    );
    body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
    body.extend_from_slice(content);
    body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());
    body
}

pub fn detect_request(uri: &str, key: Option<&str>, body: Vec<u8>) -> Request<Body> {
    let mut builder = Request::builder().method("POST").uri(uri).header(
        header::CONTENT_TYPE,
        format!("multipart/form-data; boundary={}", BOUNDARY),
    );
    if let Some(key) = key {
        builder = builder.header(KEY_HEADER, key);
    }
    builder.body(Body::from(body)).unwrap()
}

pub fn upload_request(image_bytes: &[u8]) -> Request<Body> {
    detect_request(
        "/detect",
        Some(API_KEY),
        multipart_body("file", "upload.png", image_bytes),
    )
}
