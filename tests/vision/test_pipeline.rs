// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
// DetectionPipeline driven directly, without the HTTP layer

use crate::common::*;
use bytes::Bytes;
use labelsum_detect::pipeline::{DetectionPipeline, LabelAggregator, LabelPolicy, PipelineError};
use labelsum_detect::vision::{class_color, decode_rgb_image, Annotator};
use std::sync::Arc;

fn pipeline(detector: Arc<StubDetector>, permits: usize) -> Arc<DetectionPipeline> {
    Arc::new(
        DetectionPipeline::new(
            detector,
            Annotator::new().unwrap(),
            LabelAggregator::new(LabelPolicy::Strict),
        )
        .with_max_concurrent_inferences(permits),
    )
}

#[test]
fn test_process_on_current_thread_runtime() {
    let detector = Arc::new(StubDetector::with_labels(&["5", "3", "NULL", "JOK", "2"]));
    let pipeline = pipeline(detector.clone(), 1);

    let output = tokio_test::block_on(pipeline.process(Bytes::from(test_png(180, 90)))).unwrap();

    assert_eq!(output.label_sum, 10);
    assert_eq!(output.detections.len(), 5);
    assert_eq!(detector.calls(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_requests_are_isolated() {
    let detector = Arc::new(StubDetector::with_labels(&["1", "2", "NULL"]));
    let pipeline = pipeline(detector.clone(), 2);
    let input = Bytes::from(test_png(100, 60));

    let handles: Vec<_> = (0..8)
        .map(|_| tokio::spawn(Arc::clone(&pipeline).process(input.clone())))
        .collect();

    let mut outputs = Vec::new();
    for handle in handles {
        outputs.push(handle.await.unwrap().unwrap());
    }

    assert_eq!(detector.calls(), 8);
    for output in &outputs {
        assert_eq!(output.label_sum, 3);
        assert_eq!(output.png, outputs[0].png);
    }
    assert_eq!(pipeline.stats().detect_calls, 8);
    assert_eq!(pipeline.stats().failures, 0);
}

#[tokio::test]
async fn test_class_color_is_stable_across_images() {
    let detector = Arc::new(StubDetector::with_labels(&["1"]));
    let pipeline = pipeline(detector, 1);

    // Class 0 box ends at (24, h - 4) in both images
    for (w, h) in [(80u32, 60u32), (140, 100)] {
        let output = Arc::clone(&pipeline)
            .process(Bytes::from(test_png(w, h)))
            .await
            .unwrap();
        let (image, _) = decode_rgb_image(&output.png, usize::MAX, u32::MAX).unwrap();
        assert_eq!(*image.get_pixel(24, h - 4), class_color(0));
    }
}

#[tokio::test]
async fn test_truncated_upload_is_invalid_image() {
    let detector = Arc::new(StubDetector::with_labels(&["1"]));
    let pipeline = pipeline(detector.clone(), 1);
    let mut png = test_png(64, 64);
    png.truncate(png.len() / 2);

    let err = Arc::clone(&pipeline)
        .process(Bytes::from(png))
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineError::InvalidImage(_)));
    assert_eq!(detector.calls(), 0);
}
