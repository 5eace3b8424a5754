// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Detection request pipeline
//!
//! decode -> detect -> annotate + aggregate -> encode
//!
//! The synchronous stages are plain functions over request-local data. The
//! async [`DetectionPipeline::process`] entry point runs each stage on the
//! blocking thread pool, bounds concurrent detector calls with a semaphore and
//! enforces the detector timeout.

pub mod aggregate;

use bytes::Bytes;
use image::RgbImage;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use crate::vision::{
    decode_rgb_image, encode_png, Annotator, Detection, Detector, DetectorError, ImageError,
    ImageInfo,
};

pub use aggregate::{AggregateError, LabelAggregator, LabelPolicy, DEFAULT_SENTINELS};

/// Default upper bound on a single detector call
pub const DEFAULT_DETECTOR_TIMEOUT: Duration = Duration::from_secs(30);

/// Default number of detector calls allowed to run at once
pub const DEFAULT_MAX_CONCURRENT_INFERENCES: usize = 4;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Invalid image: {0}")]
    InvalidImage(#[source] ImageError),

    #[error("Detector failed: {0}")]
    Detector(#[from] DetectorError),

    #[error("Detector timed out after {0:?}")]
    DetectorTimeout(Duration),

    #[error("Label aggregation failed: {0}")]
    LabelParse(#[from] AggregateError),

    #[error("Encoding failed: {0}")]
    Encode(#[source] ImageError),

    #[error("Pipeline unavailable: {0}")]
    Unavailable(String),

    #[error("Pipeline task failed: {0}")]
    Task(String),
}

/// Result of one pipeline run
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    /// PNG-encoded annotated image
    pub png: Vec<u8>,
    /// Sum of numeric, non-sentinel labels
    pub label_sum: i64,
    /// Detections in detector order
    pub detections: Vec<Detection>,
    /// Decoded input metadata
    pub info: ImageInfo,
}

/// Stage call counters (monotonic, process lifetime)
#[derive(Debug, Default)]
pub struct PipelineStats {
    decode_calls: AtomicU64,
    detect_calls: AtomicU64,
    encode_calls: AtomicU64,
    failures: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PipelineStatsSnapshot {
    pub decode_calls: u64,
    pub detect_calls: u64,
    pub encode_calls: u64,
    pub failures: u64,
}

impl PipelineStats {
    pub fn snapshot(&self) -> PipelineStatsSnapshot {
        PipelineStatsSnapshot {
            decode_calls: self.decode_calls.load(Ordering::Relaxed),
            detect_calls: self.detect_calls.load(Ordering::Relaxed),
            encode_calls: self.encode_calls.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
        }
    }
}

/// Immutable, shareable request pipeline
pub struct DetectionPipeline {
    detector: Arc<dyn Detector>,
    annotator: Annotator,
    aggregator: LabelAggregator,
    max_image_bytes: usize,
    max_image_dimension: u32,
    detector_timeout: Duration,
    inference_permits: Arc<Semaphore>,
    stats: PipelineStats,
}

impl std::fmt::Debug for DetectionPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DetectionPipeline")
            .field("detector", &self.detector.name())
            .field("aggregator", &self.aggregator)
            .field("max_image_bytes", &self.max_image_bytes)
            .field("max_image_dimension", &self.max_image_dimension)
            .field("detector_timeout", &self.detector_timeout)
            .finish_non_exhaustive()
    }
}

impl DetectionPipeline {
    pub fn new(
        detector: Arc<dyn Detector>,
        annotator: Annotator,
        aggregator: LabelAggregator,
    ) -> Self {
        Self {
            detector,
            annotator,
            aggregator,
            max_image_bytes: crate::vision::image_utils::MAX_IMAGE_SIZE,
            max_image_dimension: crate::vision::image_utils::MAX_IMAGE_DIMENSION,
            detector_timeout: DEFAULT_DETECTOR_TIMEOUT,
            inference_permits: Arc::new(Semaphore::new(DEFAULT_MAX_CONCURRENT_INFERENCES)),
            stats: PipelineStats::default(),
        }
    }

    pub fn with_max_image_bytes(mut self, max_image_bytes: usize) -> Self {
        self.max_image_bytes = max_image_bytes;
        self
    }

    pub fn with_max_image_dimension(mut self, max_image_dimension: u32) -> Self {
        self.max_image_dimension = max_image_dimension;
        self
    }

    pub fn with_detector_timeout(mut self, timeout: Duration) -> Self {
        self.detector_timeout = timeout;
        self
    }

    pub fn with_max_concurrent_inferences(mut self, permits: usize) -> Self {
        self.inference_permits = Arc::new(Semaphore::new(permits.max(1)));
        self
    }

    pub fn detector_name(&self) -> &'static str {
        self.detector.name()
    }

    pub fn label_policy(&self) -> LabelPolicy {
        self.aggregator.policy()
    }

    pub fn stats(&self) -> PipelineStatsSnapshot {
        self.stats.snapshot()
    }

    /// Decode upload bytes into an RGB image
    pub fn decode(&self, bytes: &[u8]) -> Result<(RgbImage, ImageInfo), PipelineError> {
        self.stats.decode_calls.fetch_add(1, Ordering::Relaxed);
        decode_rgb_image(bytes, self.max_image_bytes, self.max_image_dimension)
            .map_err(PipelineError::InvalidImage)
    }

    /// Run the detector on a decoded image
    pub fn detect(&self, image: &RgbImage) -> Result<Vec<Detection>, PipelineError> {
        self.stats.detect_calls.fetch_add(1, Ordering::Relaxed);
        Ok(self.detector.detect(image)?)
    }

    /// Annotate, aggregate and encode; consumes the request image
    pub fn render(
        &self,
        mut image: RgbImage,
        detections: &[Detection],
    ) -> Result<(Vec<u8>, i64), PipelineError> {
        let label_sum = self
            .aggregator
            .sum(detections.iter().map(|d| d.label.as_str()))?;

        self.annotator.annotate(&mut image, detections);

        self.stats.encode_calls.fetch_add(1, Ordering::Relaxed);
        let png = encode_png(&image).map_err(PipelineError::Encode)?;
        Ok((png, label_sum))
    }

    /// Run every stage on the calling thread
    pub fn run(&self, bytes: &[u8]) -> Result<PipelineOutput, PipelineError> {
        let result = self.run_stages(bytes);
        if result.is_err() {
            self.stats.failures.fetch_add(1, Ordering::Relaxed);
        }
        result
    }

    fn run_stages(&self, bytes: &[u8]) -> Result<PipelineOutput, PipelineError> {
        let (image, info) = self.decode(bytes)?;
        let detections = self.detect(&image)?;
        let (png, label_sum) = self.render(image, &detections)?;
        Ok(PipelineOutput {
            png,
            label_sum,
            detections,
            info,
        })
    }

    /// Run the pipeline off the async executor
    ///
    /// Decode and render run on the blocking pool. The detector call also runs
    /// there, gated by the inference semaphore. The detector timeout is one
    /// deadline over the permit wait and the call: running out while waiting
    /// for a slot is [`PipelineError::Unavailable`], running out during the
    /// call is [`PipelineError::DetectorTimeout`]. A timed-out call keeps
    /// running detached and keeps its permit until it finishes; its result is
    /// dropped.
    pub async fn process(self: Arc<Self>, bytes: Bytes) -> Result<PipelineOutput, PipelineError> {
        let started = Instant::now();
        let result = Arc::clone(&self).process_stages(bytes).await;

        match &result {
            Ok(output) => info!(
                "Pipeline complete: {}x{}, {} detections, sum {}, {}ms",
                output.info.width,
                output.info.height,
                output.detections.len(),
                output.label_sum,
                started.elapsed().as_millis()
            ),
            Err(e) => {
                self.stats.failures.fetch_add(1, Ordering::Relaxed);
                warn!("Pipeline failed after {}ms: {}", started.elapsed().as_millis(), e);
            }
        }
        result
    }

    async fn process_stages(self: Arc<Self>, bytes: Bytes) -> Result<PipelineOutput, PipelineError> {
        // 1. Decode
        let pipeline = Arc::clone(&self);
        let (image, info) = run_blocking(move || pipeline.decode(&bytes)).await?;
        debug!(
            "Decoded image: {}x{}, {} bytes",
            info.width, info.height, info.size_bytes
        );

        // 2. Detect (bounded). One deadline covers the permit wait and the call.
        let deadline = tokio::time::Instant::now() + self.detector_timeout;
        let permit = tokio::time::timeout_at(
            deadline,
            Arc::clone(&self.inference_permits).acquire_owned(),
        )
        .await
        .map_err(|_| {
            PipelineError::Unavailable(format!(
                "no inference slot freed within {:?}",
                self.detector_timeout
            ))
        })?
        .map_err(|_| PipelineError::Unavailable("inference pool closed".to_string()))?;

        // Permit moves into the task so a timed-out call still holds its slot
        let pipeline = Arc::clone(&self);
        let detect_task = run_blocking(move || {
            let _permit = permit;
            let detections = pipeline.detect(&image)?;
            Ok((image, detections))
        });
        let (image, detections) = tokio::time::timeout_at(deadline, detect_task)
            .await
            .map_err(|_| PipelineError::DetectorTimeout(self.detector_timeout))??;

        for detection in &detections {
            debug!(
                "Detection: class {} '{}' ({:.2}) at [{:.1}, {:.1}, {:.1}, {:.1}]",
                detection.class_index,
                detection.label,
                detection.confidence,
                detection.bbox.x1,
                detection.bbox.y1,
                detection.bbox.x2,
                detection.bbox.y2
            );
        }

        // 3. Annotate, aggregate, encode
        let pipeline = Arc::clone(&self);
        let (png, label_sum, detections) = run_blocking(move || {
            let (png, label_sum) = pipeline.render(image, &detections)?;
            Ok((png, label_sum, detections))
        })
        .await?;

        Ok(PipelineOutput {
            png,
            label_sum,
            detections,
            info,
        })
    }
}

async fn run_blocking<T, F>(f: F) -> Result<T, PipelineError>
where
    F: FnOnce() -> Result<T, PipelineError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| PipelineError::Task(e.to_string()))?
}
