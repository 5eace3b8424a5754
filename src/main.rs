// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use anyhow::{Context, Result};
use axum::http::HeaderName;
use clap::Parser;
use labelsum_detect::{
    api::{create_router, serve, ApiKeyGate, AppState},
    cli::Cli,
    pipeline::{DetectionPipeline, LabelAggregator},
    version,
    vision::{Annotator, ClassLabelSet, YoloConfig, YoloDetector},
};
use std::{env, sync::Arc};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    // Environment from .env, if present
    dotenv::dotenv().ok();

    // Initialize tracing subscriber for logging
    if env::var("RUST_LOG").is_err() {
        env::set_var("RUST_LOG", "info");
    }
    tracing_subscriber::fmt::init();

    info!("Starting {}", version::get_version_string());
    info!("Build: {}", version::VERSION);

    let config = Cli::parse().resolve().context("Invalid configuration")?;
    info!("Configuration: {:?}", config);

    // Class labels: explicit file, otherwise model metadata
    let labels = match &config.labels_path {
        Some(path) => Some(
            ClassLabelSet::from_file(path)
                .with_context(|| format!("Failed to load labels from {}", path.display()))?,
        ),
        None => None,
    };

    let detector = YoloDetector::new(
        &config.model_path,
        labels,
        YoloConfig {
            input_size: config.input_size,
            confidence_threshold: config.confidence_threshold,
            iou_threshold: config.iou_threshold,
            intra_threads: config.intra_threads,
        },
    )
    .context("Failed to initialize detector")?;
    let classes = detector.labels().len();
    info!("Detector ready: {} classes", classes);

    let annotator = Annotator::new().context("Failed to load annotation font")?;
    let aggregator = LabelAggregator::new(config.label_policy)
        .with_sentinels(config.sentinel_labels.iter().cloned());
    info!(
        "Label policy: {}, sentinels: {:?}",
        config.label_policy, config.sentinel_labels
    );

    let pipeline = DetectionPipeline::new(Arc::new(detector), annotator, aggregator)
        .with_max_image_bytes(config.max_upload_bytes)
        .with_max_image_dimension(config.max_image_dimension)
        .with_detector_timeout(config.detector_timeout())
        .with_max_concurrent_inferences(config.max_concurrent_inferences);

    let gate = ApiKeyGate::new(&config.api_key_header, config.api_key.clone())
        .context("Invalid API key header name")?;
    let sum_header = HeaderName::from_bytes(config.sum_header.as_bytes())
        .context("Invalid sum header name")?;

    let state = AppState {
        gate: Arc::new(gate),
        pipeline: Arc::new(pipeline),
        sum_header,
        classes,
    };
    let app = create_router(state, config.max_upload_bytes);

    serve(&config.listen_addr(), app).await
}
