// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use anyhow::{anyhow, Result};
use clap::Parser;
use std::path::PathBuf;

use crate::config::ServerConfig;
use crate::pipeline::LabelPolicy;

/// Object detection server that annotates uploads and sums numeric labels
#[derive(Parser, Debug, Default)]
#[command(name = "labelsum-detect")]
#[command(version = crate::version::VERSION_NUMBER)]
#[command(about = "Annotate uploaded images with detections and sum numeric labels", long_about = None)]
pub struct Cli {
    /// TOML config file; flags and env vars override its values
    #[arg(long, env = "CONFIG_PATH")]
    pub config: Option<PathBuf>,

    /// Path to the ONNX detection model
    #[arg(long, env = "MODEL_PATH")]
    pub model_path: Option<PathBuf>,

    /// Class label file (one label per line)
    #[arg(long, env = "LABELS_PATH")]
    pub labels_path: Option<PathBuf>,

    /// Bind host
    #[arg(long, env = "API_HOST")]
    pub host: Option<String>,

    /// Bind port
    #[arg(long, env = "API_PORT")]
    pub port: Option<u16>,

    /// Shared secret required in the auth header
    #[arg(long, env = "API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Header carrying the shared secret
    #[arg(long, env = "API_KEY_HEADER")]
    pub api_key_header: Option<String>,

    /// Response header carrying the label sum
    #[arg(long, env = "SUM_HEADER")]
    pub sum_header: Option<String>,

    /// Detector timeout in milliseconds
    #[arg(long, env = "DETECTOR_TIMEOUT_MS")]
    pub detector_timeout_ms: Option<u64>,

    /// Maximum upload size in bytes
    #[arg(long, env = "MAX_UPLOAD_BYTES")]
    pub max_upload_bytes: Option<usize>,

    /// Maximum decoded image width or height in pixels
    #[arg(long, env = "MAX_IMAGE_DIMENSION")]
    pub max_image_dimension: Option<u32>,

    /// Maximum concurrent detector calls
    #[arg(long, env = "MAX_CONCURRENT_INFERENCES")]
    pub max_concurrent_inferences: Option<usize>,

    /// Minimum detection confidence (0-1)
    #[arg(long, env = "CONFIDENCE_THRESHOLD")]
    pub confidence_threshold: Option<f32>,

    /// NMS IoU threshold (0-1)
    #[arg(long, env = "IOU_THRESHOLD")]
    pub iou_threshold: Option<f32>,

    /// Square model input size
    #[arg(long, env = "MODEL_INPUT_SIZE")]
    pub input_size: Option<u32>,

    /// ONNX Runtime intra-op threads
    #[arg(long, env = "ORT_INTRA_THREADS")]
    pub intra_threads: Option<usize>,

    /// Non-numeric label handling: strict or skip
    #[arg(long, env = "LABEL_POLICY")]
    pub label_policy: Option<LabelPolicy>,

    /// Comma-separated labels excluded from the sum
    #[arg(long, env = "SENTINEL_LABELS", value_delimiter = ',')]
    pub sentinel_labels: Option<Vec<String>>,
}

impl Cli {
    /// Resolve the final configuration: defaults, config file, then overrides
    pub fn resolve(&self) -> Result<ServerConfig> {
        let mut config = match &self.config {
            Some(path) => ServerConfig::from_file(path)?,
            None => ServerConfig::default(),
        };
        self.apply(&mut config);
        config.validate().map_err(|e| anyhow!(e))?;
        Ok(config)
    }

    /// Overlay explicitly provided values onto `config`
    pub fn apply(&self, config: &mut ServerConfig) {
        if let Some(v) = &self.model_path {
            config.model_path = v.clone();
        }
        if let Some(v) = &self.labels_path {
            config.labels_path = Some(v.clone());
        }
        if let Some(v) = &self.host {
            config.host = v.clone();
        }
        if let Some(v) = self.port {
            config.port = v;
        }
        if let Some(v) = &self.api_key {
            config.api_key = v.clone();
        }
        if let Some(v) = &self.api_key_header {
            config.api_key_header = v.clone();
        }
        if let Some(v) = &self.sum_header {
            config.sum_header = v.clone();
        }
        if let Some(v) = self.detector_timeout_ms {
            config.detector_timeout_ms = v;
        }
        if let Some(v) = self.max_upload_bytes {
            config.max_upload_bytes = v;
        }
        if let Some(v) = self.max_image_dimension {
            config.max_image_dimension = v;
        }
        if let Some(v) = self.max_concurrent_inferences {
            config.max_concurrent_inferences = v;
        }
        if let Some(v) = self.confidence_threshold {
            config.confidence_threshold = v;
        }
        if let Some(v) = self.iou_threshold {
            config.iou_threshold = v;
        }
        if let Some(v) = self.input_size {
            config.input_size = v;
        }
        if let Some(v) = self.intra_threads {
            config.intra_threads = v;
        }
        if let Some(v) = self.label_policy {
            config.label_policy = v;
        }
        if let Some(v) = &self.sentinel_labels {
            config.sentinel_labels = v.iter().map(|s| s.trim().to_string()).collect();
        }
    }
}
