// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Server configuration
//!
//! Values are resolved once at startup: defaults, then an optional TOML file,
//! then environment/CLI overrides (see [`crate::cli`]). Nothing here changes
//! after the server starts.

use anyhow::{Context, Result};
use axum::http::HeaderName;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::pipeline::{LabelPolicy, DEFAULT_SENTINELS};
use crate::vision::image_utils::MAX_IMAGE_DIMENSION;

/// Configuration for the detection server
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    /// Path to the ONNX detection model
    pub model_path: PathBuf,
    /// Optional class label file (one label per line); model metadata otherwise
    pub labels_path: Option<PathBuf>,
    /// Bind host
    pub host: String,
    /// Bind port
    pub port: u16,
    /// Shared secret expected in the auth header (required)
    pub api_key: String,
    /// Header carrying the shared secret
    pub api_key_header: String,
    /// Response header carrying the label sum
    pub sum_header: String,
    /// Upper bound for a single detector call in milliseconds
    pub detector_timeout_ms: u64,
    /// Maximum accepted upload size in bytes
    pub max_upload_bytes: usize,
    /// Maximum decoded width or height in pixels
    pub max_image_dimension: u32,
    /// Maximum detector calls running at once
    pub max_concurrent_inferences: usize,
    /// Minimum class score for a detection
    pub confidence_threshold: f32,
    /// NMS IoU threshold
    pub iou_threshold: f32,
    /// Square model input size
    pub input_size: u32,
    /// ONNX Runtime intra-op threads
    pub intra_threads: usize,
    /// Handling of non-numeric, non-sentinel labels
    pub label_policy: LabelPolicy,
    /// Labels excluded from the sum
    pub sentinel_labels: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from("best.onnx"),
            labels_path: None,
            host: "127.0.0.1".to_string(),
            port: 8080,
            api_key: String::new(),
            api_key_header: "access_token".to_string(),
            sum_header: "X-Label-Sum".to_string(),
            detector_timeout_ms: 30_000,
            max_upload_bytes: 10 * 1024 * 1024,
            max_image_dimension: MAX_IMAGE_DIMENSION,
            max_concurrent_inferences: 4,
            confidence_threshold: 0.25,
            iou_threshold: 0.7,
            input_size: 640,
            intra_threads: 4,
            label_policy: LabelPolicy::Strict,
            sentinel_labels: DEFAULT_SENTINELS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl std::fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerConfig")
            .field("model_path", &self.model_path)
            .field("labels_path", &self.labels_path)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("api_key", &"<redacted>")
            .field("api_key_header", &self.api_key_header)
            .field("sum_header", &self.sum_header)
            .field("detector_timeout_ms", &self.detector_timeout_ms)
            .field("max_upload_bytes", &self.max_upload_bytes)
            .field("max_image_dimension", &self.max_image_dimension)
            .field("max_concurrent_inferences", &self.max_concurrent_inferences)
            .field("confidence_threshold", &self.confidence_threshold)
            .field("iou_threshold", &self.iou_threshold)
            .field("input_size", &self.input_size)
            .field("intra_threads", &self.intra_threads)
            .field("label_policy", &self.label_policy)
            .field("sentinel_labels", &self.sentinel_labels)
            .finish()
    }
}

impl ServerConfig {
    /// Load configuration from a TOML file; missing keys keep their defaults
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: ServerConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.api_key.trim().is_empty() {
            return Err("API key must be configured (API_KEY)".to_string());
        }
        HeaderName::from_bytes(self.api_key_header.as_bytes())
            .map_err(|_| format!("Invalid API key header name '{}'", self.api_key_header))?;
        HeaderName::from_bytes(self.sum_header.as_bytes())
            .map_err(|_| format!("Invalid sum header name '{}'", self.sum_header))?;
        if self.host.trim().is_empty() {
            return Err("Host must not be empty".to_string());
        }
        if self.detector_timeout_ms == 0 {
            return Err("Detector timeout must be greater than 0".to_string());
        }
        if self.max_upload_bytes == 0 {
            return Err("Max upload size must be greater than 0".to_string());
        }
        if self.max_image_dimension == 0 {
            return Err("Max image dimension must be greater than 0".to_string());
        }
        if self.max_concurrent_inferences == 0 {
            return Err("Max concurrent inferences must be greater than 0".to_string());
        }
        if !(0.0..=1.0).contains(&self.confidence_threshold) {
            return Err(format!(
                "Confidence threshold must be between 0 and 1, got {}",
                self.confidence_threshold
            ));
        }
        if !(0.0..=1.0).contains(&self.iou_threshold) {
            return Err(format!(
                "IoU threshold must be between 0 and 1, got {}",
                self.iou_threshold
            ));
        }
        if self.input_size == 0 {
            return Err("Model input size must be greater than 0".to_string());
        }
        Ok(())
    }

    /// Bind address in `host:port` form
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn detector_timeout(&self) -> Duration {
        Duration::from_millis(self.detector_timeout_ms)
    }
}
