// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Detector contract and detection types
//!
//! The request pipeline only sees [`Detection`] values produced through the
//! [`Detector`] trait, so any object detector (ONNX, remote, stub) can be
//! plugged in without touching decode, annotation or aggregation.

use image::RgbImage;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Axis-aligned box in original image pixel coordinates (x1,y1 top-left; x2,y2 bottom-right)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl BoundingBox {
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    /// Build from YOLO center format
    pub fn from_center(cx: f32, cy: f32, w: f32, h: f32) -> Self {
        Self {
            x1: cx - w / 2.0,
            y1: cy - h / 2.0,
            x2: cx + w / 2.0,
            y2: cy + h / 2.0,
        }
    }

    pub fn width(&self) -> f32 {
        (self.x2 - self.x1).max(0.0)
    }

    pub fn height(&self) -> f32 {
        (self.y2 - self.y1).max(0.0)
    }

    pub fn area(&self) -> f32 {
        self.width() * self.height()
    }

    /// Intersection over union with another box
    pub fn iou(&self, other: &BoundingBox) -> f32 {
        let ix1 = self.x1.max(other.x1);
        let iy1 = self.y1.max(other.y1);
        let ix2 = self.x2.min(other.x2);
        let iy2 = self.y2.min(other.y2);

        let intersection = (ix2 - ix1).max(0.0) * (iy2 - iy1).max(0.0);
        let union = self.area() + other.area() - intersection;
        if union <= 0.0 {
            return 0.0;
        }
        intersection / union
    }

    /// Clamp all coordinates into `[0, width] x [0, height]`
    pub fn clamp(&self, width: f32, height: f32) -> Self {
        Self {
            x1: self.x1.clamp(0.0, width),
            y1: self.y1.clamp(0.0, height),
            x2: self.x2.clamp(0.0, width),
            y2: self.y2.clamp(0.0, height),
        }
    }
}

/// One located, classified object instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub bbox: BoundingBox,
    /// Index into the model's class label set
    pub class_index: usize,
    /// Human-readable class label
    pub label: String,
    /// Detection confidence score (0.0-1.0)
    pub confidence: f32,
}

impl Detection {
    pub fn new(bbox: BoundingBox, class_index: usize, label: impl Into<String>) -> Self {
        Self {
            bbox,
            class_index,
            label: label.into(),
            confidence: 1.0,
        }
    }

    pub fn with_confidence(mut self, confidence: f32) -> Self {
        self.confidence = confidence.clamp(0.0, 1.0);
        self
    }
}

/// Errors raised by a detector implementation
#[derive(Debug, Error)]
pub enum DetectorError {
    #[error("Inference failed: {0}")]
    Inference(String),

    #[error("Malformed detector output: {0}")]
    MalformedOutput(String),

    #[error("Detector unavailable: {0}")]
    Unavailable(String),
}

impl From<ort::Error> for DetectorError {
    fn from(e: ort::Error) -> Self {
        DetectorError::Inference(e.to_string())
    }
}

/// Object detector consumed by the request pipeline
///
/// Implementations must be safe to share across requests. The returned order
/// is preserved by everything downstream.
#[cfg_attr(test, mockall::automock)]
pub trait Detector: Send + Sync {
    /// Short identifier used in logs and health output
    fn name(&self) -> &'static str;

    /// Run detection on a decoded RGB image
    fn detect(&self, image: &RgbImage) -> Result<Vec<Detection>, DetectorError>;
}
