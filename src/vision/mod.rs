// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Vision processing for the detection endpoint
//!
//! This module provides:
//! - Image decode/encode with checked results
//! - The `Detector` contract and a YOLOv8 ONNX implementation
//! - Class label loading
//! - Box and label annotation

pub mod annotator;
pub mod detector;
pub mod image_utils;
pub mod labels;
pub mod yolo;

pub use annotator::{class_color, Annotator};
pub use detector::{BoundingBox, Detection, Detector, DetectorError};
pub use image_utils::{decode_rgb_image, detect_format, encode_png, ImageError, ImageInfo};
pub use labels::{ClassLabelSet, LabelSetError};
pub use yolo::{YoloConfig, YoloDetector};
