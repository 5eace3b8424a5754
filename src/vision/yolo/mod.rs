// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! YOLOv8 object detection via ONNX Runtime
//!
//! Components:
//! - `preprocessing` - Letterbox resize and tensor conversion
//! - `postprocess` - Output decoding and class-aware NMS
//! - `model` - Session wrapper implementing [`Detector`](crate::vision::Detector)

pub mod model;
pub mod postprocess;
pub mod preprocessing;

pub use model::{YoloConfig, YoloDetector};
pub use postprocess::{Candidate, MAX_DETECTIONS};
pub use preprocessing::{Letterbox, DEFAULT_INPUT_SIZE};
