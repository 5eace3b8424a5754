// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! YOLOv8 output decoding and non-maximum suppression

use ndarray::{ArrayViewD, Ix3};

use super::preprocessing::Letterbox;
use crate::vision::detector::{BoundingBox, DetectorError};

/// Box coordinate channels (cx, cy, w, h) preceding class scores
const CXYWH_OFFSET: usize = 4;

/// Upper bound on detections kept after NMS
pub const MAX_DETECTIONS: usize = 300;

/// A scored box in original image coordinates, before label lookup
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub bbox: BoundingBox,
    pub class_index: usize,
    pub confidence: f32,
}

/// Decode raw YOLOv8 output into candidates above `conf_threshold`
///
/// Accepts both `[1, 4 + nc, N]` (default export) and transposed
/// `[1, N, 4 + nc]` layouts; the smaller trailing dimension is taken as the
/// channel axis.
pub fn decode_output(
    output: ArrayViewD<f32>,
    letterbox: &Letterbox,
    image_width: u32,
    image_height: u32,
    conf_threshold: f32,
) -> Result<Vec<Candidate>, DetectorError> {
    let shape = output.shape().to_vec();
    let output = output.into_dimensionality::<Ix3>().map_err(|_| {
        DetectorError::MalformedOutput(format!("expected 3 dimensions, got {:?}", shape))
    })?;

    let (batch, dim_a, dim_b) = output.dim();
    if batch != 1 {
        return Err(DetectorError::MalformedOutput(format!(
            "expected batch size 1, got {}",
            batch
        )));
    }

    let channels_first = dim_a <= dim_b;
    let (channels, anchors) = if channels_first {
        (dim_a, dim_b)
    } else {
        (dim_b, dim_a)
    };
    if channels <= CXYWH_OFFSET {
        return Err(DetectorError::MalformedOutput(format!(
            "expected more than {} channels, got {}",
            CXYWH_OFFSET, channels
        )));
    }

    let value = |anchor: usize, channel: usize| -> f32 {
        if channels_first {
            output[[0, channel, anchor]]
        } else {
            output[[0, anchor, channel]]
        }
    };

    let (width, height) = (image_width as f32, image_height as f32);
    let mut candidates = Vec::new();
    for anchor in 0..anchors {
        let mut best_class = 0;
        let mut best_score = f32::MIN;
        for class_index in 0..channels - CXYWH_OFFSET {
            let score = value(anchor, CXYWH_OFFSET + class_index);
            if score > best_score {
                best_score = score;
                best_class = class_index;
            }
        }

        if best_score < conf_threshold {
            continue;
        }

        let (cx, cy) = letterbox.to_original(value(anchor, 0), value(anchor, 1));
        let w = value(anchor, 2) / letterbox.scale;
        let h = value(anchor, 3) / letterbox.scale;

        candidates.push(Candidate {
            bbox: BoundingBox::from_center(cx, cy, w, h).clamp(width, height),
            class_index: best_class,
            confidence: best_score,
        });
    }

    Ok(candidates)
}

/// Class-aware greedy NMS
///
/// Returns survivors ordered by descending confidence; ties keep their
/// original relative order.
pub fn non_max_suppression(mut candidates: Vec<Candidate>, iou_threshold: f32) -> Vec<Candidate> {
    candidates.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut kept: Vec<Candidate> = Vec::new();
    for candidate in candidates {
        let suppressed = kept.iter().any(|k| {
            k.class_index == candidate.class_index && k.bbox.iou(&candidate.bbox) > iou_threshold
        });
        if !suppressed {
            kept.push(candidate);
            if kept.len() == MAX_DETECTIONS {
                break;
            }
        }
    }
    kept
}
