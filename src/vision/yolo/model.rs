// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! YOLOv8 object detection model (ONNX Runtime, CPU)

use anyhow::{Context, Result};
use image::RgbImage;
use ort::execution_providers::CPUExecutionProvider;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::Tensor;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

use super::postprocess::{decode_output, non_max_suppression};
use super::preprocessing::{letterbox, DEFAULT_INPUT_SIZE};
use crate::vision::detector::{Detection, Detector, DetectorError};
use crate::vision::labels::ClassLabelSet;

/// Metadata key Ultralytics uses for the class name dictionary
const NAMES_METADATA_KEY: &str = "names";

/// Tunables for the YOLO detector
#[derive(Debug, Clone, PartialEq)]
pub struct YoloConfig {
    /// Square model input size
    pub input_size: u32,
    /// Minimum class score kept before NMS
    pub confidence_threshold: f32,
    /// IoU above which same-class boxes are suppressed
    pub iou_threshold: f32,
    /// ONNX Runtime intra-op threads
    pub intra_threads: usize,
}

impl Default for YoloConfig {
    fn default() -> Self {
        Self {
            input_size: DEFAULT_INPUT_SIZE,
            confidence_threshold: 0.25,
            iou_threshold: 0.7,
            intra_threads: 4,
        }
    }
}

/// YOLOv8 detector backed by an ONNX Runtime session
///
/// The session is created once and reused for every request; ONNX Runtime
/// requires exclusive access per run, so calls are serialized on a mutex.
pub struct YoloDetector {
    session: Mutex<Session>,
    input_name: String,
    labels: Arc<ClassLabelSet>,
    config: YoloConfig,
}

impl std::fmt::Debug for YoloDetector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("YoloDetector")
            .field("input_name", &self.input_name)
            .field("classes", &self.labels.len())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl YoloDetector {
    /// Load a YOLOv8 ONNX export
    ///
    /// # Arguments
    /// - `model_path`: Path to the ONNX model file
    /// - `labels`: Explicit class labels; when `None`, the model's `names`
    ///   metadata is used
    /// - `config`: Thresholds and runtime settings
    ///
    /// # Errors
    /// Returns error if:
    /// - Model file not found
    /// - ONNX Runtime initialization fails
    /// - Model declares no inputs
    pub fn new<P: AsRef<Path>>(
        model_path: P,
        labels: Option<ClassLabelSet>,
        config: YoloConfig,
    ) -> Result<Self> {
        let model_path = model_path.as_ref();

        // Validate path exists
        if !model_path.exists() {
            anyhow::bail!("Detection model not found: {}", model_path.display());
        }

        info!("Loading detection model from {}", model_path.display());

        let session = Session::builder()
            .context("Failed to create session builder")?
            .with_execution_providers([CPUExecutionProvider::default().build()])
            .context("Failed to set CPU execution provider")?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .context("Failed to set optimization level")?
            .with_intra_threads(config.intra_threads)
            .context("Failed to set intra threads")?
            .commit_from_file(model_path)
            .context(format!(
                "Failed to load detection model from {}",
                model_path.display()
            ))?;

        let input_name = session
            .inputs
            .first()
            .map(|input| input.name.clone())
            .context("Detection model declares no inputs")?;

        if let Some(input) = session.inputs.first() {
            debug!("Detection model input shape: {:?}", input.input_type);
        }

        let labels = match labels {
            Some(labels) => labels,
            None => Self::labels_from_metadata(&session),
        };
        if labels.is_empty() {
            warn!("No class labels available; labels will be class indices");
        }

        info!(
            "Detection model loaded (input: {}, classes: {}, size: {})",
            input_name,
            labels.len(),
            config.input_size
        );

        Ok(Self {
            session: Mutex::new(session),
            input_name,
            labels: Arc::new(labels),
            config,
        })
    }

    fn labels_from_metadata(session: &Session) -> ClassLabelSet {
        let names = session
            .metadata()
            .and_then(|metadata| metadata.custom(NAMES_METADATA_KEY));

        match names {
            Ok(Some(names)) => match ClassLabelSet::from_ultralytics_names(&names) {
                Ok(labels) => labels,
                Err(e) => {
                    warn!("Ignoring unreadable model class names: {}", e);
                    ClassLabelSet::default()
                }
            },
            Ok(None) => ClassLabelSet::default(),
            Err(e) => {
                warn!("Failed to read model metadata: {}", e);
                ClassLabelSet::default()
            }
        }
    }

    pub fn labels(&self) -> &ClassLabelSet {
        &self.labels
    }
}

impl Detector for YoloDetector {
    fn name(&self) -> &'static str {
        "yolov8-onnx"
    }

    fn detect(&self, image: &RgbImage) -> Result<Vec<Detection>, DetectorError> {
        let (input, lb) = letterbox(image, self.config.input_size);
        let input_value = Tensor::from_array(input)?;

        let candidates = {
            let mut session = self
                .session
                .lock()
                .map_err(|_| DetectorError::Unavailable("detector session poisoned".to_string()))?;

            let outputs = session.run(ort::inputs![self.input_name.as_str() => input_value])?;
            let output = outputs[0].try_extract_array::<f32>()?;
            debug!("Detection output shape: {:?}", output.shape());

            decode_output(
                output,
                &lb,
                image.width(),
                image.height(),
                self.config.confidence_threshold,
            )?
        };

        let kept = non_max_suppression(candidates, self.config.iou_threshold);
        Ok(kept
            .into_iter()
            .map(|c| {
                let label = self.labels.label(c.class_index).into_owned();
                Detection::new(c.bbox, c.class_index, label).with_confidence(c.confidence)
            })
            .collect())
    }
}
