// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
pub mod api;
pub mod cli;
pub mod config;
pub mod pipeline;
pub mod version;
pub mod vision;

pub use api::{create_router, ApiError, ApiKeyGate, AppState};
pub use config::ServerConfig;
pub use pipeline::{DetectionPipeline, LabelAggregator, LabelPolicy, PipelineError};
pub use vision::{Detection, Detector, DetectorError};
