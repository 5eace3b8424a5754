// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::pipeline::{AggregateError, PipelineError};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorResponse {
    pub error_type: String,
    pub message: String,
    pub request_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<HashMap<String, serde_json::Value>>,
}

#[derive(Debug, Clone)]
pub enum ApiError {
    InvalidRequest(String),
    Unauthorized(String),
    PayloadTooLarge(String),
    InvalidImage(String),
    LabelParseFailure {
        label: String,
        message: String,
    },
    EncodeFailure(String),
    DetectorFailure(String),
    ServiceUnavailable(String),
    InternalError(String),
    Timeout,
}

impl ApiError {
    pub fn to_response(&self, request_id: Option<String>) -> ErrorResponse {
        let (error_type, message, details) = match self {
            ApiError::InvalidRequest(msg) => ("invalid_request", msg.clone(), None),
            ApiError::Unauthorized(msg) => ("unauthorized", msg.clone(), None),
            ApiError::PayloadTooLarge(msg) => ("payload_too_large", msg.clone(), None),
            ApiError::InvalidImage(msg) => ("invalid_image", msg.clone(), None),
            ApiError::LabelParseFailure { label, message } => {
                let mut details = HashMap::new();
                details.insert(
                    "label".to_string(),
                    serde_json::Value::String(label.clone()),
                );
                ("label_parse_failure", message.clone(), Some(details))
            }
            ApiError::EncodeFailure(msg) => ("encode_failure", msg.clone(), None),
            ApiError::DetectorFailure(msg) => ("detector_failure", msg.clone(), None),
            ApiError::ServiceUnavailable(msg) => ("service_unavailable", msg.clone(), None),
            ApiError::InternalError(msg) => ("internal_error", msg.clone(), None),
            ApiError::Timeout => ("timeout", "Detection timed out".to_string(), None),
        };

        ErrorResponse {
            error_type: error_type.to_string(),
            message,
            request_id,
            details,
        }
    }

    pub fn status_code(&self) -> u16 {
        match self {
            ApiError::InvalidRequest(_) => 400,
            ApiError::InvalidImage(_) => 400,
            ApiError::Unauthorized(_) => 403,
            ApiError::PayloadTooLarge(_) => 413,
            ApiError::LabelParseFailure { .. } => 422,
            ApiError::EncodeFailure(_) | ApiError::InternalError(_) => 500,
            ApiError::DetectorFailure(_) => 502,
            ApiError::ServiceUnavailable(_) => 503,
            ApiError::Timeout => 504,
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::InvalidRequest(msg) => write!(f, "Invalid request: {}", msg),
            ApiError::Unauthorized(msg) => write!(f, "Unauthorized: {}", msg),
            ApiError::PayloadTooLarge(msg) => write!(f, "Payload too large: {}", msg),
            ApiError::InvalidImage(msg) => write!(f, "Invalid image: {}", msg),
            ApiError::LabelParseFailure { message, .. } => {
                write!(f, "Label parse failure: {}", message)
            }
            ApiError::EncodeFailure(msg) => write!(f, "Encode failure: {}", msg),
            ApiError::DetectorFailure(msg) => write!(f, "Detector failure: {}", msg),
            ApiError::ServiceUnavailable(msg) => write!(f, "Service unavailable: {}", msg),
            ApiError::InternalError(msg) => write!(f, "Internal error: {}", msg),
            ApiError::Timeout => write!(f, "Detection timed out"),
        }
    }
}

impl std::error::Error for ApiError {}

impl From<PipelineError> for ApiError {
    fn from(e: PipelineError) -> Self {
        match e {
            PipelineError::InvalidImage(e) => ApiError::InvalidImage(e.to_string()),
            PipelineError::Detector(e) => ApiError::DetectorFailure(e.to_string()),
            PipelineError::DetectorTimeout(_) => ApiError::Timeout,
            PipelineError::LabelParse(e) => {
                let label = e.label().to_string();
                let message = match e {
                    AggregateError::NotNumeric { .. } => {
                        format!("label '{}' is not an integer", label)
                    }
                    AggregateError::Overflow { .. } => {
                        format!("label sum overflowed at '{}'", label)
                    }
                };
                ApiError::LabelParseFailure { label, message }
            }
            PipelineError::Encode(e) => ApiError::EncodeFailure(e.to_string()),
            PipelineError::Unavailable(msg) => ApiError::ServiceUnavailable(msg),
            PipelineError::Task(msg) => ApiError::InternalError(msg),
        }
    }
}
