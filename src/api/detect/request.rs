// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Detection request extraction

use axum::http::StatusCode;
use axum_extra::extract::multipart::{Multipart, MultipartError};
use bytes::Bytes;

use crate::api::errors::ApiError;

/// Multipart field carrying the image
pub const FILE_FIELD: &str = "file";

/// The uploaded image and its part metadata
#[derive(Debug, Clone)]
pub struct DetectUpload {
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub bytes: Bytes,
}

impl DetectUpload {
    /// Read the `file` part; other parts are skipped
    pub async fn from_multipart(mut multipart: Multipart) -> Result<Self, ApiError> {
        while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
            if field.name() != Some(FILE_FIELD) {
                continue;
            }

            let file_name = field.file_name().map(str::to_string);
            let content_type = field.content_type().map(str::to_string);
            let bytes = field.bytes().await.map_err(multipart_error)?;

            return Ok(Self {
                file_name,
                content_type,
                bytes,
            });
        }

        Err(ApiError::InvalidRequest(format!(
            "multipart field '{}' is required",
            FILE_FIELD
        )))
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

fn multipart_error(e: MultipartError) -> ApiError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::PayloadTooLarge(e.body_text())
    } else {
        ApiError::InvalidRequest(e.body_text())
    }
}
