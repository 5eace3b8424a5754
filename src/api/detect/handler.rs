// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Detection endpoint handler

use axum::extract::State;
use axum_extra::extract::multipart::{Multipart, MultipartRejection};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

use super::request::DetectUpload;
use super::response::DetectResponse;
use crate::api::errors::ApiError;
use crate::api::http_server::{ApiErrorResponse, AppState};

/// POST /detect - Annotate an image and sum its numeric labels
///
/// Runs behind the credential gate. Accepts a multipart form with the image in
/// the `file` field.
///
/// # Response
/// - Body: the annotated image as PNG
/// - `X-Label-Sum` (configurable): sum of numeric, non-sentinel labels
/// - `X-Request-Id`: per-request id, also present in error bodies
///
/// # Errors
/// - 400 Bad Request: malformed multipart, missing `file`, or undecodable image
/// - 413 Payload Too Large: upload over the configured limit
/// - 422 Unprocessable Entity: non-numeric label under the strict policy
/// - 500 Internal Server Error: PNG encoding failed
/// - 502 Bad Gateway: detector failed
/// - 504 Gateway Timeout: detector timed out
pub async fn detect_handler(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<DetectResponse, ApiErrorResponse> {
    let request_id = uuid::Uuid::new_v4().to_string();
    let started = Instant::now();

    // 1. Extract the upload
    let multipart = multipart.map_err(|e| {
        warn!("[{}] Multipart rejected: {}", request_id, e.body_text());
        reject(ApiError::InvalidRequest(e.body_text()), &request_id)
    })?;
    let upload = DetectUpload::from_multipart(multipart).await.map_err(|e| {
        warn!("[{}] Upload rejected: {}", request_id, e);
        reject(e, &request_id)
    })?;
    debug!(
        "[{}] Upload received: {} bytes (name: {:?}, type: {:?})",
        request_id,
        upload.len(),
        upload.file_name,
        upload.content_type
    );

    // 2. Decode, detect, annotate, aggregate, encode
    let size_bytes = upload.len();
    let output = Arc::clone(&state.pipeline)
        .process(upload.bytes)
        .await
        .map_err(|e| {
            warn!("[{}] Detection failed: {}", request_id, e);
            reject(ApiError::from(e), &request_id)
        })?;

    info!(
        "[{}] Detect complete: {} bytes, {}x{}, {} detections, sum {}, {}ms",
        request_id,
        size_bytes,
        output.info.width,
        output.info.height,
        output.detections.len(),
        output.label_sum,
        started.elapsed().as_millis()
    );

    // 3. Respond
    Ok(DetectResponse {
        png: output.png,
        label_sum: output.label_sum,
        sum_header: state.sum_header.clone(),
        request_id,
    })
}

fn reject(error: ApiError, request_id: &str) -> ApiErrorResponse {
    ApiErrorResponse::new(error, Some(request_id.to_string()))
}
