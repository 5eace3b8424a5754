// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use axum::{
    extract::{DefaultBodyLimit, State},
    http::{HeaderName, HeaderValue, StatusCode},
    middleware,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::auth::{require_api_key, ApiKeyGate};
use super::detect::{detect_handler, REQUEST_ID_HEADER};
use super::errors::ApiError;
use crate::pipeline::DetectionPipeline;

/// Immutable handles shared by every request
#[derive(Clone, Debug)]
pub struct AppState {
    pub gate: Arc<ApiKeyGate>,
    pub pipeline: Arc<DetectionPipeline>,
    pub sum_header: HeaderName,
    /// Number of classes the detector knows about
    pub classes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub detector: String,
    pub classes: usize,
}

pub fn create_router(state: AppState, max_upload_bytes: usize) -> Router {
    Router::new()
        // Detection endpoint (trailing-slash form kept for existing clients)
        .route("/detect", post(detect_handler))
        .route("/detect/", post(detect_handler))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_api_key,
        ))
        // Health check (no auth)
        .route("/health", get(health_handler))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: crate::version::VERSION_NUMBER.to_string(),
        detector: state.pipeline.detector_name().to_string(),
        classes: state.classes,
    })
}

// Error response wrapper
#[derive(Debug)]
pub struct ApiErrorResponse {
    error: ApiError,
    request_id: Option<String>,
}

impl ApiErrorResponse {
    pub fn new(error: ApiError, request_id: Option<String>) -> Self {
        Self { error, request_id }
    }
}

impl From<ApiError> for ApiErrorResponse {
    fn from(error: ApiError) -> Self {
        Self::new(error, None)
    }
}

impl IntoResponse for ApiErrorResponse {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.error.status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let request_id = self
            .request_id
            .as_deref()
            .and_then(|id| HeaderValue::from_str(id).ok());
        let error_response = self.error.to_response(self.request_id);

        let mut response = (status, Json(error_response)).into_response();
        if let Some(value) = request_id {
            response
                .headers_mut()
                .insert(HeaderName::from_static(REQUEST_ID_HEADER), value);
        }
        response
    }
}
