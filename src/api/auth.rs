// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Shared-secret credential gate
//!
//! The gate runs as route middleware, ahead of any body extraction, so a
//! rejected request never reaches multipart parsing or the pipeline.

use axum::{
    extract::{Request, State},
    http::{header::InvalidHeaderName, HeaderMap, HeaderName},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::warn;

use super::errors::ApiError;
use super::http_server::{ApiErrorResponse, AppState};

/// Proof that a request passed the credential check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Authorized(());

/// Compares one request header against the configured secret.
///
/// The comparison is plain byte equality and is not constant-time.
#[derive(Clone)]
pub struct ApiKeyGate {
    header: HeaderName,
    secret: String,
}

impl std::fmt::Debug for ApiKeyGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiKeyGate")
            .field("header", &self.header)
            .field("secret", &"<redacted>")
            .finish()
    }
}

impl ApiKeyGate {
    pub fn new(header_name: &str, secret: impl Into<String>) -> Result<Self, InvalidHeaderName> {
        Ok(Self {
            header: HeaderName::from_bytes(header_name.as_bytes())?,
            secret: secret.into(),
        })
    }

    pub fn authorize(&self, headers: &HeaderMap) -> Result<Authorized, ApiError> {
        let value = headers
            .get(&self.header)
            .ok_or_else(|| ApiError::Unauthorized("missing api key".to_string()))?;

        if value.as_bytes() == self.secret.as_bytes() {
            Ok(Authorized(()))
        } else {
            Err(ApiError::Unauthorized("invalid api key".to_string()))
        }
    }
}

/// Route middleware rejecting requests without the shared secret
pub async fn require_api_key(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    match state.gate.authorize(request.headers()) {
        Ok(_) => next.run(request).await,
        Err(e) => {
            let request_id = uuid::Uuid::new_v4().to_string();
            warn!(
                "[{}] Rejected {} {}: {}",
                request_id,
                request.method(),
                request.uri().path(),
                e
            );
            ApiErrorResponse::new(e, Some(request_id)).into_response()
        }
    }
}
