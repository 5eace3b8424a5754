// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
pub mod auth;
pub mod detect;
pub mod errors;
pub mod http_server;
pub mod server;

pub use auth::{require_api_key, ApiKeyGate, Authorized};
pub use detect::{detect_handler, DetectResponse, DetectUpload};
pub use errors::{ApiError, ErrorResponse};
pub use http_server::{create_router, ApiErrorResponse, AppState, HealthResponse};
pub use server::{serve, serve_with_listener};
