// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Detection API endpoint module
//!
//! Provides POST /detect for annotating an uploaded image and summing its
//! numeric detection labels.

pub mod handler;
pub mod request;
pub mod response;

pub use handler::detect_handler;
pub use request::{DetectUpload, FILE_FIELD};
pub use response::{DetectResponse, REQUEST_ID_HEADER};
