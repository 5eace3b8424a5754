// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Detection response

use axum::{
    http::{header, HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};

/// Response header carrying the per-request id
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Annotated PNG plus the label sum header
#[derive(Debug, Clone)]
pub struct DetectResponse {
    pub png: Vec<u8>,
    pub label_sum: i64,
    pub sum_header: HeaderName,
    pub request_id: String,
}

impl IntoResponse for DetectResponse {
    fn into_response(self) -> Response {
        let mut response = (StatusCode::OK, self.png).into_response();
        let headers = response.headers_mut();

        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("image/png"));
        headers.insert(self.sum_header, HeaderValue::from(self.label_sum));
        if let Ok(value) = HeaderValue::from_str(&self.request_id) {
            headers.insert(HeaderName::from_static(REQUEST_ID_HEADER), value);
        }

        response
    }
}
