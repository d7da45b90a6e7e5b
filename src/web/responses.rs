//! Standardized response envelope for the HTTP API

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

/// Envelope wrapping every API payload
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub status: &'static str,
    pub data: T,
}

pub fn ok<T: Serialize>(data: T) -> Response {
    (StatusCode::OK, Json(ApiResponse { status: "ok", data })).into_response()
}

pub fn error<T: Serialize>(status: StatusCode, data: T) -> Response {
    (
        status,
        Json(ApiResponse {
            status: "error",
            data,
        }),
    )
        .into_response()
}
