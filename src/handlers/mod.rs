//! HTTP handlers for the `/api/v2` routes.
//!
//! Handlers stay thin: extract the caller and payload, call into
//! [`crate::app`], wrap the result in [`ApiResponse`].

pub mod ads;
pub mod faqs;
pub mod orders;
pub mod products;
pub mod properties;
pub mod shops;

use axum::{http::StatusCode, Json};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: T,
}

pub type ApiResult<T> = crate::error::Result<Json<ApiResponse<T>>>;

pub fn ok<T: Serialize>(data: T) -> Json<ApiResponse<T>> {
    Json(ApiResponse {
        success: true,
        data,
    })
}

pub fn created<T: Serialize>(data: T) -> (StatusCode, Json<ApiResponse<T>>) {
    (StatusCode::CREATED, ok(data))
}
