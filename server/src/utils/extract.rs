//! `Json` and `Path` extractors whose rejections use the API error envelope.

use axum::extract::{FromRequest, FromRequestParts};

use crate::utils::error::AppError;

/// Like [`axum::Json`], but a malformed body is a `VALIDATION_ERROR`.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct Json<T>(pub T);

/// Like [`axum::extract::Path`], but a malformed segment is a
/// `VALIDATION_ERROR`.
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(AppError))]
pub struct Path<T>(pub T);
