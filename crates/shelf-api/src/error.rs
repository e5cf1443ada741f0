//! API error type and [`axum::response::IntoResponse`] implementation.

use axum::{
  Json,
  extract::rejection::{JsonRejection, PathRejection, QueryRejection},
  http::{HeaderValue, StatusCode, header},
  response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  /// Bad credentials or a missing, malformed, or expired token. The message
  /// is the same in every case.
  #[error("could not validate credentials")]
  Unauthorized,

  #[error("not found: {0}")]
  NotFound(String),

  /// Malformed input. Never reaches the store.
  #[error("validation failed: {0}")]
  Validation(String),

  #[error("service unavailable: {0}")]
  Unavailable(String),

  #[error("internal error: {0}")]
  Internal(String),

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl ApiError {
  pub fn store(e: impl std::error::Error + Send + Sync + 'static) -> Self {
    Self::Store(Box::new(e))
  }
}

impl From<shelf_core::Error> for ApiError {
  fn from(e: shelf_core::Error) -> Self { Self::Validation(e.to_string()) }
}

impl From<JsonRejection> for ApiError {
  fn from(r: JsonRejection) -> Self { Self::Validation(r.body_text()) }
}

impl From<QueryRejection> for ApiError {
  fn from(r: QueryRejection) -> Self { Self::Validation(r.body_text()) }
}

impl From<PathRejection> for ApiError {
  fn from(r: PathRejection) -> Self { Self::Validation(r.body_text()) }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let status = match &self {
      ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
      ApiError::NotFound(_) => StatusCode::NOT_FOUND,
      ApiError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
      ApiError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
      ApiError::Internal(_) | ApiError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };

    if status.is_server_error() {
      tracing::error!(error = %self, "request failed");
    }

    let message = match &self {
      ApiError::NotFound(m) | ApiError::Validation(m) => m.clone(),
      other => other.to_string(),
    };

    let mut res = (status, Json(json!({ "error": message }))).into_response();
    if matches!(self, ApiError::Unauthorized) {
      res
        .headers_mut()
        .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
    }
    res
  }
}
