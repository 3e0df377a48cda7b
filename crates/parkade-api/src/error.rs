//! API error type and [`axum::response::IntoResponse`] implementation.

use axum::{
  Json,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use parkade_core::{Error as CoreError, ErrorKind};
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error("bad request: {0}")]
  BadRequest(String),

  #[error(transparent)]
  Core(#[from] CoreError),
}

impl ApiError {
  fn status(&self) -> StatusCode {
    match self {
      ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
      ApiError::Core(e) => match e.kind() {
        ErrorKind::Validation => StatusCode::BAD_REQUEST,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::Conflict => StatusCode::CONFLICT,
        ErrorKind::Storage => StatusCode::INTERNAL_SERVER_ERROR,
      },
    }
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let status = self.status();
    if status.is_server_error() {
      error!(error = %self, "request failed");
    }

    let mut body = json!({ "error": self.to_string() });
    match &self {
      ApiError::Core(CoreError::CapacityBlockedByOccupancy {
        segment,
        blocking_numbers,
      }) => {
        body["segment"] = json!(segment);
        body["blocking_spot_numbers"] = json!(blocking_numbers);
      }
      ApiError::Core(CoreError::InsufficientShrinkCandidates { segment, .. }) => {
        body["segment"] = json!(segment);
      }
      ApiError::Core(CoreError::PartialCapacitySync { committed, failed, .. }) => {
        body["committed_segments"] = json!(committed);
        body["failed_segment"] = json!(failed);
      }
      _ => {}
    }
    (status, Json(body)).into_response()
  }
}
