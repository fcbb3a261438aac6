//! API error type and [`axum::response::IntoResponse`] implementation.

use axum::{
  Json,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use rollcall_core::ErrorKind;
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error("bad request: {0}")]
  BadRequest(String),

  #[error(transparent)]
  Core(#[from] rollcall_core::Error),
}

/// Lift a store error into an [`ApiError`] through the core taxonomy.
pub(crate) fn store_err<E: Into<rollcall_core::Error>>(e: E) -> ApiError {
  ApiError::Core(e.into())
}

impl ApiError {
  fn kind(&self) -> ErrorKind {
    match self {
      ApiError::BadRequest(_) => ErrorKind::Validation,
      ApiError::Core(e) => e.kind(),
    }
  }

  fn status(&self) -> StatusCode {
    match self {
      ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
      _ => match self.kind() {
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::Conflict | ErrorKind::CommitInFlight => StatusCode::CONFLICT,
        ErrorKind::EmptySubmission | ErrorKind::Validation => {
          StatusCode::UNPROCESSABLE_ENTITY
        }
        ErrorKind::SessionNotResolved => StatusCode::BAD_REQUEST,
        ErrorKind::Store => StatusCode::INTERNAL_SERVER_ERROR,
      },
    }
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let kind = self.kind();
    let message = match &self {
      // Storage details stay in the log.
      ApiError::Core(e @ rollcall_core::Error::Store(_)) => {
        error!(error = %e, "store failure");
        "the attendance store failed; try again".to_owned()
      }
      other => other.to_string(),
    };
    let retryable = match &self {
      ApiError::BadRequest(_) => false,
      ApiError::Core(e) => e.is_retryable(),
    };
    (
      self.status(),
      Json(json!({ "error": message, "kind": kind, "retryable": retryable })),
    )
      .into_response()
  }
}
