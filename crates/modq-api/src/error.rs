//! API error type and [`axum::response::IntoResponse`] implementation.

use axum::{
  Json,
  extract::rejection::{JsonRejection, PathRejection},
  http::StatusCode,
  response::{IntoResponse, Response},
};
use modq_core::Error as QueueError;
use serde_json::json;
use thiserror::Error;

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error("invalid Authorization header; expected base64-encoded moderator name")]
  Unauthorized,

  #[error("invalid request body: {}", .0.body_text())]
  Body(#[from] JsonRejection),

  #[error("invalid path: {}", .0.body_text())]
  Path(#[from] PathRejection),

  #[error(transparent)]
  Queue(#[from] QueueError),
}

impl ApiError {
  /// Lift any backend error into the queue taxonomy.
  pub fn from_store(e: impl Into<QueueError>) -> Self { Self::Queue(e.into()) }

  pub fn status(&self) -> StatusCode {
    match self {
      ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
      ApiError::Body(_) | ApiError::Path(_) => StatusCode::UNPROCESSABLE_ENTITY,
      ApiError::Queue(e) => match e {
        QueueError::NoWorkAvailable | QueueError::NotFound(_) => {
          StatusCode::NOT_FOUND
        }
        QueueError::AlreadyDecided { .. } | QueueError::DuplicateExternalId(_) => {
          StatusCode::CONFLICT
        }
        QueueError::NotOwner { .. } => StatusCode::FORBIDDEN,
        QueueError::InvalidWorkerId => StatusCode::UNAUTHORIZED,
        QueueError::InvalidExternalId(_) | QueueError::UnknownStatus(_) => {
          StatusCode::UNPROCESSABLE_ENTITY
        }
        QueueError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
      },
    }
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    if let ApiError::Queue(e) = &self
      && !e.is_rejection()
    {
      tracing::error!(error = %e, "request failed");
    }
    let status = self.status();
    (status, Json(json!({ "error": self.to_string() }))).into_response()
  }
}
