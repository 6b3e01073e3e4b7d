//! Moderator identity extractor.
//!
//! The `Authorization` header carries the moderator's name, base64-encoded
//! (an optional `Basic ` prefix is tolerated). No password is involved; the
//! decoded name is the worker identity handed to the queue.

use axum::{
  extract::FromRequestParts,
  http::{HeaderMap, header, request::Parts},
};
use base64::{Engine as _, engine::general_purpose::STANDARD as B64};
use modq_core::item::WorkerId;

use crate::error::ApiError;

/// Present in a handler means the caller identified as this moderator.
#[derive(Debug, Clone)]
pub struct Moderator(pub WorkerId);

/// Resolve the moderator identity from request headers.
pub fn resolve_moderator(headers: &HeaderMap) -> Result<WorkerId, ApiError> {
  let raw = headers
    .get(header::AUTHORIZATION)
    .and_then(|v| v.to_str().ok())
    .ok_or(ApiError::Unauthorized)?
    .trim();
  let encoded = raw.strip_prefix("Basic ").unwrap_or(raw).trim();

  let decoded = B64.decode(encoded).map_err(|_| ApiError::Unauthorized)?;
  let name = String::from_utf8(decoded).map_err(|_| ApiError::Unauthorized)?;

  WorkerId::new(name).map_err(|_| ApiError::Unauthorized)
}

impl<S> FromRequestParts<S> for Moderator
where
  S: Send + Sync,
{
  type Rejection = ApiError;

  async fn from_request_parts(
    parts: &mut Parts,
    _state: &S,
  ) -> Result<Self, Self::Rejection> {
    resolve_moderator(&parts.headers).map(Moderator)
  }
}
