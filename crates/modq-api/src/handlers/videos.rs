//! Handlers for the moderation workflow.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/add_video` | Server-to-server intake; body `{"video_id":n}`; 201 |
//! | `GET`  | `/get_video` | Moderator auth; returns the caller's current video |
//! | `POST` | `/flag_video` | Moderator auth; body `{"video_id":n,"status":"spam"\|"not spam"}` |

use std::sync::Arc;

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use modq_core::{
  item::{Decision, ExternalId, Status},
  store::QueueStore,
};
use serde::{Deserialize, Serialize};

use crate::{auth::Moderator, error::ApiError, extract::JsonBody};

#[derive(Debug, Serialize, Deserialize)]
pub struct VideoBody {
  pub video_id: ExternalId,
}

// ─── Intake ──────────────────────────────────────────────────────────────────

/// `POST /add_video`
pub async fn add<S>(
  State(store): State<Arc<S>>,
  JsonBody(body): JsonBody<VideoBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: QueueStore,
{
  let item = store
    .create(body.video_id)
    .await
    .map_err(ApiError::from_store)?;
  Ok((StatusCode::CREATED, Json(VideoBody { video_id: item.external_id })))
}

// ─── Lease ───────────────────────────────────────────────────────────────────

/// `GET /get_video`
pub async fn next<S>(
  State(store): State<Arc<S>>,
  Moderator(worker): Moderator,
) -> Result<Json<VideoBody>, ApiError>
where
  S: QueueStore,
{
  let item = store.lease(&worker).await.map_err(ApiError::from_store)?;
  Ok(Json(VideoBody { video_id: item.external_id }))
}

// ─── Decide ──────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct FlagBody {
  pub video_id: ExternalId,
  pub status:   Decision,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct FlagResponse {
  pub video_id: ExternalId,
  pub status:   Status,
}

/// `POST /flag_video`
pub async fn flag<S>(
  State(store): State<Arc<S>>,
  Moderator(worker): Moderator,
  JsonBody(body): JsonBody<FlagBody>,
) -> Result<Json<FlagResponse>, ApiError>
where
  S: QueueStore,
{
  let item = store
    .decide(&worker, body.video_id, body.status)
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(FlagResponse { video_id: item.external_id, status: item.status }))
}
