//! Read-only projections: queue counters and per-video audit trail.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/stats` | Counts by status |
//! | `GET`  | `/log_video/{video_id}` | Audit trail, oldest first; 404 if unknown |

use std::sync::Arc;

use axum::{Json, extract::State};
use chrono::{DateTime, Utc};
use modq_core::{
  audit::AuditEntry,
  item::{ExternalId, Status, WorkerId},
  store::{QueueStats, QueueStore},
};
use serde::{Deserialize, Serialize};

use crate::{error::ApiError, extract::PathParam};

// ─── Stats ───────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize)]
pub struct StatsBody {
  pub total_pending_videos:  u64,
  pub total_spam_videos:     u64,
  pub total_not_spam_videos: u64,
}

impl From<QueueStats> for StatsBody {
  fn from(s: QueueStats) -> Self {
    Self {
      total_pending_videos:  s.pending,
      total_spam_videos:     s.spam,
      total_not_spam_videos: s.not_spam,
    }
  }
}

/// `GET /stats`
pub async fn stats<S>(
  State(store): State<Arc<S>>,
) -> Result<Json<StatsBody>, ApiError>
where
  S: QueueStore,
{
  let stats = store.stats().await.map_err(ApiError::from_store)?;
  Ok(Json(stats.into()))
}

// ─── Audit trail ─────────────────────────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize)]
pub struct LogEntryBody {
  pub date:      DateTime<Utc>,
  pub status:    Status,
  pub moderator: Option<WorkerId>,
}

impl From<AuditEntry> for LogEntryBody {
  fn from(e: AuditEntry) -> Self {
    Self { date: e.recorded_at, status: e.status, moderator: e.moderator }
  }
}

/// `GET /log_video/{video_id}`
pub async fn log<S>(
  State(store): State<Arc<S>>,
  PathParam(video_id): PathParam<ExternalId>,
) -> Result<Json<Vec<LogEntryBody>>, ApiError>
where
  S: QueueStore,
{
  let entries = store
    .history(video_id)
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(entries.into_iter().map(LogEntryBody::from).collect()))
}
