//! JSON HTTP API for the moderation queue.
//!
//! Exposes an axum [`Router`] backed by any [`modq_core::store::QueueStore`].
//! Moderators identify themselves with a base64-encoded name in the
//! `Authorization` header; see [`auth`].

pub mod auth;
pub mod error;
pub mod extract;
pub mod handlers;

use std::{path::PathBuf, sync::Arc, time::Duration};

use axum::{
  Router,
  routing::{get, post},
};
use modq_core::store::QueueStore;
use modq_store_sqlite::StoreOptions;
use serde::Deserialize;
use tower_http::trace::TraceLayer;

pub use error::ApiError;
use handlers::{admin, health, videos};

// ─── Configuration ────────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `config.toml` and
/// `MODQ_*` environment variables.
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
  #[serde(default = "default_host")]
  pub host:              String,
  #[serde(default = "default_port")]
  pub port:              u16,
  #[serde(default = "default_store_path")]
  pub store_path:        PathBuf,
  /// Milliseconds a write waits on another connection's lock.
  #[serde(default = "default_busy_timeout_ms")]
  pub busy_timeout_ms:   u64,
  #[serde(default = "default_claim_retry_limit")]
  pub claim_retry_limit: u32,
}

fn default_host() -> String { "127.0.0.1".to_string() }

fn default_port() -> u16 { 8000 }

fn default_store_path() -> PathBuf { PathBuf::from("moderation.db") }

fn default_busy_timeout_ms() -> u64 { 5_000 }

fn default_claim_retry_limit() -> u32 { 32 }

impl Default for ServerConfig {
  fn default() -> Self {
    Self {
      host:              default_host(),
      port:              default_port(),
      store_path:        default_store_path(),
      busy_timeout_ms:   default_busy_timeout_ms(),
      claim_retry_limit: default_claim_retry_limit(),
    }
  }
}

impl ServerConfig {
  pub fn store_options(&self) -> StoreOptions {
    StoreOptions {
      busy_timeout:      Duration::from_millis(self.busy_timeout_ms),
      claim_retry_limit: self.claim_retry_limit,
    }
  }

  pub fn address(&self) -> String { format!("{}:{}", self.host, self.port) }
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// Build the API router for `store`, with request tracing.
pub fn router<S>(store: Arc<S>) -> Router
where
  S: QueueStore + 'static,
{
  Router::new()
    .route("/health", get(health))
    // Moderation workflow
    .route("/add_video", post(videos::add::<S>))
    .route("/get_video", get(videos::next::<S>))
    .route("/flag_video", post(videos::flag::<S>))
    // Read-only projections
    .route("/stats", get(admin::stats::<S>))
    .route("/log_video/{video_id}", get(admin::log::<S>))
    .layer(TraceLayer::new_for_http())
    .with_state(store)
}

// ─── Integration tests ────────────────────────────────────────────────────────
