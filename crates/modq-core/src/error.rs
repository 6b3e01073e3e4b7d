//! Error types for `modq-core`.

use thiserror::Error;

use crate::item::{ExternalId, Status, WorkerId};

/// Every outcome of a queue operation that is not a success.
///
/// All variants except [`Error::Store`] are expected, caller-recoverable
/// conditions. `Store` marks an infrastructure failure: the operation was
/// aborted and nothing was written.
#[derive(Debug, Error)]
pub enum Error {
  #[error("no video available for moderation")]
  NoWorkAvailable,

  #[error("video {0} not found")]
  NotFound(ExternalId),

  #[error("video {id} has already been moderated (status: {status})")]
  AlreadyDecided { id: ExternalId, status: Status },

  #[error("video {id} is not assigned to moderator {worker}")]
  NotOwner { id: ExternalId, worker: WorkerId },

  #[error("video {0} already exists in the queue")]
  DuplicateExternalId(ExternalId),

  #[error("video id must be a positive integer, got {0}")]
  InvalidExternalId(i64),

  #[error("worker identity must not be empty")]
  InvalidWorkerId,

  #[error("unknown status: {0:?}")]
  UnknownStatus(String),

  #[error("store failure: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
  /// `true` for conditions the caller caused or can recover from.
  pub fn is_rejection(&self) -> bool { !matches!(self, Self::Store(_)) }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
