//! The `QueueStore` trait: the assignment engine contract.
//!
//! Implemented by storage backends (e.g. `modq-store-sqlite`). The API layer
//! depends on this abstraction, not on a concrete backend. Implementations
//! must not cache item state between calls; every operation reads the
//! store's committed state.

use std::future::Future;

use serde::{Deserialize, Serialize};

use crate::{
  audit::AuditEntry,
  item::{Decision, ExternalId, WorkItem, WorkerId},
};

/// Per-status item counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStats {
  pub pending:  u64,
  pub spam:     u64,
  pub not_spam: u64,
}

/// Abstraction over a moderation queue backend.
///
/// Backend errors must convert into [`crate::Error`] so callers can tell a
/// rejection (`NotOwner`, `AlreadyDecided`, ...) from an infrastructure
/// failure (`Store`).
pub trait QueueStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static + Into<crate::Error>;

  /// Enqueue a new `Pending` item and write its initial audit entry.
  ///
  /// Fails with `DuplicateExternalId` if the id is already queued.
  fn create(
    &self,
    external_id: ExternalId,
  ) -> impl Future<Output = Result<WorkItem, Self::Error>> + Send + '_;

  /// Return the item `worker` currently holds, or claim the oldest
  /// unassigned pending item for it.
  ///
  /// Fails with `NoWorkAvailable` when nothing is left to claim.
  fn lease<'a>(
    &'a self,
    worker: &'a WorkerId,
  ) -> impl Future<Output = Result<WorkItem, Self::Error>> + Send + 'a;

  /// Record `decision` for an item leased to `worker`, releasing the lease
  /// and appending an audit entry in the same transaction.
  ///
  /// Preconditions are checked in order: `NotFound`, `AlreadyDecided`,
  /// `NotOwner`.
  fn decide<'a>(
    &'a self,
    worker: &'a WorkerId,
    external_id: ExternalId,
    decision: Decision,
  ) -> impl Future<Output = Result<WorkItem, Self::Error>> + Send + 'a;

  /// Look up the current state of an item. Returns `None` if not found.
  fn get(
    &self,
    external_id: ExternalId,
  ) -> impl Future<Output = Result<Option<WorkItem>, Self::Error>> + Send + '_;

  /// Count items by current status.
  fn stats(&self) -> impl Future<Output = Result<QueueStats, Self::Error>> + Send + '_;

  /// All audit entries for an item, oldest first. Fails with `NotFound` if
  /// the item was never created.
  fn history(
    &self,
    external_id: ExternalId,
  ) -> impl Future<Output = Result<Vec<AuditEntry>, Self::Error>> + Send + '_;
}
