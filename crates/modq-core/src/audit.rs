//! Audit trail entries.
//!
//! Every status a work item enters is recorded once, including the initial
//! `Pending` entry written at creation. Entries are append-only.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::item::{ExternalId, Status, WorkerId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
  pub external_id: ExternalId,
  pub status:      Status,
  /// `None` for the creation entry.
  pub moderator:   Option<WorkerId>,
  pub recorded_at: DateTime<Utc>,
}
