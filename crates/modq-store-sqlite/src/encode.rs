//! Encoding and decoding helpers between domain types and the plain values
//! stored in SQLite columns.
//!
//! Timestamps are stored as fixed-width RFC 3339 strings (microsecond
//! precision, `Z` suffix) so that string order equals chronological order.
//! Statuses use their wire spelling; identifiers are stored as-is.

use chrono::{DateTime, SecondsFormat, Utc};
use modq_core::{
  audit::AuditEntry,
  item::{ExternalId, Status, WorkItem, WorkerId},
};

use crate::{Error, Result};

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── Domain scalars ──────────────────────────────────────────────────────────

pub fn decode_status(s: &str) -> Result<Status> { Ok(Status::parse(s)?) }

pub fn decode_external_id(raw: i64) -> Result<ExternalId> {
  Ok(ExternalId::new(raw)?)
}

pub fn decode_worker(raw: Option<String>) -> Result<Option<WorkerId>> {
  Ok(raw.map(WorkerId::new).transpose()?)
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Column list matching [`RawWorkItem::from_row`].
pub const ITEM_COLUMNS: &str =
  "id, external_id, status, assignee, created_at, updated_at";

/// Raw values read directly from a `work_items` row.
pub struct RawWorkItem {
  pub id:          i64,
  pub external_id: i64,
  pub status:      String,
  pub assignee:    Option<String>,
  pub created_at:  String,
  pub updated_at:  String,
}

impl RawWorkItem {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:          row.get(0)?,
      external_id: row.get(1)?,
      status:      row.get(2)?,
      assignee:    row.get(3)?,
      created_at:  row.get(4)?,
      updated_at:  row.get(5)?,
    })
  }

  pub fn into_item(self) -> Result<WorkItem> {
    Ok(WorkItem {
      id:          self.id,
      external_id: decode_external_id(self.external_id)?,
      status:      decode_status(&self.status)?,
      assignee:    decode_worker(self.assignee)?,
      created_at:  decode_dt(&self.created_at)?,
      updated_at:  decode_dt(&self.updated_at)?,
    })
  }
}

/// Column list matching [`RawAuditEntry::from_row`].
pub const AUDIT_COLUMNS: &str = "external_id, status, moderator, recorded_at";

/// Raw values read directly from an `audit_log` row.
pub struct RawAuditEntry {
  pub external_id: i64,
  pub status:      String,
  pub moderator:   Option<String>,
  pub recorded_at: String,
}

impl RawAuditEntry {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      external_id: row.get(0)?,
      status:      row.get(1)?,
      moderator:   row.get(2)?,
      recorded_at: row.get(3)?,
    })
  }

  pub fn into_entry(self) -> Result<AuditEntry> {
    Ok(AuditEntry {
      external_id: decode_external_id(self.external_id)?,
      status:      decode_status(&self.status)?,
      moderator:   decode_worker(self.moderator)?,
      recorded_at: decode_dt(&self.recorded_at)?,
    })
  }
}
