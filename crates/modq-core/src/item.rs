//! Work items: the unit of content awaiting a moderation decision.
//!
//! An item is created `Pending`, may be leased to exactly one moderator at a
//! time, and moves once to a terminal status. It is never deleted.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

// ─── Identifiers ─────────────────────────────────────────────────────────────

/// Caller-supplied identifier of a work item (the uploaded video's id).
///
/// Always strictly positive; immutable and unique across the queue.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(try_from = "i64", into = "i64")]
pub struct ExternalId(i64);

impl ExternalId {
  pub fn new(raw: i64) -> Result<Self> {
    if raw > 0 {
      Ok(Self(raw))
    } else {
      Err(Error::InvalidExternalId(raw))
    }
  }

  pub fn get(self) -> i64 { self.0 }
}

impl TryFrom<i64> for ExternalId {
  type Error = Error;

  fn try_from(raw: i64) -> Result<Self> { Self::new(raw) }
}

impl From<ExternalId> for i64 {
  fn from(id: ExternalId) -> Self { id.0 }
}

impl fmt::Display for ExternalId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { self.0.fmt(f) }
}

/// Opaque identity of a moderator, as produced by the identity resolver.
///
/// The only constraint is that it is not blank.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct WorkerId(String);

impl WorkerId {
  pub fn new(raw: impl Into<String>) -> Result<Self> {
    let raw = raw.into();
    if raw.trim().is_empty() {
      return Err(Error::InvalidWorkerId);
    }
    Ok(Self(raw))
  }

  pub fn as_str(&self) -> &str { &self.0 }
}

impl TryFrom<String> for WorkerId {
  type Error = Error;

  fn try_from(raw: String) -> Result<Self> { Self::new(raw) }
}

impl From<WorkerId> for String {
  fn from(id: WorkerId) -> Self { id.0 }
}

impl fmt::Display for WorkerId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.0) }
}

// ─── Status ──────────────────────────────────────────────────────────────────

/// Moderation status of a work item. The strum/serde spellings are also the
/// values stored in the database.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  Serialize,
  Deserialize,
  strum::Display,
  strum::EnumString,
  strum::IntoStaticStr,
)]
pub enum Status {
  #[serde(rename = "pending")]
  #[strum(serialize = "pending")]
  Pending,
  #[serde(rename = "spam")]
  #[strum(serialize = "spam")]
  Spam,
  #[serde(rename = "not spam")]
  #[strum(serialize = "not spam")]
  NotSpam,
}

impl Status {
  pub fn is_terminal(self) -> bool { !matches!(self, Self::Pending) }

  /// Parse the stored spelling, mapping failures into the domain error.
  pub fn parse(s: &str) -> Result<Self> {
    s.parse().map_err(|_| Error::UnknownStatus(s.to_owned()))
  }

  pub fn as_str(self) -> &'static str { self.into() }
}

/// A moderator's verdict. Only terminal statuses can be decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Decision {
  #[serde(rename = "spam")]
  Spam,
  #[serde(rename = "not spam")]
  NotSpam,
}

impl From<Decision> for Status {
  fn from(d: Decision) -> Self {
    match d {
      Decision::Spam => Status::Spam,
      Decision::NotSpam => Status::NotSpam,
    }
  }
}

// ─── WorkItem ────────────────────────────────────────────────────────────────

/// Current state of a queued video.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkItem {
  /// Store-assigned, strictly increasing with creation order.
  pub id:          i64,
  pub external_id: ExternalId,
  pub status:      Status,
  /// The moderator currently holding the item. Only ever set while
  /// `status == Pending`.
  pub assignee:    Option<WorkerId>,
  pub created_at:  DateTime<Utc>,
  /// Refreshed on every lease and decision.
  pub updated_at:  DateTime<Utc>,
}
