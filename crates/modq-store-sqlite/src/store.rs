//! [`SqliteStore`], the SQLite implementation of [`QueueStore`].

use std::{path::Path, time::Duration};

use chrono::Utc;
use rusqlite::{ErrorCode, OptionalExtension as _, TransactionBehavior};
use tracing::{debug, info, warn};

use modq_core::{
  audit::AuditEntry,
  item::{Decision, ExternalId, Status, WorkItem, WorkerId},
  store::{QueueStats, QueueStore},
};

use crate::{
  encode::{
    AUDIT_COLUMNS, ITEM_COLUMNS, RawAuditEntry, RawWorkItem, decode_status,
    encode_dt,
  },
  schema::{CONNECTION_PRAGMAS, MIGRATIONS},
  Error, Result,
};

/// Pause before the n-th claim retry is `CLAIM_BACKOFF * n`.
const CLAIM_BACKOFF: Duration = Duration::from_millis(2);

// ─── Options ─────────────────────────────────────────────────────────────────

/// Connection tuning for a [`SqliteStore`].
#[derive(Debug, Clone, Copy)]
pub struct StoreOptions {
  /// How long a write waits for another connection's write lock.
  pub busy_timeout:      Duration,
  /// Attempts a lease makes before giving up on a contended claim.
  pub claim_retry_limit: u32,
}

impl Default for StoreOptions {
  fn default() -> Self {
    Self {
      busy_timeout:      Duration::from_secs(5),
      claim_retry_limit: 32,
    }
  }
}

// ─── Store ───────────────────────────────────────────────────────────────────

/// A moderation queue backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted. Holds no
/// queue state of its own; every call reads committed rows.
#[derive(Clone)]
pub struct SqliteStore {
  conn:    tokio_rusqlite::Connection,
  options: StoreOptions,
}

/// Result of one claim attempt inside a single transaction.
enum ClaimAttempt {
  /// The worker already holds this item.
  Held(RawWorkItem),
  Claimed(RawWorkItem),
  Empty,
  /// A concurrent writer got there first; try again.
  Contended,
}

/// Result of a decision attempt, evaluated under the write lock.
enum DecideAttempt {
  Missing,
  Terminal(String),
  Foreign,
  Applied(RawWorkItem),
}

impl SqliteStore {
  /// Open (or create) a store at `path` with default options.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    Self::open_with(path, StoreOptions::default()).await
  }

  /// Open (or create) a store at `path` and bring its schema up to date.
  pub async fn open_with(
    path: impl AsRef<Path>,
    options: StoreOptions,
  ) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn, options };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store, useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn, options: StoreOptions::default() };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    let busy_timeout = self.options.busy_timeout;
    let (from, to) = self
      .conn
      .call(move |conn| {
        conn.busy_timeout(busy_timeout)?;
        conn.execute_batch(CONNECTION_PRAGMAS)?;

        // IMMEDIATE so concurrent openers apply each migration exactly once.
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let applied: i64 =
          tx.query_row("PRAGMA user_version", [], |row| row.get(0))?;
        let applied = usize::try_from(applied).unwrap_or(0);
        for (idx, sql) in MIGRATIONS.iter().enumerate().skip(applied) {
          tx.execute_batch(sql)?;
          tx.execute_batch(&format!("PRAGMA user_version = {}", idx + 1))?;
        }
        tx.commit()?;
        Ok((applied, MIGRATIONS.len().max(applied)))
      })
      .await?;

    if from < to {
      info!(from, to, "applied schema migrations");
    }
    Ok(())
  }

  /// Number of migrations recorded in the database header.
  pub async fn schema_version(&self) -> Result<i64> {
    Ok(
      self
        .conn
        .call(|conn| Ok(conn.query_row("PRAGMA user_version", [], |row| row.get(0))?))
        .await?,
    )
  }

  /// One optimistic claim: reuse check, candidate read, conditional update.
  async fn try_claim(&self, worker: &WorkerId) -> Result<ClaimAttempt> {
    let worker = worker.as_str().to_owned();
    let now = encode_dt(Utc::now());

    Ok(
      self
        .conn
        .call(move |conn| {
          // Deferred: reads see a snapshot; the UPDATE upgrades to a write
          // and fails with SQLITE_BUSY if that snapshot has gone stale.
          let tx = conn.transaction()?;

          let held =
            select_item(&tx, "status = 'pending' AND assignee = ?1", [&worker])?;
          if let Some(held) = held {
            return Ok(ClaimAttempt::Held(held));
          }

          let candidate: Option<i64> = tx
            .query_row(
              "SELECT id FROM work_items
               WHERE status = 'pending' AND assignee IS NULL
               ORDER BY id
               LIMIT 1",
              [],
              |row| row.get(0),
            )
            .optional()?;
          let Some(id) = candidate else {
            return Ok(ClaimAttempt::Empty);
          };

          let changed = match tx.execute(
            "UPDATE work_items SET assignee = ?1, updated_at = ?2
             WHERE id = ?3 AND status = 'pending' AND assignee IS NULL",
            rusqlite::params![worker, now, id],
          ) {
            Ok(n) => n,
            Err(e) if is_contention(&e) => return Ok(ClaimAttempt::Contended),
            Err(e) => return Err(e.into()),
          };
          if changed == 0 {
            return Ok(ClaimAttempt::Contended);
          }

          let claimed = select_item(&tx, "id = ?1", [id])?
            .ok_or(rusqlite::Error::QueryReturnedNoRows)?;
          match tx.commit() {
            Ok(()) => Ok(ClaimAttempt::Claimed(claimed)),
            Err(e) if is_contention(&e) => Ok(ClaimAttempt::Contended),
            Err(e) => Err(e.into()),
          }
        })
        .await?,
    )
  }
}

/// Fetch at most one `work_items` row matching `filter`.
fn select_item(
  conn: &rusqlite::Connection,
  filter: &str,
  params: impl rusqlite::Params,
) -> rusqlite::Result<Option<RawWorkItem>> {
  conn
    .query_row(
      &format!("SELECT {ITEM_COLUMNS} FROM work_items WHERE {filter}"),
      params,
      RawWorkItem::from_row,
    )
    .optional()
}

/// Errors that mean a racing writer won: busy/stale snapshot, or the
/// one-item-per-assignee index rejecting a second claim. Other constraint
/// failures are real errors and are not retried.
pub(crate) fn is_contention(e: &rusqlite::Error) -> bool {
  matches!(
    e.sqlite_error_code(),
    Some(ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked)
  ) || is_unique_violation(e)
}

fn is_unique_violation(e: &rusqlite::Error) -> bool {
  matches!(
    e,
    rusqlite::Error::SqliteFailure(f, _)
      if f.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
  )
}

// ─── QueueStore impl ─────────────────────────────────────────────────────────

impl QueueStore for SqliteStore {
  type Error = Error;

  async fn create(&self, external_id: ExternalId) -> Result<WorkItem> {
    let raw_id = external_id.get();
    let now = encode_dt(Utc::now());

    let inserted: Option<RawWorkItem> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        match tx.execute(
          "INSERT INTO work_items (external_id, status, created_at, updated_at)
           VALUES (?1, 'pending', ?2, ?2)",
          rusqlite::params![raw_id, now],
        ) {
          Ok(_) => {}
          Err(e) if is_unique_violation(&e) => return Ok(None),
          Err(e) => return Err(e.into()),
        }
        let id = tx.last_insert_rowid();
        tx.execute(
          "INSERT INTO audit_log (external_id, status, moderator, recorded_at)
           VALUES (?1, 'pending', NULL, ?2)",
          rusqlite::params![raw_id, now],
        )?;
        let item = select_item(&tx, "id = ?1", [id])?
          .ok_or(rusqlite::Error::QueryReturnedNoRows)?;
        tx.commit()?;
        Ok(Some(item))
      })
      .await?;

    match inserted {
      Some(raw) => {
        info!(video_id = raw_id, "queued video as pending");
        raw.into_item()
      }
      None => {
        warn!(video_id = raw_id, "attempted to queue duplicate video");
        Err(modq_core::Error::DuplicateExternalId(external_id).into())
      }
    }
  }

  async fn lease(&self, worker: &WorkerId) -> Result<WorkItem> {
    let limit = self.options.claim_retry_limit.max(1);

    for attempt in 0..limit {
      if attempt > 0 {
        tokio::time::sleep(CLAIM_BACKOFF * attempt).await;
      }
      match self.try_claim(worker).await? {
        ClaimAttempt::Held(raw) => {
          debug!(video_id = raw.external_id, %worker, "returning already assigned video");
          return raw.into_item();
        }
        ClaimAttempt::Claimed(raw) => {
          info!(video_id = raw.external_id, %worker, attempt, "assigned video");
          return raw.into_item();
        }
        ClaimAttempt::Empty => {
          debug!(%worker, "no video available");
          return Err(modq_core::Error::NoWorkAvailable.into());
        }
        ClaimAttempt::Contended => {
          debug!(%worker, attempt, "claim lost to a concurrent writer; retrying");
        }
      }
    }

    warn!(%worker, limit, "giving up on contended claim");
    Err(Error::ClaimContention(limit))
  }

  async fn decide(
    &self,
    worker: &WorkerId,
    external_id: ExternalId,
    decision: Decision,
  ) -> Result<WorkItem> {
    let raw_id = external_id.get();
    let worker_str = worker.as_str().to_owned();
    let status: &'static str = Status::from(decision).as_str();
    let now = encode_dt(Utc::now());

    let attempt = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let Some(current) = select_item(&tx, "external_id = ?1", [raw_id])? else {
          return Ok(DecideAttempt::Missing);
        };
        if current.status != Status::Pending.as_str() {
          return Ok(DecideAttempt::Terminal(current.status));
        }
        if current.assignee.as_deref() != Some(worker_str.as_str()) {
          return Ok(DecideAttempt::Foreign);
        }

        // Keep each item's history non-decreasing even if the clock steps back.
        let at = if current.updated_at > now { current.updated_at } else { now };

        tx.execute(
          "UPDATE work_items SET status = ?1, assignee = NULL, updated_at = ?2
           WHERE id = ?3",
          rusqlite::params![status, at, current.id],
        )?;
        tx.execute(
          "INSERT INTO audit_log (external_id, status, moderator, recorded_at)
           VALUES (?1, ?2, ?3, ?4)",
          rusqlite::params![raw_id, status, worker_str, at],
        )?;
        let updated = select_item(&tx, "id = ?1", [current.id])?
          .ok_or(rusqlite::Error::QueryReturnedNoRows)?;
        tx.commit()?;
        Ok(DecideAttempt::Applied(updated))
      })
      .await?;

    match attempt {
      DecideAttempt::Applied(raw) => {
        info!(video_id = raw_id, status, %worker, "video moderated");
        raw.into_item()
      }
      DecideAttempt::Missing => {
        warn!(video_id = raw_id, %worker, "decision on unknown video");
        Err(modq_core::Error::NotFound(external_id).into())
      }
      DecideAttempt::Terminal(current) => {
        let status = decode_status(&current)?;
        warn!(video_id = raw_id, %worker, %status, "decision on already moderated video");
        Err(modq_core::Error::AlreadyDecided { id: external_id, status }.into())
      }
      DecideAttempt::Foreign => {
        warn!(video_id = raw_id, %worker, "decision on video held by someone else");
        Err(
          modq_core::Error::NotOwner { id: external_id, worker: worker.clone() }
            .into(),
        )
      }
    }
  }

  async fn get(&self, external_id: ExternalId) -> Result<Option<WorkItem>> {
    let raw_id = external_id.get();
    let raw = self
      .conn
      .call(move |conn| Ok(select_item(conn, "external_id = ?1", [raw_id])?))
      .await?;
    raw.map(RawWorkItem::into_item).transpose()
  }

  async fn stats(&self) -> Result<QueueStats> {
    let counts: Vec<(String, i64)> = self
      .conn
      .call(|conn| {
        let mut stmt =
          conn.prepare("SELECT status, COUNT(*) FROM work_items GROUP BY status")?;
        let rows = stmt
          .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
          .collect::<rusqlite::Result<Vec<(String, i64)>>>()?;
        Ok(rows)
      })
      .await?;

    let mut stats = QueueStats::default();
    for (status, count) in counts {
      let count = u64::try_from(count).unwrap_or(0);
      match decode_status(&status)? {
        Status::Pending => stats.pending = count,
        Status::Spam => stats.spam = count,
        Status::NotSpam => stats.not_spam = count,
      }
    }
    Ok(stats)
  }

  async fn history(&self, external_id: ExternalId) -> Result<Vec<AuditEntry>> {
    let raw_id = external_id.get();

    let raws: Option<Vec<RawAuditEntry>> = self
      .conn
      .call(move |conn| {
        // One read transaction so existence and entries share a snapshot.
        let tx = conn.transaction()?;
        let exists = tx
          .query_row(
            "SELECT 1 FROM work_items WHERE external_id = ?1",
            [raw_id],
            |_| Ok(()),
          )
          .optional()?
          .is_some();
        if !exists {
          return Ok(None);
        }

        let mut stmt = tx.prepare(&format!(
          "SELECT {AUDIT_COLUMNS} FROM audit_log
           WHERE external_id = ?1
           ORDER BY recorded_at, entry_id"
        ))?;
        let rows = stmt
          .query_map([raw_id], RawAuditEntry::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(Some(rows))
      })
      .await?;

    match raws {
      Some(raws) => raws.into_iter().map(RawAuditEntry::into_entry).collect(),
      None => Err(modq_core::Error::NotFound(external_id).into()),
    }
  }
}
