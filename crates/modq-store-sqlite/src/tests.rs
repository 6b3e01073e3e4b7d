//! Integration tests for `SqliteStore` against in-memory and on-disk databases.

use std::{collections::HashSet, path::Path};

use modq_core::{
  item::{Decision, ExternalId, Status, WorkerId},
  store::{QueueStats, QueueStore},
};
use tokio::task::JoinSet;

use crate::{Error, SqliteStore, StoreOptions, schema::MIGRATIONS, store::is_contention};

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

async fn file_store(path: &Path) -> SqliteStore {
  SqliteStore::open_with(path, StoreOptions::default())
    .await
    .expect("file store")
}

fn vid(raw: i64) -> ExternalId { ExternalId::new(raw).unwrap() }

fn worker(name: &str) -> WorkerId { WorkerId::new(name).unwrap() }

fn core(err: Error) -> modq_core::Error { err.into() }

// ─── Schema ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn migrations_are_idempotent_across_reopen() {
  let dir = tempfile::tempdir().unwrap();
  let path = dir.path().join("queue.db");

  let first = file_store(&path).await;
  assert_eq!(first.schema_version().await.unwrap(), MIGRATIONS.len() as i64);
  first.create(vid(1)).await.unwrap();
  drop(first);

  let second = file_store(&path).await;
  assert_eq!(second.schema_version().await.unwrap(), MIGRATIONS.len() as i64);
  assert!(second.get(vid(1)).await.unwrap().is_some());
}

// ─── Create ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn create_queues_pending_unassigned_item() {
  let s = store().await;

  let item = s.create(vid(999_999)).await.unwrap();
  assert_eq!(item.external_id, vid(999_999));
  assert_eq!(item.status, Status::Pending);
  assert!(item.assignee.is_none());
  assert_eq!(item.created_at, item.updated_at);

  let fetched = s.get(vid(999_999)).await.unwrap().unwrap();
  assert_eq!(fetched, item);
}

#[tokio::test]
async fn create_duplicate_is_rejected() {
  let s = store().await;
  s.create(vid(888_888)).await.unwrap();

  let err = core(s.create(vid(888_888)).await.unwrap_err());
  assert!(matches!(err, modq_core::Error::DuplicateExternalId(id) if id == vid(888_888)));

  // The rejected insert leaves no second audit entry behind.
  assert_eq!(s.history(vid(888_888)).await.unwrap().len(), 1);
}

#[tokio::test]
async fn create_writes_initial_pending_entry() {
  let s = store().await;
  s.create(vid(7)).await.unwrap();

  let history = s.history(vid(7)).await.unwrap();
  assert_eq!(history.len(), 1);
  assert_eq!(history[0].external_id, vid(7));
  assert_eq!(history[0].status, Status::Pending);
  assert!(history[0].moderator.is_none());
}

#[tokio::test]
async fn get_missing_returns_none() {
  let s = store().await;
  assert!(s.get(vid(42)).await.unwrap().is_none());
}

// ─── Lease ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn lease_on_empty_queue_reports_no_work() {
  let s = store().await;
  let err = core(s.lease(&worker("alice")).await.unwrap_err());
  assert!(matches!(err, modq_core::Error::NoWorkAvailable));
  assert!(err.is_rejection());
}

#[tokio::test]
async fn lease_assigns_oldest_pending_item() {
  let s = store().await;
  s.create(vid(5001)).await.unwrap();
  s.create(vid(5000)).await.unwrap();

  let item = s.lease(&worker("alice")).await.unwrap();
  assert_eq!(item.external_id, vid(5001));
  assert_eq!(item.assignee, Some(worker("alice")));
  assert!(item.updated_at >= item.created_at);
}

#[tokio::test]
async fn lease_is_sticky_until_decided() {
  let s = store().await;
  s.create(vid(5002)).await.unwrap();
  s.create(vid(5003)).await.unwrap();

  let bob = worker("bob");
  let first = s.lease(&bob).await.unwrap();
  let second = s.lease(&bob).await.unwrap();
  let third = s.lease(&bob).await.unwrap();

  assert_eq!(first.external_id, vid(5002));
  assert_eq!(second, first);
  assert_eq!(third, first);

  // The second item is still available to someone else.
  let other = s.lease(&worker("carol")).await.unwrap();
  assert_eq!(other.external_id, vid(5003));
}

#[tokio::test]
async fn different_workers_get_different_items() {
  let s = store().await;
  s.create(vid(5003)).await.unwrap();
  s.create(vid(5004)).await.unwrap();

  let alice = s.lease(&worker("alice")).await.unwrap();
  let bob = s.lease(&worker("bob")).await.unwrap();

  assert_ne!(alice.external_id, bob.external_id);
  let got: HashSet<_> = [alice.external_id, bob.external_id].into();
  let want: HashSet<_> = [vid(5003), vid(5004)].into();
  assert_eq!(got, want);
}

#[tokio::test]
async fn second_worker_gets_nothing_when_all_assigned() {
  let s = store().await;
  s.create(vid(5005)).await.unwrap();
  s.lease(&worker("alice")).await.unwrap();

  let err = core(s.lease(&worker("bob")).await.unwrap_err());
  assert!(matches!(err, modq_core::Error::NoWorkAvailable));
}

#[tokio::test]
async fn lease_writes_no_audit_entry() {
  let s = store().await;
  s.create(vid(11)).await.unwrap();
  s.lease(&worker("alice")).await.unwrap();
  assert_eq!(s.history(vid(11)).await.unwrap().len(), 1);
}

#[tokio::test]
async fn decided_worker_moves_on_to_next_item() {
  let s = store().await;
  s.create(vid(21)).await.unwrap();
  s.create(vid(22)).await.unwrap();

  let alice = worker("alice");
  let first = s.lease(&alice).await.unwrap();
  s.decide(&alice, first.external_id, Decision::NotSpam).await.unwrap();

  let next = s.lease(&alice).await.unwrap();
  assert_eq!(next.external_id, vid(22));
}

#[tokio::test]
async fn lease_follows_creation_order_not_wall_clock() {
  let dir = tempfile::tempdir().unwrap();
  let path = dir.path().join("queue.db");
  let s = file_store(&path).await;
  s.create(vid(31)).await.unwrap();
  s.create(vid(32)).await.unwrap();

  // The later row carries an earlier timestamp, as after a clock step back.
  let raw = rusqlite::Connection::open(&path).unwrap();
  raw
    .execute(
      "UPDATE work_items SET created_at = '2000-01-01T00:00:00.000000Z'
       WHERE external_id = 32",
      [],
    )
    .unwrap();
  drop(raw);

  let first = s.lease(&worker("alice")).await.unwrap();
  assert_eq!(first.external_id, vid(31));
  let second = s.lease(&worker("bob")).await.unwrap();
  assert_eq!(second.external_id, vid(32));
}

// ─── Decide ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn decide_spam_updates_item_and_appends_audit_entry() {
  let s = store().await;
  s.create(vid(6001)).await.unwrap();
  let alice = worker("alice");
  s.lease(&alice).await.unwrap();

  let item = s.decide(&alice, vid(6001), Decision::Spam).await.unwrap();
  assert_eq!(item.external_id, vid(6001));
  assert_eq!(item.status, Status::Spam);
  assert!(item.assignee.is_none());

  let history = s.history(vid(6001)).await.unwrap();
  assert_eq!(history.len(), 2);
  assert_eq!(history[1].status, Status::Spam);
  assert_eq!(history[1].moderator, Some(alice));
  assert_eq!(history[1].recorded_at, item.updated_at);
}

#[tokio::test]
async fn decide_not_spam_updates_item() {
  let s = store().await;
  s.create(vid(6002)).await.unwrap();
  let bob = worker("bob");
  s.lease(&bob).await.unwrap();

  let item = s.decide(&bob, vid(6002), Decision::NotSpam).await.unwrap();
  assert_eq!(item.status, Status::NotSpam);

  let history = s.history(vid(6002)).await.unwrap();
  assert_eq!(history.last().unwrap().status, Status::NotSpam);
  assert_eq!(history.last().unwrap().moderator, Some(bob));
}

#[tokio::test]
async fn decide_unknown_item_is_not_found() {
  let s = store().await;
  let err = core(
    s.decide(&worker("alice"), vid(404), Decision::Spam)
      .await
      .unwrap_err(),
  );
  assert!(matches!(err, modq_core::Error::NotFound(id) if id == vid(404)));
}

#[tokio::test]
async fn decide_by_non_owner_is_rejected_and_changes_nothing() {
  let s = store().await;
  s.create(vid(6003)).await.unwrap();
  let alice = worker("alice");
  let leased = s.lease(&alice).await.unwrap();

  let err = core(
    s.decide(&worker("mallory"), vid(6003), Decision::Spam)
      .await
      .unwrap_err(),
  );
  assert!(matches!(
    err,
    modq_core::Error::NotOwner { id, ref worker } if id == vid(6003) && worker.as_str() == "mallory"
  ));

  let after = s.get(vid(6003)).await.unwrap().unwrap();
  assert_eq!(after, leased);
  assert_eq!(s.history(vid(6003)).await.unwrap().len(), 1);
}

#[tokio::test]
async fn decide_unleased_item_is_not_owner() {
  let s = store().await;
  s.create(vid(6004)).await.unwrap();

  let err = core(
    s.decide(&worker("alice"), vid(6004), Decision::NotSpam)
      .await
      .unwrap_err(),
  );
  assert!(matches!(err, modq_core::Error::NotOwner { .. }));
  assert_eq!(s.get(vid(6004)).await.unwrap().unwrap().status, Status::Pending);
}

#[tokio::test]
async fn decide_twice_is_already_decided_without_duplicate_entry() {
  let s = store().await;
  s.create(vid(6005)).await.unwrap();
  let alice = worker("alice");
  s.lease(&alice).await.unwrap();
  s.decide(&alice, vid(6005), Decision::Spam).await.unwrap();

  let err = core(
    s.decide(&alice, vid(6005), Decision::NotSpam)
      .await
      .unwrap_err(),
  );
  assert!(matches!(
    err,
    modq_core::Error::AlreadyDecided { id, status: Status::Spam } if id == vid(6005)
  ));

  let item = s.get(vid(6005)).await.unwrap().unwrap();
  assert_eq!(item.status, Status::Spam);
  assert_eq!(s.history(vid(6005)).await.unwrap().len(), 2);
}

#[tokio::test]
async fn terminal_status_is_checked_before_ownership() {
  let s = store().await;
  s.create(vid(6006)).await.unwrap();
  let alice = worker("alice");
  s.lease(&alice).await.unwrap();
  s.decide(&alice, vid(6006), Decision::NotSpam).await.unwrap();

  let err = core(
    s.decide(&worker("bob"), vid(6006), Decision::Spam)
      .await
      .unwrap_err(),
  );
  assert!(matches!(err, modq_core::Error::AlreadyDecided { .. }));
}

#[tokio::test]
async fn concurrent_decisions_on_one_item_commit_once() {
  let s = store().await;
  s.create(vid(6007)).await.unwrap();
  let alice = worker("alice");
  s.lease(&alice).await.unwrap();

  let mut set = JoinSet::new();
  for decision in [Decision::Spam, Decision::NotSpam, Decision::Spam] {
    let s = s.clone();
    let alice = alice.clone();
    set.spawn(async move { s.decide(&alice, vid(6007), decision).await });
  }

  let mut applied = 0;
  while let Some(res) = set.join_next().await {
    match res.unwrap() {
      Ok(_) => applied += 1,
      Err(e) => assert!(matches!(core(e), modq_core::Error::AlreadyDecided { .. })),
    }
  }
  assert_eq!(applied, 1);
  assert_eq!(s.history(vid(6007)).await.unwrap().len(), 2);
}

// ─── Stats & history ─────────────────────────────────────────────────────────

#[tokio::test]
async fn stats_on_empty_queue_are_zero() {
  let s = store().await;
  assert_eq!(s.stats().await.unwrap(), QueueStats::default());
}

#[tokio::test]
async fn stats_track_each_decision() {
  let s = store().await;
  for raw in 1..=4 {
    s.create(vid(raw)).await.unwrap();
  }
  assert_eq!(s.stats().await.unwrap().pending, 4);

  let alice = worker("alice");
  let item = s.lease(&alice).await.unwrap();
  let before = s.stats().await.unwrap();
  s.decide(&alice, item.external_id, Decision::NotSpam).await.unwrap();
  let after = s.stats().await.unwrap();

  assert_eq!(after.pending, before.pending - 1);
  assert_eq!(after.not_spam, before.not_spam + 1);
  assert_eq!(after.spam, before.spam);
  assert_eq!(after.pending + after.spam + after.not_spam, 4);
}

#[tokio::test]
async fn history_of_unknown_item_is_not_found() {
  let s = store().await;
  let err = core(s.history(vid(31337)).await.unwrap_err());
  assert!(matches!(err, modq_core::Error::NotFound(_)));
}

// ─── End to end ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn two_moderators_walkthrough() {
  let s = store().await;
  s.create(vid(1001)).await.unwrap();
  s.create(vid(1002)).await.unwrap();

  let john = worker("john");
  let jane = worker("jane");

  assert_eq!(s.lease(&john).await.unwrap().external_id, vid(1001));
  assert_eq!(s.lease(&jane).await.unwrap().external_id, vid(1002));
  assert_eq!(s.lease(&john).await.unwrap().external_id, vid(1001));

  s.decide(&john, vid(1001), Decision::Spam).await.unwrap();

  let err = core(s.lease(&john).await.unwrap_err());
  assert!(matches!(err, modq_core::Error::NoWorkAvailable));

  assert_eq!(
    s.stats().await.unwrap(),
    QueueStats { pending: 1, spam: 1, not_spam: 0 }
  );

  let history = s.history(vid(1001)).await.unwrap();
  let trail: Vec<_> = history
    .iter()
    .map(|e| (e.status, e.moderator.as_ref().map(WorkerId::as_str)))
    .collect();
  assert_eq!(trail, [(Status::Pending, None), (Status::Spam, Some("john"))]);
  assert!(history[0].recorded_at <= history[1].recorded_at);
}

// ─── Concurrency ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn concurrent_leases_get_distinct_oldest_items() {
  let s = store().await;
  for raw in 100..120 {
    s.create(vid(raw)).await.unwrap();
  }

  let mut set = JoinSet::new();
  for n in 0..8 {
    let s = s.clone();
    set.spawn(async move { s.lease(&worker(&format!("mod-{n}"))).await });
  }

  let mut got = HashSet::new();
  while let Some(res) = set.join_next().await {
    assert!(got.insert(res.unwrap().unwrap().external_id));
  }
  let oldest: HashSet<_> = (100..108).map(vid).collect();
  assert_eq!(got, oldest);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn leases_across_connections_never_share_an_item() {
  let dir = tempfile::tempdir().unwrap();
  let path = dir.path().join("queue.db");

  let seed = file_store(&path).await;
  for raw in 1..=12 {
    seed.create(vid(raw)).await.unwrap();
  }

  let mut stores = Vec::new();
  for _ in 0..6 {
    stores.push(file_store(&path).await);
  }

  let mut set = JoinSet::new();
  for (n, s) in stores.into_iter().enumerate() {
    set.spawn(async move { s.lease(&worker(&format!("mod-{n}"))).await });
  }

  let mut got = HashSet::new();
  while let Some(res) = set.join_next().await {
    assert!(got.insert(res.unwrap().unwrap().external_id));
  }
  let oldest: HashSet<_> = (1..=6).map(vid).collect();
  assert_eq!(got, oldest);
  assert_eq!(seed.stats().await.unwrap().pending, 12);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn same_worker_racing_across_connections_holds_one_item() {
  let dir = tempfile::tempdir().unwrap();
  let path = dir.path().join("queue.db");

  let seed = file_store(&path).await;
  for raw in 1..=5 {
    seed.create(vid(raw)).await.unwrap();
  }

  let mut set = JoinSet::new();
  for _ in 0..4 {
    let s = file_store(&path).await;
    set.spawn(async move { s.lease(&worker("john")).await });
  }

  let mut got = HashSet::new();
  while let Some(res) = set.join_next().await {
    got.insert(res.unwrap().unwrap().external_id);
  }
  assert_eq!(got.len(), 1);

  // Everything else is still claimable.
  let jane = seed.lease(&worker("jane")).await.unwrap();
  assert!(!got.contains(&jane.external_id));
}

#[test]
fn only_lock_and_unique_failures_count_as_contention() {
  use rusqlite::ffi;

  let failure = |code: i32| rusqlite::Error::SqliteFailure(ffi::Error::new(code), None);
  assert!(is_contention(&failure(ffi::SQLITE_BUSY)));
  assert!(is_contention(&failure(ffi::SQLITE_LOCKED)));
  assert!(is_contention(&failure(ffi::SQLITE_CONSTRAINT_UNIQUE)));
  assert!(!is_contention(&failure(ffi::SQLITE_CONSTRAINT_CHECK)));
  assert!(!is_contention(&failure(ffi::SQLITE_CONSTRAINT_FOREIGNKEY)));
  assert!(!is_contention(&failure(ffi::SQLITE_CONSTRAINT_NOTNULL)));
}

// ─── Durability ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn state_survives_reopen() {
  let dir = tempfile::tempdir().unwrap();
  let path = dir.path().join("queue.db");

  let (stats, history, held) = {
    let s = file_store(&path).await;
    for raw in [1001, 1002, 1003] {
      s.create(vid(raw)).await.unwrap();
    }
    let john = worker("john");
    s.lease(&john).await.unwrap();
    s.decide(&john, vid(1001), Decision::Spam).await.unwrap();
    let held = s.lease(&worker("jane")).await.unwrap();
    (
      s.stats().await.unwrap(),
      s.history(vid(1001)).await.unwrap(),
      held,
    )
  };

  let reopened = file_store(&path).await;
  assert_eq!(reopened.stats().await.unwrap(), stats);
  assert_eq!(reopened.history(vid(1001)).await.unwrap(), history);

  // Leases are stored on the row, so the sticky lease survives too.
  assert_eq!(reopened.lease(&worker("jane")).await.unwrap(), held);
}
