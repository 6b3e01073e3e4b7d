//! SQL schema for the moderation queue store.
//!
//! Migrations are applied in order and gated on `PRAGMA user_version`: the
//! version is the number of entries of [`MIGRATIONS`] already applied.

/// Per-connection settings; run before migrations, outside any transaction.
pub const CONNECTION_PRAGMAS: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;
";

/// Ordered schema migrations. Never edit an entry once released; append.
pub const MIGRATIONS: &[&str] = &[WORK_ITEMS, AUDIT_LOG, BACKLOG_BY_ID];

const WORK_ITEMS: &str = "
CREATE TABLE IF NOT EXISTS work_items (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    external_id INTEGER NOT NULL UNIQUE CHECK (external_id > 0),
    status      TEXT    NOT NULL DEFAULT 'pending'
                CHECK (status IN ('pending', 'spam', 'not spam')),
    assignee    TEXT,              -- moderator holding the item; NULL once decided
    created_at  TEXT    NOT NULL,  -- fixed-width RFC 3339 UTC; sorts lexically
    updated_at  TEXT    NOT NULL,
    CHECK (assignee IS NULL OR status = 'pending')
);

-- Backlog scan: oldest unassigned pending item first.
CREATE INDEX IF NOT EXISTS work_items_backlog_idx
    ON work_items(created_at, id)
    WHERE status = 'pending' AND assignee IS NULL;

-- A moderator holds at most one pending item.
CREATE UNIQUE INDEX IF NOT EXISTS work_items_assignee_idx
    ON work_items(assignee)
    WHERE status = 'pending' AND assignee IS NOT NULL;
";

const AUDIT_LOG: &str = "
-- Strictly append-only. No UPDATE or DELETE is ever issued against this table.
CREATE TABLE IF NOT EXISTS audit_log (
    entry_id    INTEGER PRIMARY KEY AUTOINCREMENT,
    external_id INTEGER NOT NULL
                REFERENCES work_items(external_id) ON DELETE CASCADE,
    status      TEXT    NOT NULL,
    moderator   TEXT,              -- NULL for the creation entry
    recorded_at TEXT    NOT NULL
);

CREATE INDEX IF NOT EXISTS audit_log_item_idx
    ON audit_log(external_id, recorded_at, entry_id);
";

// Row ids follow commit order under the write lock; wall-clock `created_at`
// does not across processes or clock steps.
const BACKLOG_BY_ID: &str = "
DROP INDEX IF EXISTS work_items_backlog_idx;

CREATE INDEX IF NOT EXISTS work_items_backlog_id_idx
    ON work_items(id)
    WHERE status = 'pending' AND assignee IS NULL;
";
