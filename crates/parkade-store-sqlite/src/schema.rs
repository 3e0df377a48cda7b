//! SQL schema for the Parkade SQLite store.
//!
//! Executed once at connection startup through [`init`]. Older files are
//! migrated forward based on `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

-- highest_number only ever grows; growth numbering starts above it so that
-- numbers freed by a shrink are never reissued.
CREATE TABLE IF NOT EXISTS lots (
    lot_id          INTEGER PRIMARY KEY AUTOINCREMENT,
    name            TEXT NOT NULL,
    created_at      TEXT NOT NULL,
    highest_number  INTEGER NOT NULL DEFAULT 0 CHECK (highest_number >= 0)
);

CREATE TABLE IF NOT EXISTS zones (
    zone_id     TEXT PRIMARY KEY,
    lot_id      INTEGER NOT NULL REFERENCES lots(lot_id),
    name        TEXT NOT NULL,
    capacity    INTEGER NOT NULL,
    created_at  TEXT NOT NULL,
    UNIQUE (lot_id, name)
);

-- The primary key is what keeps two concurrent writers from ever persisting
-- the same number twice.
CREATE TABLE IF NOT EXISTS spots (
    lot_id   INTEGER NOT NULL REFERENCES lots(lot_id),
    number   INTEGER NOT NULL CHECK (number >= 0),
    segment  TEXT NOT NULL,                -- 'car' | 'motorcycle' | 'light_truck'
    state    TEXT NOT NULL DEFAULT 'free',
    zone     TEXT,                         -- zone name, NULL outside zones
    PRIMARY KEY (lot_id, number)
);

-- Written by entry/exit registration. spot_number is set to NULL on closed
-- rows before their spot is deleted; the foreign key refuses to delete a
-- spot an open row still points at.
CREATE TABLE IF NOT EXISTS occupations (
    occupation_id TEXT PRIMARY KEY,
    lot_id        INTEGER NOT NULL REFERENCES lots(lot_id),
    plate         TEXT NOT NULL,
    spot_number   INTEGER,
    entry_time    TEXT NOT NULL,
    exit_time     TEXT,                    -- NULL while the vehicle is inside
    FOREIGN KEY (lot_id, spot_number) REFERENCES spots(lot_id, number)
);

-- Timestamps are fixed-width RFC 3339 (microseconds, 'Z'), so the validity
-- comparisons below can run on the stored text.
CREATE TABLE IF NOT EXISTS subscriptions (
    lot_id              INTEGER NOT NULL REFERENCES lots(lot_id),
    subscription_number INTEGER NOT NULL,
    holder              TEXT NOT NULL,
    spot_number         INTEGER,
    validity_start      TEXT NOT NULL,
    validity_end        TEXT NOT NULL,
    state               TEXT NOT NULL DEFAULT 'active',
    allowed_vehicles    TEXT NOT NULL DEFAULT '[]',   -- JSON array of plates
    PRIMARY KEY (lot_id, subscription_number)
);

CREATE INDEX IF NOT EXISTS occupations_open_idx
    ON occupations(lot_id, spot_number) WHERE exit_time IS NULL;
CREATE INDEX IF NOT EXISTS subscriptions_state_idx
    ON subscriptions(lot_id, state, validity_end);

PRAGMA user_version = 2;
";

/// Version 1 had no high-water mark; seed it from the spots still stored.
const MIGRATE_V1_TO_V2: &str = "
ALTER TABLE lots
    ADD COLUMN highest_number INTEGER NOT NULL DEFAULT 0 CHECK (highest_number >= 0);
UPDATE lots SET highest_number = COALESCE(
    (SELECT MAX(number) FROM spots WHERE spots.lot_id = lots.lot_id),
    0
);
";

/// Bring `conn` up to the current schema.
pub fn init(conn: &rusqlite::Connection) -> rusqlite::Result<()> {
  let version: i64 = conn.query_row("PRAGMA user_version", [], |r| r.get(0))?;
  if version == 1 {
    conn.execute_batch(MIGRATE_V1_TO_V2)?;
  }
  conn.execute_batch(SCHEMA)
}
