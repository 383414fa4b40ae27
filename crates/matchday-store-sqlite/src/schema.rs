//! SQL schema for the Matchday SQLite store.
//!
//! Applied at connection startup when `PRAGMA user_version` is behind
//! [`SCHEMA_VERSION`]. Later versions add a step per version to [`migrate`].

/// The `user_version` this build writes and understands.
pub const SCHEMA_VERSION: i64 = 1;

/// Full schema DDL; idempotent thanks to `IF NOT EXISTS`.
///
/// Timestamps are fixed-width RFC 3339 UTC strings, so `ORDER BY`, range
/// filters and `MAX()` on them follow time order.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;

-- One row per upstream fixture; every sync overwrites the whole row.
CREATE TABLE IF NOT EXISTS fixtures (
    fixture_id       TEXT PRIMARY KEY,
    home_team        TEXT NOT NULL,
    away_team        TEXT NOT NULL,
    home_team_badge  TEXT,
    away_team_badge  TEXT,
    competition_id   INTEGER NOT NULL,
    competition_name TEXT NOT NULL,
    competition_type TEXT NOT NULL,   -- 'league' | 'cup' | 'international'
    round            TEXT,
    kickoff          TEXT NOT NULL,
    match_date       TEXT NOT NULL,   -- UTC calendar date of kickoff
    venue_name       TEXT,
    venue_city       TEXT,
    status_code      TEXT NOT NULL,   -- raw upstream token
    last_synced_at   TEXT NOT NULL
);

-- A row means upstream answered for this slice, even with zero fixtures.
CREATE TABLE IF NOT EXISTS sync_log (
    competition_id INTEGER NOT NULL,
    sync_date      TEXT NOT NULL,
    synced_at      TEXT NOT NULL,
    PRIMARY KEY (competition_id, sync_date)
);

-- Successful geocodes only.
CREATE TABLE IF NOT EXISTS geocache (
    place_key   TEXT PRIMARY KEY,
    lat         REAL NOT NULL,
    lng         REAL NOT NULL,
    acquired_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS fixtures_date_idx    ON fixtures(match_date);
CREATE INDEX IF NOT EXISTS fixtures_kickoff_idx ON fixtures(kickoff);

PRAGMA user_version = 1;
";

/// Bring `conn` up to [`SCHEMA_VERSION`] and return the version found before.
///
/// A database written by a newer build is left untouched; the caller decides
/// whether to refuse it.
pub fn migrate(conn: &rusqlite::Connection) -> rusqlite::Result<i64> {
  let found: i64 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;
  if found < SCHEMA_VERSION {
    conn.execute_batch(SCHEMA)?;
  }
  Ok(found)
}

#[cfg(test)]
mod tests {
  use rusqlite::Connection;

  use super::*;

  fn user_version(conn: &Connection) -> i64 {
    conn.query_row("PRAGMA user_version", [], |row| row.get(0)).unwrap()
  }

  #[test]
  fn fresh_database_is_brought_to_the_current_version() {
    let conn = Connection::open_in_memory().unwrap();
    assert_eq!(migrate(&conn).unwrap(), 0);
    assert_eq!(user_version(&conn), SCHEMA_VERSION);
  }

  #[test]
  fn current_database_is_not_migrated_again() {
    let conn = Connection::open_in_memory().unwrap();
    migrate(&conn).unwrap();
    conn.execute_batch("DROP TABLE geocache;").unwrap();

    assert_eq!(migrate(&conn).unwrap(), SCHEMA_VERSION);
    let geocache: i64 = conn
      .query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE name = 'geocache'",
        [],
        |row| row.get(0),
      )
      .unwrap();
    assert_eq!(geocache, 0);
  }

  #[test]
  fn newer_database_is_left_alone() {
    let conn = Connection::open_in_memory().unwrap();
    conn.execute_batch("PRAGMA user_version = 7;").unwrap();

    assert_eq!(migrate(&conn).unwrap(), 7);
    assert_eq!(user_version(&conn), 7);
    let tables: i64 = conn
      .query_row("SELECT COUNT(*) FROM sqlite_master WHERE type = 'table'", [], |row| row.get(0))
      .unwrap();
    assert_eq!(tables, 0);
  }
}
