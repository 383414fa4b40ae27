//! [`SqliteStore`] — the SQLite implementation of the Matchday storage traits.

use std::path::Path;

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{OptionalExtension as _, types::Value};

use matchday_core::{
  fixture::{Fixture, FixtureId},
  geo::{Coordinates, GeoCacheEntry, PlaceKey},
  status::StatusTransition,
  store::{FixtureChanges, FixtureStore, GeoStore, SyncLedger, UpsertOutcome},
  sync::{SyncPartitionKey, SyncRecord},
};

use crate::{
  encode::{FIXTURE_COLUMNS, RawFixture, RawGeoEntry, decode_dt, encode_date, encode_dt},
  Error, Result,
  schema::{self, SCHEMA_VERSION},
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A Matchday cache backed by a single SQLite file.
///
/// Cloning is cheap — the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store — useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    let found = self.conn.call(|conn| Ok(schema::migrate(conn)?)).await?;
    if found > SCHEMA_VERSION {
      return Err(Error::SchemaTooNew { found, supported: SCHEMA_VERSION });
    }
    if found < SCHEMA_VERSION {
      tracing::info!(from = found, to = SCHEMA_VERSION, "migrated store schema");
    }
    Ok(())
  }

  /// Run a `SELECT {FIXTURE_COLUMNS} FROM fixtures ...` query and decode
  /// every row.
  async fn select_fixtures(
    &self,
    tail:   &'static str,
    params: Vec<Value>,
  ) -> Result<Vec<Fixture>> {
    let raws: Vec<RawFixture> = self
      .conn
      .call(move |conn| {
        let sql = format!("SELECT {FIXTURE_COLUMNS} FROM fixtures {tail}");
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(rusqlite::params_from_iter(params), RawFixture::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawFixture::into_fixture).collect()
  }
}

// ─── FixtureStore impl ───────────────────────────────────────────────────────

impl FixtureStore for SqliteStore {
  type Error = crate::Error;

  async fn upsert(&self, fixture: Fixture) -> Result<UpsertOutcome> {
    let raw = RawFixture::encode(&fixture);
    let match_date = encode_date(fixture.match_date());

    // Read the previous row and write the new one inside one transaction so
    // two syncs of the same id cannot interleave.
    let previous: Option<(String, String, String)> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;

        let previous: Option<(String, String, String)> = tx
          .query_row(
            "SELECT kickoff, status_code, last_synced_at
             FROM fixtures WHERE fixture_id = ?1",
            rusqlite::params![raw.fixture_id],
            |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)),
          )
          .optional()?;

        let incoming_is_older = previous
          .as_ref()
          .is_some_and(|(_, _, stored)| *stored > raw.last_synced_at);

        if !incoming_is_older {
          tx.execute(
            "INSERT INTO fixtures (
               fixture_id, home_team, away_team, home_team_badge,
               away_team_badge, competition_id, competition_name,
               competition_type, round, kickoff, match_date, venue_name,
               venue_city, status_code, last_synced_at
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)
             ON CONFLICT(fixture_id) DO UPDATE SET
               home_team        = excluded.home_team,
               away_team        = excluded.away_team,
               home_team_badge  = excluded.home_team_badge,
               away_team_badge  = excluded.away_team_badge,
               competition_id   = excluded.competition_id,
               competition_name = excluded.competition_name,
               competition_type = excluded.competition_type,
               round            = excluded.round,
               kickoff          = excluded.kickoff,
               match_date       = excluded.match_date,
               venue_name       = excluded.venue_name,
               venue_city       = excluded.venue_city,
               status_code      = excluded.status_code,
               last_synced_at   = excluded.last_synced_at",
            rusqlite::params![
              raw.fixture_id,
              raw.home_team,
              raw.away_team,
              raw.home_team_badge,
              raw.away_team_badge,
              raw.competition_id,
              raw.competition_name,
              raw.competition_type,
              raw.round,
              raw.kickoff,
              match_date,
              raw.venue_name,
              raw.venue_city,
              raw.status_code,
              raw.last_synced_at,
            ],
          )?;
        }

        tx.commit()?;
        Ok(previous)
      })
      .await?;

    let Some((kickoff, status_code, stored_synced_at)) = previous else {
      return Ok(UpsertOutcome::Inserted);
    };

    let stored_synced_at = decode_dt(&stored_synced_at)?;
    if stored_synced_at > fixture.last_synced_at {
      tracing::debug!(
        fixture = %fixture.id,
        %stored_synced_at,
        incoming_synced_at = %fixture.last_synced_at,
        "ignoring older fixture snapshot"
      );
      return Ok(UpsertOutcome::Stale { stored_synced_at });
    }

    let previous_kickoff = decode_dt(&kickoff)?;
    Ok(UpsertOutcome::Updated(FixtureChanges {
      kickoff: (previous_kickoff != fixture.kickoff)
        .then_some((previous_kickoff, fixture.kickoff)),
      status:  StatusTransition::between(&status_code, &fixture.status_code),
    }))
  }

  async fn get(&self, id: &FixtureId) -> Result<Option<Fixture>> {
    let mut fixtures = self
      .select_fixtures("WHERE fixture_id = ?1", vec![Value::Text(id.0.clone())])
      .await?;
    Ok(fixtures.pop())
  }

  async fn query_by_date(&self, date: NaiveDate) -> Result<Vec<Fixture>> {
    self
      .select_fixtures(
        "WHERE match_date = ?1 ORDER BY kickoff, fixture_id",
        vec![Value::Text(encode_date(date))],
      )
      .await
  }

  async fn query_upcoming_from(
    &self,
    from:  DateTime<Utc>,
    limit: usize,
  ) -> Result<Vec<Fixture>> {
    let limit = i64::try_from(limit).unwrap_or(i64::MAX);
    self
      .select_fixtures(
        "WHERE kickoff >= ?1 ORDER BY kickoff, fixture_id LIMIT ?2",
        vec![Value::Text(encode_dt(from)), Value::Integer(limit)],
      )
      .await
  }
}

// ─── SyncLedger impl ─────────────────────────────────────────────────────────

impl SyncLedger for SqliteStore {
  type Error = crate::Error;

  async fn sync_record(&self, key: SyncPartitionKey) -> Result<Option<SyncRecord>> {
    let competition_id = key.competition_id.0;
    let sync_date      = encode_date(key.date);

    let synced_at: Option<String> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            "SELECT synced_at FROM sync_log
             WHERE competition_id = ?1 AND sync_date = ?2",
            rusqlite::params![competition_id, sync_date],
            |r| r.get(0),
          )
          .optional()?)
      })
      .await?;

    synced_at
      .map(|at| {
        decode_dt(&at).map(|last_confirmed_at| SyncRecord { key, last_confirmed_at })
      })
      .transpose()
  }

  async fn mark_synced(
    &self,
    key: SyncPartitionKey,
    at:  DateTime<Utc>,
  ) -> Result<SyncRecord> {
    let competition_id = key.competition_id.0;
    let sync_date      = encode_date(key.date);
    let at_str         = encode_dt(at);

    // MAX() keeps the later timestamp when syncs complete out of order.
    let stored: String = self
      .conn
      .call(move |conn| {
        Ok(conn.query_row(
          "INSERT INTO sync_log (competition_id, sync_date, synced_at)
           VALUES (?1, ?2, ?3)
           ON CONFLICT(competition_id, sync_date) DO UPDATE SET
             synced_at = MAX(sync_log.synced_at, excluded.synced_at)
           RETURNING synced_at",
          rusqlite::params![competition_id, sync_date, at_str],
          |r| r.get(0),
        )?)
      })
      .await?;

    Ok(SyncRecord { key, last_confirmed_at: decode_dt(&stored)? })
  }
}

// ─── GeoStore impl ───────────────────────────────────────────────────────────

impl GeoStore for SqliteStore {
  type Error = crate::Error;

  async fn get_place(&self, key: &PlaceKey) -> Result<Option<GeoCacheEntry>> {
    let key = key.as_str().to_owned();

    let raw: Option<RawGeoEntry> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            "SELECT place_key, lat, lng, acquired_at FROM geocache
             WHERE place_key = ?1",
            rusqlite::params![key],
            |row| {
              Ok(RawGeoEntry {
                place_key:   row.get(0)?,
                lat:         row.get(1)?,
                lng:         row.get(2)?,
                acquired_at: row.get(3)?,
              })
            },
          )
          .optional()?)
      })
      .await?;

    raw.map(RawGeoEntry::into_entry).transpose()
  }

  async fn put_place(&self, entry: GeoCacheEntry) -> Result<()> {
    let key         = entry.key.as_str().to_owned();
    let acquired_at = encode_dt(entry.acquired_at);
    let Coordinates { lat, lng } = entry.coordinates;

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO geocache (place_key, lat, lng, acquired_at)
           VALUES (?1, ?2, ?3, ?4)
           ON CONFLICT(place_key) DO UPDATE SET
             lat         = excluded.lat,
             lng         = excluded.lng,
             acquired_at = excluded.acquired_at",
          rusqlite::params![key, lat, lng, acquired_at],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}
