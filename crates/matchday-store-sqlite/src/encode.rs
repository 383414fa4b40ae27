//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as RFC 3339 strings with a fixed microsecond
//! precision and a `Z` suffix; dates as `YYYY-MM-DD`.

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use matchday_core::{
  fixture::{CompetitionId, CompetitionType, Fixture, FixtureId},
  geo::{Coordinates, GeoCacheEntry, PlaceKey},
};

use crate::{Error, Result};

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(format!("{s:?}: {e}")))
}

// ─── NaiveDate ───────────────────────────────────────────────────────────────

pub fn encode_date(date: NaiveDate) -> String {
  date.format("%Y-%m-%d").to_string()
}

// ─── CompetitionType ─────────────────────────────────────────────────────────

pub fn encode_competition_type(kind: CompetitionType) -> &'static str {
  kind.as_str()
}

pub fn decode_competition_type(s: &str) -> Result<CompetitionType> {
  match s {
    "league" => Ok(CompetitionType::League),
    "cup" => Ok(CompetitionType::Cup),
    "international" => Ok(CompetitionType::International),
    other => Err(Error::Decode {
      column: "competition_type",
      value:  other.to_owned(),
    }),
  }
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Column list matching the field order of [`RawFixture::from_row`].
pub const FIXTURE_COLUMNS: &str = "fixture_id, home_team, away_team, \
   home_team_badge, away_team_badge, competition_id, competition_name, \
   competition_type, round, kickoff, venue_name, venue_city, status_code, \
   last_synced_at";

/// Raw values read directly from (or about to be written to) a `fixtures`
/// row.
pub struct RawFixture {
  pub fixture_id:       String,
  pub home_team:        String,
  pub away_team:        String,
  pub home_team_badge:  Option<String>,
  pub away_team_badge:  Option<String>,
  pub competition_id:   u32,
  pub competition_name: String,
  pub competition_type: String,
  pub round:            Option<String>,
  pub kickoff:          String,
  pub venue_name:       Option<String>,
  pub venue_city:       Option<String>,
  pub status_code:      String,
  pub last_synced_at:   String,
}

impl RawFixture {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      fixture_id:       row.get(0)?,
      home_team:        row.get(1)?,
      away_team:        row.get(2)?,
      home_team_badge:  row.get(3)?,
      away_team_badge:  row.get(4)?,
      competition_id:   row.get(5)?,
      competition_name: row.get(6)?,
      competition_type: row.get(7)?,
      round:            row.get(8)?,
      kickoff:          row.get(9)?,
      venue_name:       row.get(10)?,
      venue_city:       row.get(11)?,
      status_code:      row.get(12)?,
      last_synced_at:   row.get(13)?,
    })
  }

  pub fn encode(fixture: &Fixture) -> Self {
    Self {
      fixture_id:       fixture.id.0.clone(),
      home_team:        fixture.home_team.clone(),
      away_team:        fixture.away_team.clone(),
      home_team_badge:  fixture.home_team_badge.clone(),
      away_team_badge:  fixture.away_team_badge.clone(),
      competition_id:   fixture.competition_id.0,
      competition_name: fixture.competition_name.clone(),
      competition_type: encode_competition_type(fixture.competition_type)
        .to_owned(),
      round:            fixture.round.clone(),
      kickoff:          encode_dt(fixture.kickoff),
      venue_name:       fixture.venue_name.clone(),
      venue_city:       fixture.venue_city.clone(),
      status_code:      fixture.status_code.clone(),
      last_synced_at:   encode_dt(fixture.last_synced_at),
    }
  }

  pub fn into_fixture(self) -> Result<Fixture> {
    Ok(Fixture {
      id:                FixtureId(self.fixture_id),
      home_team:         self.home_team,
      away_team:         self.away_team,
      home_team_badge:   self.home_team_badge,
      away_team_badge:   self.away_team_badge,
      competition_id:    CompetitionId(self.competition_id),
      competition_name:  self.competition_name,
      competition_type:  decode_competition_type(&self.competition_type)?,
      round:             self.round,
      kickoff:           decode_dt(&self.kickoff)?,
      venue_name:        self.venue_name,
      venue_city:        self.venue_city,
      venue_coordinates: None,
      status_code:       self.status_code,
      last_synced_at:    decode_dt(&self.last_synced_at)?,
    })
  }
}

/// Raw values read directly from a `geocache` row.
pub struct RawGeoEntry {
  pub place_key:   String,
  pub lat:         f64,
  pub lng:         f64,
  pub acquired_at: String,
}

impl RawGeoEntry {
  pub fn into_entry(self) -> Result<GeoCacheEntry> {
    let key = PlaceKey::new(&self.place_key).ok_or_else(|| Error::Decode {
      column: "place_key",
      value:  self.place_key.clone(),
    })?;
    let coordinates =
      Coordinates::new(self.lat, self.lng).ok_or_else(|| Error::Decode {
        column: "lat/lng",
        value:  format!("{}, {}", self.lat, self.lng),
      })?;
    Ok(GeoCacheEntry {
      key,
      coordinates,
      acquired_at: decode_dt(&self.acquired_at)?,
    })
  }
}
