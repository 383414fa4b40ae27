//! Fixture types — the records the cache exists to serve.
//!
//! A fixture is a full snapshot of one scheduled match as upstream last
//! reported it. Re-syncing replaces the snapshot wholesale; there is no
//! field-level patching.

use std::{fmt, str::FromStr};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::{
  Error,
  geo::Coordinates,
  status::{FixtureStatus, classify_live},
  sync::SyncPartitionKey,
};

// ─── Identifiers ─────────────────────────────────────────────────────────────

/// Opaque upstream fixture identifier. Never changes once assigned.
#[derive(
  Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct FixtureId(pub String);

impl FixtureId {
  pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for FixtureId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

impl From<&str> for FixtureId {
  fn from(s: &str) -> Self { Self(s.to_owned()) }
}

/// Upstream competition (league) identifier.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  PartialOrd,
  Ord,
  Hash,
  Serialize,
  Deserialize,
)]
#[serde(transparent)]
pub struct CompetitionId(pub u32);

impl fmt::Display for CompetitionId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.0)
  }
}

// ─── Competition type ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompetitionType {
  League,
  Cup,
  International,
}

impl CompetitionType {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::League => "league",
      Self::Cup => "cup",
      Self::International => "international",
    }
  }
}

impl fmt::Display for CompetitionType {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for CompetitionType {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "league" => Ok(Self::League),
      "cup" => Ok(Self::Cup),
      "international" => Ok(Self::International),
      other => Err(Error::InvalidQuery(format!(
        "unknown competition type {other:?}"
      ))),
    }
  }
}

/// The competition-type filter of a query. `All` is the identity filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CompetitionFilter {
  #[default]
  All,
  Only(CompetitionType),
}

impl CompetitionFilter {
  pub fn matches(self, fixture: &Fixture) -> bool {
    match self {
      Self::All => true,
      Self::Only(kind) => fixture.competition_type == kind,
    }
  }
}

impl FromStr for CompetitionFilter {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "all" => Ok(Self::All),
      other => other.parse().map(Self::Only).map_err(|_| {
        Error::InvalidQuery(format!(
          "invalid filter {other:?}; expected one of all, league, cup, \
           international"
        ))
      }),
    }
  }
}

/// Keep only the fixtures matching `filter`, preserving order.
pub fn filter_by_competition_type(
  fixtures: Vec<Fixture>,
  filter: CompetitionFilter,
) -> Vec<Fixture> {
  match filter {
    CompetitionFilter::All => fixtures,
    filter => fixtures.into_iter().filter(|f| filter.matches(f)).collect(),
  }
}

// ─── NewFixture ──────────────────────────────────────────────────────────────

/// A fixture as delivered by an upstream source, before it is merged.
/// `last_synced_at` is stamped by the coordinator; it is not accepted from
/// sources.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewFixture {
  pub id:               FixtureId,
  pub home_team:        String,
  pub away_team:        String,
  pub home_team_badge:  Option<String>,
  pub away_team_badge:  Option<String>,
  pub competition_id:   CompetitionId,
  pub competition_name: String,
  pub competition_type: CompetitionType,
  pub round:            Option<String>,
  pub kickoff:          DateTime<Utc>,
  pub venue_name:       Option<String>,
  pub venue_city:       Option<String>,
  pub status_code:      String,
}

impl NewFixture {
  pub fn into_fixture(self, synced_at: DateTime<Utc>) -> Fixture {
    Fixture {
      id:                self.id,
      home_team:         self.home_team,
      away_team:         self.away_team,
      home_team_badge:   self.home_team_badge,
      away_team_badge:   self.away_team_badge,
      competition_id:    self.competition_id,
      competition_name:  self.competition_name,
      competition_type:  self.competition_type,
      round:             self.round,
      kickoff:           self.kickoff,
      venue_name:        self.venue_name,
      venue_city:        self.venue_city,
      venue_coordinates: None,
      status_code:       self.status_code,
      last_synced_at:    synced_at,
    }
  }

  /// The UTC calendar date this fixture is played on.
  pub fn match_date(&self) -> NaiveDate { self.kickoff.date_naive() }
}

// ─── Fixture ─────────────────────────────────────────────────────────────────

/// A cached fixture snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Fixture {
  pub id:                FixtureId,
  pub home_team:         String,
  pub away_team:         String,
  pub home_team_badge:   Option<String>,
  pub away_team_badge:   Option<String>,
  pub competition_id:    CompetitionId,
  pub competition_name:  String,
  pub competition_type:  CompetitionType,
  pub round:             Option<String>,
  /// Always UTC; upstream may move it between syncs.
  pub kickoff:           DateTime<Utc>,
  pub venue_name:        Option<String>,
  pub venue_city:        Option<String>,
  /// Attached at query time from the geocache; never stored with the row.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub venue_coordinates: Option<Coordinates>,
  pub status_code:       String,
  pub last_synced_at:    DateTime<Utc>,
}

impl Fixture {
  pub fn status(&self) -> FixtureStatus {
    FixtureStatus::from_code(&self.status_code)
  }

  pub fn is_live(&self) -> bool { classify_live(&self.status_code) }

  /// The UTC calendar date this fixture is played on.
  pub fn match_date(&self) -> NaiveDate { self.kickoff.date_naive() }

  pub fn partition_key(&self) -> SyncPartitionKey {
    SyncPartitionKey::new(self.competition_id, self.match_date())
  }
}

#[cfg(test)]
mod tests {
  use chrono::TimeZone;

  use super::*;

  fn fixture(id: &str, kind: CompetitionType) -> Fixture {
    NewFixture {
      id:               id.into(),
      home_team:        "Arsenal".into(),
      away_team:        "Liverpool".into(),
      home_team_badge:  None,
      away_team_badge:  None,
      competition_id:   CompetitionId(39),
      competition_name: "Premier League".into(),
      competition_type: kind,
      round:            Some("Regular Season - 28".into()),
      kickoff:          Utc.with_ymd_and_hms(2026, 3, 15, 23, 30, 0).unwrap(),
      venue_name:       Some("Emirates Stadium".into()),
      venue_city:       Some("London".into()),
      status_code:      "NS".into(),
    }
    .into_fixture(Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap())
  }

  #[test]
  fn filter_all_is_identity() {
    let fixtures = vec![
      fixture("1", CompetitionType::Cup),
      fixture("2", CompetitionType::League),
    ];
    let kept = filter_by_competition_type(fixtures.clone(), CompetitionFilter::All);
    assert_eq!(kept, fixtures);
  }

  #[test]
  fn filter_matches_competition_type_exactly() {
    let fixtures = vec![
      fixture("1", CompetitionType::Cup),
      fixture("2", CompetitionType::League),
      fixture("3", CompetitionType::International),
      fixture("4", CompetitionType::Cup),
    ];
    let cups = filter_by_competition_type(fixtures, "cup".parse().unwrap());
    let ids: Vec<_> = cups.iter().map(|f| f.id.as_str()).collect();
    assert_eq!(ids, ["1", "4"]);
  }

  #[test]
  fn unknown_filter_is_an_invalid_query() {
    let err = "friendly".parse::<CompetitionFilter>().unwrap_err();
    assert!(matches!(err, Error::InvalidQuery(_)));
    assert!(err.is_fatal());
    assert!("League".parse::<CompetitionFilter>().is_err());
  }

  #[test]
  fn liveness_is_derived_from_the_status_token() {
    let mut f = fixture("1", CompetitionType::League);
    assert!(!f.is_live());
    f.status_code = "HT".into();
    assert!(f.is_live());
    assert_eq!(f.status(), FixtureStatus::HalfTime);
  }

  #[test]
  fn partition_uses_the_utc_date_of_kickoff() {
    let f = fixture("1", CompetitionType::League);
    let key = f.partition_key();
    assert_eq!(key.competition_id, CompetitionId(39));
    assert_eq!(key.date, NaiveDate::from_ymd_opt(2026, 3, 15).unwrap());
  }

  #[test]
  fn serialises_with_camel_case_fields() {
    let f = fixture("1", CompetitionType::International);
    let json = serde_json::to_value(&f).unwrap();
    assert_eq!(json["homeTeam"], "Arsenal");
    assert_eq!(json["competitionType"], "international");
    assert_eq!(json["competitionId"], 39);
    assert!(json.get("venueCoordinates").is_none());
  }
}
