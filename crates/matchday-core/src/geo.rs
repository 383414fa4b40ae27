//! Coordinates, geocache entries and proximity ranking.
//!
//! Everything here is pure: distances are computed with the Haversine
//! formula on a spherical Earth and ranking never touches I/O. Resolving
//! place names to coordinates is the geocache's job.

use std::{cmp::Ordering, fmt};

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use crate::fixture::Fixture;

/// Mean Earth radius in kilometres.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

// ─── Coordinates ─────────────────────────────────────────────────────────────

/// A WGS84 latitude/longitude pair in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
  pub lat: f64,
  pub lng: f64,
}

impl Coordinates {
  /// `None` unless `lat` is within ±90 and `lng` within ±180.
  pub fn new(lat: f64, lng: f64) -> Option<Self> {
    ((-90.0..=90.0).contains(&lat) && (-180.0..=180.0).contains(&lng))
      .then_some(Self { lat, lng })
  }
}

impl fmt::Display for Coordinates {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "({:.4}, {:.4})", self.lat, self.lng)
  }
}

/// Great-circle distance between `a` and `b` in kilometres.
pub fn distance_km(a: Coordinates, b: Coordinates) -> f64 {
  let phi1 = a.lat.to_radians();
  let phi2 = b.lat.to_radians();
  let d_phi = (b.lat - a.lat).to_radians();
  let d_lambda = (b.lng - a.lng).to_radians();

  let h = (d_phi / 2.0).sin().powi(2)
    + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);
  2.0 * EARTH_RADIUS_KM * h.sqrt().atan2((1.0 - h).sqrt())
}

// ─── Place keys ──────────────────────────────────────────────────────────────

/// A normalised place name: trimmed, inner whitespace collapsed to single
/// spaces, lowercased. `"  New   York "` and `"new york"` share a key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlaceKey(String);

impl PlaceKey {
  /// `None` for names that are empty after trimming.
  pub fn new(name: &str) -> Option<Self> {
    let normalised = name
      .split_whitespace()
      .collect::<Vec<_>>()
      .join(" ")
      .to_lowercase();
    (!normalised.is_empty()).then_some(Self(normalised))
  }

  pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for PlaceKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

/// A successful geocode, as persisted by a [`GeoStore`](crate::store::GeoStore).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoCacheEntry {
  pub key:         PlaceKey,
  pub coordinates: Coordinates,
  pub acquired_at: DateTime<Utc>,
}

impl GeoCacheEntry {
  /// `ttl = None` means the entry never expires.
  pub fn is_fresh_at(&self, ttl: Option<TimeDelta>, now: DateTime<Utc>) -> bool {
    ttl.is_none_or(|ttl| now - self.acquired_at < ttl)
  }
}

// ─── Ranking ─────────────────────────────────────────────────────────────────

/// A fixture in a query result, with its distance from the query origin
/// when one could be computed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RankedFixture {
  #[serde(flatten)]
  pub fixture:     Fixture,
  pub is_live:     bool,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub distance_km: Option<f64>,
}

impl RankedFixture {
  fn new(fixture: Fixture, distance_km: Option<f64>) -> Self {
    let is_live = fixture.is_live();
    Self { fixture, is_live, distance_km }
  }
}

fn by_kickoff(a: &Fixture, b: &Fixture) -> Ordering {
  a.kickoff.cmp(&b.kickoff).then_with(|| a.id.cmp(&b.id))
}

/// Date order: kickoff ascending, ties broken by id. No distances attached.
pub fn sort_by_kickoff(mut fixtures: Vec<Fixture>) -> Vec<RankedFixture> {
  fixtures.sort_by(by_kickoff);
  fixtures
    .into_iter()
    .map(|f| RankedFixture::new(f, None))
    .collect()
}

/// Order fixtures by distance of their venue from `origin`.
///
/// Fixtures with venue coordinates come first, nearest first, ties broken by
/// kickoff. Fixtures without coordinates follow in kickoff order; none are
/// dropped.
pub fn rank_by_distance(
  origin: Coordinates,
  fixtures: Vec<Fixture>,
) -> Vec<RankedFixture> {
  let mut ranked: Vec<RankedFixture> = fixtures
    .into_iter()
    .map(|f| {
      let distance = f.venue_coordinates.map(|c| distance_km(origin, c));
      RankedFixture::new(f, distance)
    })
    .collect();

  ranked.sort_by(|a, b| match (a.distance_km, b.distance_km) {
    (Some(da), Some(db)) => {
      da.total_cmp(&db).then_with(|| by_kickoff(&a.fixture, &b.fixture))
    }
    (Some(_), None) => Ordering::Less,
    (None, Some(_)) => Ordering::Greater,
    (None, None) => by_kickoff(&a.fixture, &b.fixture),
  });
  ranked
}

#[cfg(test)]
mod tests {
  use chrono::{Duration, TimeZone};

  use super::*;
  use crate::fixture::{CompetitionId, CompetitionType, NewFixture};

  const LONDON: Coordinates = Coordinates { lat: 51.5074, lng: -0.1278 };
  const PARIS: Coordinates = Coordinates { lat: 48.8566, lng: 2.3522 };
  const MUNICH: Coordinates = Coordinates { lat: 48.1351, lng: 11.5820 };
  const MADRID: Coordinates = Coordinates { lat: 40.4168, lng: -3.7038 };

  fn fixture(id: &str, hour: u32, venue: Option<Coordinates>) -> Fixture {
    let mut f = NewFixture {
      id:               id.into(),
      home_team:        format!("Home {id}"),
      away_team:        format!("Away {id}"),
      home_team_badge:  None,
      away_team_badge:  None,
      competition_id:   CompetitionId(2),
      competition_name: "UEFA Champions League".into(),
      competition_type: CompetitionType::Cup,
      round:            None,
      kickoff:          Utc.with_ymd_and_hms(2026, 3, 15, hour, 0, 0).unwrap(),
      venue_name:       None,
      venue_city:       None,
      status_code:      "NS".into(),
    }
    .into_fixture(Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap());
    f.venue_coordinates = venue;
    f
  }

  #[test]
  fn london_to_paris_is_about_344_km() {
    let d = distance_km(LONDON, PARIS);
    assert!((d - 344.0).abs() < 5.0, "got {d}");
  }

  #[test]
  fn distance_is_symmetric() {
    for (a, b) in [(LONDON, PARIS), (MUNICH, MADRID), (PARIS, MADRID)] {
      assert_eq!(distance_km(a, b), distance_km(b, a));
    }
  }

  #[test]
  fn distance_is_zero_only_for_identical_points() {
    assert_eq!(distance_km(MUNICH, MUNICH), 0.0);
    let nearby = Coordinates { lat: MUNICH.lat + 0.0001, lng: MUNICH.lng };
    assert!(distance_km(MUNICH, nearby) > 0.0);
  }

  #[test]
  fn coordinates_are_range_checked() {
    assert!(Coordinates::new(90.0, 180.0).is_some());
    assert!(Coordinates::new(-90.1, 0.0).is_none());
    assert!(Coordinates::new(0.0, 180.5).is_none());
    assert!(Coordinates::new(f64::NAN, 0.0).is_none());
  }

  #[test]
  fn place_keys_normalise_case_and_whitespace() {
    assert_eq!(PlaceKey::new("  New   York "), PlaceKey::new("new york"));
    assert_eq!(PlaceKey::new("MÜNCHEN").unwrap().as_str(), "münchen");
    assert!(PlaceKey::new("   ").is_none());
    assert!(PlaceKey::new("").is_none());
  }

  #[test]
  fn geocache_entries_without_ttl_never_expire() {
    let acquired = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap();
    let entry = GeoCacheEntry {
      key:         PlaceKey::new("London").unwrap(),
      coordinates: LONDON,
      acquired_at: acquired,
    };
    let now = acquired + Duration::days(3650);
    assert!(entry.is_fresh_at(None, now));
    assert!(!entry.is_fresh_at(Some(Duration::days(30)), now));
    assert!(entry.is_fresh_at(Some(Duration::days(30)), acquired + Duration::days(29)));
  }

  #[test]
  fn ranking_puts_coordinate_less_fixtures_last() {
    let ranked = rank_by_distance(
      LONDON,
      vec![
        fixture("no-coords-early", 12, None),
        fixture("madrid", 15, Some(MADRID)),
        fixture("paris", 20, Some(PARIS)),
        fixture("no-coords-late", 21, None),
        fixture("munich", 13, Some(MUNICH)),
      ],
    );

    let ids: Vec<_> = ranked.iter().map(|r| r.fixture.id.as_str()).collect();
    assert_eq!(
      ids,
      ["paris", "munich", "madrid", "no-coords-early", "no-coords-late"]
    );

    let distances: Vec<f64> =
      ranked.iter().filter_map(|r| r.distance_km).collect();
    assert_eq!(distances.len(), 3);
    assert!(distances.windows(2).all(|w| w[0] <= w[1]));
    assert!(ranked[3..].iter().all(|r| r.distance_km.is_none()));
  }

  #[test]
  fn equal_distances_are_ordered_by_kickoff() {
    let ranked = rank_by_distance(
      LONDON,
      vec![
        fixture("late", 20, Some(PARIS)),
        fixture("early", 12, Some(PARIS)),
      ],
    );
    assert_eq!(ranked[0].fixture.id.as_str(), "early");
    assert_eq!(ranked[1].fixture.id.as_str(), "late");
  }

  #[test]
  fn kickoff_order_breaks_ties_by_id() {
    let sorted = sort_by_kickoff(vec![
      fixture("b", 15, None),
      fixture("c", 12, None),
      fixture("a", 15, None),
    ]);
    let ids: Vec<_> = sorted.iter().map(|r| r.fixture.id.as_str()).collect();
    assert_eq!(ids, ["c", "a", "b"]);
    assert!(sorted.iter().all(|r| r.distance_km.is_none()));
  }

  #[test]
  fn ranked_fixtures_carry_the_derived_live_flag() {
    let mut live = fixture("live", 12, Some(PARIS));
    live.status_code = "2H".into();
    let ranked = rank_by_distance(LONDON, vec![live]);
    assert!(ranked[0].is_live);

    let json = serde_json::to_value(&ranked[0]).unwrap();
    assert_eq!(json["isLive"], true);
    assert_eq!(json["id"], "live");
    assert!(json["distanceKm"].as_f64().is_some());
  }
}
