//! Coordinator configuration.
//!
//! Every field has a default so a partial (or empty) config section
//! deserialises. Durations are plain integers in the config file and exposed
//! as [`TimeDelta`] / [`Duration`] through accessors.

use std::time::Duration;

use chrono::{DateTime, NaiveDate, TimeDelta, Utc};
use matchday_core::fixture::CompetitionId;
use serde::Deserialize;

// ─── SyncConfig ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
  /// Competitions whose partitions every query covers.
  pub competitions:             Vec<CompetitionId>,
  pub freshness:                FreshnessPolicy,
  /// Bound on a single upstream fixture call.
  pub upstream_timeout_ms:      u64,
  /// Page size of an upcoming-mode refresh.
  pub upcoming_per_competition: u32,
  pub ledger_failure:           LedgerFailurePolicy,
  pub geocode:                  GeoCacheConfig,
}

impl Default for SyncConfig {
  fn default() -> Self {
    Self {
      competitions:             [39, 140, 78, 135, 61, 2, 3]
        .into_iter()
        .map(CompetitionId)
        .collect(),
      freshness:                FreshnessPolicy::default(),
      upstream_timeout_ms:      10_000,
      upcoming_per_competition: 50,
      ledger_failure:           LedgerFailurePolicy::default(),
      geocode:                  GeoCacheConfig::default(),
    }
  }
}

impl SyncConfig {
  pub fn upstream_timeout(&self) -> Duration {
    Duration::from_millis(self.upstream_timeout_ms)
  }
}

// ─── Freshness ───────────────────────────────────────────────────────────────

/// How long a ledger confirmation stays fresh, by how far the partition's
/// date is from now.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct FreshnessPolicy {
  /// Dates whose whole UTC day lies in the past.
  pub past_ttl_secs:     u64,
  /// Dates overlapping `[now, now + near_window_hours]`.
  pub near_ttl_secs:     u64,
  pub far_ttl_secs:      u64,
  pub near_window_hours: u64,
}

impl Default for FreshnessPolicy {
  fn default() -> Self {
    Self {
      past_ttl_secs:     24 * 60 * 60,
      near_ttl_secs:     10 * 60,
      far_ttl_secs:      6 * 60 * 60,
      near_window_hours: 24,
    }
  }
}

fn secs(value: u64) -> TimeDelta {
  TimeDelta::try_seconds(i64::try_from(value).unwrap_or(i64::MAX))
    .unwrap_or(TimeDelta::MAX)
}

impl FreshnessPolicy {
  /// The TTL that applies to partitions dated `date` at instant `now`.
  pub fn ttl_for(&self, date: NaiveDate, now: DateTime<Utc>) -> TimeDelta {
    let today = now.date_naive();
    if date < today {
      return secs(self.past_ttl_secs);
    }
    let near = now
      .checked_add_signed(secs(self.near_window_hours.saturating_mul(3600)))
      .is_none_or(|horizon| date <= horizon.date_naive());
    if near {
      secs(self.near_ttl_secs)
    } else {
      secs(self.far_ttl_secs)
    }
  }
}

// ─── Ledger failure ──────────────────────────────────────────────────────────

/// What the coordinator does when the ledger cannot be read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LedgerFailurePolicy {
  /// Treat the partition as stale and ask upstream.
  #[default]
  AssumeStale,
  /// Fail the whole query with `StorageUnavailable`.
  FailQuery,
}

// ─── Geocache ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct GeoCacheConfig {
  /// Positive entry lifetime. Absent means entries never expire.
  pub ttl_secs:          Option<u64>,
  /// Lifetime of a remembered "no such place". Zero disables.
  pub negative_ttl_secs: u64,
  pub timeout_ms:        u64,
}

impl Default for GeoCacheConfig {
  fn default() -> Self {
    Self {
      ttl_secs:          None,
      negative_ttl_secs: 60 * 60,
      timeout_ms:        5_000,
    }
  }
}

impl GeoCacheConfig {
  pub fn ttl(&self) -> Option<TimeDelta> { self.ttl_secs.map(secs) }

  pub fn negative_ttl(&self) -> Option<TimeDelta> {
    (self.negative_ttl_secs > 0).then(|| secs(self.negative_ttl_secs))
  }

  pub fn timeout(&self) -> Duration { Duration::from_millis(self.timeout_ms) }
}

#[cfg(test)]
mod tests {
  use chrono::TimeZone;

  use super::*;

  fn noon() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 15, 12, 0, 0).unwrap()
  }

  fn day(d: u32) -> NaiveDate { NaiveDate::from_ymd_opt(2026, 3, d).unwrap() }

  #[test]
  fn ttl_depends_on_distance_from_now() {
    let policy = FreshnessPolicy::default();
    assert_eq!(policy.ttl_for(day(14), noon()), TimeDelta::hours(24));
    assert_eq!(policy.ttl_for(day(15), noon()), TimeDelta::minutes(10));
    assert_eq!(policy.ttl_for(day(16), noon()), TimeDelta::minutes(10));
    assert_eq!(policy.ttl_for(day(17), noon()), TimeDelta::hours(6));
  }

  #[test]
  fn empty_section_deserialises_to_defaults() {
    let config: SyncConfig = serde_json::from_str("{}").unwrap();
    assert_eq!(config.competitions.len(), 7);
    assert_eq!(config.competitions[0], CompetitionId(39));
    assert_eq!(config.upstream_timeout(), Duration::from_secs(10));
    assert_eq!(config.upcoming_per_competition, 50);
    assert_eq!(config.ledger_failure, LedgerFailurePolicy::AssumeStale);
    assert_eq!(config.geocode.ttl(), None);
    assert_eq!(config.geocode.negative_ttl(), Some(TimeDelta::hours(1)));
  }

  #[test]
  fn partial_sections_keep_the_remaining_defaults() {
    let config: SyncConfig = serde_json::from_value(serde_json::json!({
      "competitions": [39],
      "ledger_failure": "fail_query",
      "freshness": { "near_ttl_secs": 60 },
      "geocode": { "negative_ttl_secs": 0, "ttl_secs": 86400 },
    }))
    .unwrap();

    assert_eq!(config.competitions, [CompetitionId(39)]);
    assert_eq!(config.ledger_failure, LedgerFailurePolicy::FailQuery);
    assert_eq!(config.freshness.near_ttl_secs, 60);
    assert_eq!(config.freshness.far_ttl_secs, 6 * 60 * 60);
    assert_eq!(config.geocode.negative_ttl(), None);
    assert_eq!(config.geocode.ttl(), Some(TimeDelta::days(1)));
  }
}
