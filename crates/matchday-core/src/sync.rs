//! Sync partitions and ledger records.
//!
//! Freshness is tracked per (competition, calendar date). A missing
//! [`SyncRecord`] means the slice was never checked; a present one means
//! upstream answered for it, even if the answer was empty.

use std::fmt;

use chrono::{DateTime, NaiveDate, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use crate::fixture::CompetitionId;

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "camelCase")]
pub struct SyncPartitionKey {
  pub competition_id: CompetitionId,
  /// UTC calendar date.
  pub date:           NaiveDate,
}

impl SyncPartitionKey {
  pub fn new(competition_id: CompetitionId, date: NaiveDate) -> Self {
    Self { competition_id, date }
  }
}

impl fmt::Display for SyncPartitionKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}@{}", self.competition_id, self.date)
  }
}

/// "Upstream answered for this partition at `last_confirmed_at`."
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncRecord {
  pub key:               SyncPartitionKey,
  pub last_confirmed_at: DateTime<Utc>,
}

impl SyncRecord {
  pub fn is_fresh_at(&self, ttl: TimeDelta, now: DateTime<Utc>) -> bool {
    now - self.last_confirmed_at < ttl
  }
}
