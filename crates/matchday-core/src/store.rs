//! The storage traits and the merge outcome types.
//!
//! The traits are implemented by storage backends (e.g.
//! `matchday-store-sqlite`). The coordinator depends on these abstractions,
//! not on any concrete backend. Each trait owns one keyed collection:
//! fixtures by id, sync records by partition, geocache entries by place key.

use std::future::Future;

use chrono::{DateTime, NaiveDate, TimeDelta, Utc};

use crate::{
  fixture::{Fixture, FixtureId},
  geo::{GeoCacheEntry, PlaceKey},
  status::StatusTransition,
  sync::{SyncPartitionKey, SyncRecord},
};

// ─── Merge outcomes ──────────────────────────────────────────────────────────

/// What changed when a snapshot replaced an existing row.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FixtureChanges {
  /// `(previous, current)` kickoff when upstream rescheduled.
  pub kickoff: Option<(DateTime<Utc>, DateTime<Utc>)>,
  pub status:  Option<StatusTransition>,
}

impl FixtureChanges {
  pub fn is_empty(&self) -> bool {
    self.kickoff.is_none() && self.status.is_none()
  }
}

/// Result of [`FixtureStore::upsert`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpsertOutcome {
  /// No row with this id existed.
  Inserted,
  /// The stored row was replaced by the incoming snapshot.
  Updated(FixtureChanges),
  /// The incoming snapshot is older than the stored one and was discarded.
  Stale { stored_synced_at: DateTime<Utc> },
}

// ─── Fixtures ────────────────────────────────────────────────────────────────

/// The authoritative cached fixture set.
///
/// All methods return `Send` futures so the trait can be used from tasks
/// spawned on a multi-threaded runtime.
pub trait FixtureStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Insert or replace a fixture snapshot, last-write-wins on
  /// `last_synced_at`.
  ///
  /// Every field of the incoming snapshot overwrites the stored row. A
  /// snapshot with an older `last_synced_at` than the stored row is ignored.
  /// Atomic per fixture id.
  fn upsert(
    &self,
    fixture: Fixture,
  ) -> impl Future<Output = Result<UpsertOutcome, Self::Error>> + Send + '_;

  fn get<'a>(
    &'a self,
    id: &'a FixtureId,
  ) -> impl Future<Output = Result<Option<Fixture>, Self::Error>> + Send + 'a;

  /// All fixtures whose kickoff falls on `date` in UTC, in kickoff order.
  fn query_by_date(
    &self,
    date: NaiveDate,
  ) -> impl Future<Output = Result<Vec<Fixture>, Self::Error>> + Send + '_;

  /// Up to `limit` fixtures kicking off at or after `from`, soonest first.
  fn query_upcoming_from(
    &self,
    from: DateTime<Utc>,
    limit: usize,
  ) -> impl Future<Output = Result<Vec<Fixture>, Self::Error>> + Send + '_;

  /// [`query_upcoming_from`](Self::query_upcoming_from) starting now.
  fn query_upcoming(
    &self,
    limit: usize,
  ) -> impl Future<Output = Result<Vec<Fixture>, Self::Error>> + Send + '_ {
    self.query_upcoming_from(Utc::now(), limit)
  }
}

// ─── Sync ledger ─────────────────────────────────────────────────────────────

/// Per-partition record of when upstream last answered.
///
/// The ledger is TTL-agnostic: callers pass the TTL they want applied.
pub trait SyncLedger: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// `None` means the partition was never checked.
  fn sync_record(
    &self,
    key: SyncPartitionKey,
  ) -> impl Future<Output = Result<Option<SyncRecord>, Self::Error>> + Send + '_;

  /// Record that upstream answered for `key` at `at`. Never moves
  /// `last_confirmed_at` backwards; returns the record as stored.
  fn mark_synced(
    &self,
    key: SyncPartitionKey,
    at: DateTime<Utc>,
  ) -> impl Future<Output = Result<SyncRecord, Self::Error>> + Send + '_;

  /// True iff a record exists and `now - last_confirmed_at < ttl`.
  fn is_fresh_at(
    &self,
    key: SyncPartitionKey,
    ttl: TimeDelta,
    now: DateTime<Utc>,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_ {
    async move {
      Ok(
        self
          .sync_record(key)
          .await?
          .is_some_and(|record| record.is_fresh_at(ttl, now)),
      )
    }
  }

  fn is_fresh(
    &self,
    key: SyncPartitionKey,
    ttl: TimeDelta,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_ {
    self.is_fresh_at(key, ttl, Utc::now())
  }
}

// ─── Geocache persistence ────────────────────────────────────────────────────

/// Durable storage for successful geocodes. Failed lookups are never written.
pub trait GeoStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  fn get_place<'a>(
    &'a self,
    key: &'a PlaceKey,
  ) -> impl Future<Output = Result<Option<GeoCacheEntry>, Self::Error>> + Send + 'a;

  /// Insert or replace the entry for `entry.key`.
  fn put_place(
    &self,
    entry: GeoCacheEntry,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;
}
