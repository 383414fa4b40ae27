//! Freshness decisions and orchestration for the Matchday fixture cache.
//!
//! [`SyncCoordinator`] answers fixture queries from a store, refreshing the
//! stale (competition, date) partitions from an upstream [`FixtureSource`]
//! first. [`GeoCache`] turns place names into coordinates for proximity
//! ranking. Both collapse concurrent identical work through
//! [`SingleFlight`].
//!
//! [`FixtureSource`]: matchday_core::source::FixtureSource

pub mod config;
pub mod coordinator;
pub mod geocache;
pub mod single_flight;

pub use config::{FreshnessPolicy, GeoCacheConfig, LedgerFailurePolicy, SyncConfig};
pub use coordinator::{
  MatchQuery, PartitionReport, PartitionState, QueryResult, QueryWindow,
  RefreshScope, SyncCoordinator, Warning,
};
pub use geocache::GeoCache;
pub use single_flight::{Aborted, SingleFlight};
