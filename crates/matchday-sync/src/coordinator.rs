//! [`SyncCoordinator`]: one query from freshness check to ranked result.
//!
//! Per partition the coordinator moves through
//! `CacheHit` | `RefreshNeeded -> Refreshing -> Refreshed | RefreshFailed`.
//! Only the terminal state is reported back; the rest is logged.
//!
//! Availability wins over freshness: an upstream failure leaves the partition
//! stale and the query is answered from whatever the store already holds,
//! flagged as degraded. Only a store that cannot be read fails a query.

use std::{
  collections::{BTreeSet, HashMap},
  fmt,
  sync::Arc,
};

use chrono::{DateTime, NaiveDate, Utc};
use matchday_core::{
  Error, Result,
  fixture::{CompetitionFilter, Fixture, NewFixture, filter_by_competition_type},
  geo::{Coordinates, RankedFixture, rank_by_distance, sort_by_kickoff},
  source::{FixtureSource, Geocoder},
  store::{FixtureStore, GeoStore, SyncLedger, UpsertOutcome},
  sync::SyncPartitionKey,
};
use serde::{Serialize, Serializer};
use tokio::task::JoinSet;

use crate::{
  config::{LedgerFailurePolicy, SyncConfig},
  geocache::GeoCache,
  single_flight::SingleFlight,
};

// ─── Queries ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryWindow {
  /// Every fixture kicking off on this UTC date.
  Date(NaiveDate),
  /// The next `limit` fixtures from now.
  Upcoming { limit: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchQuery {
  pub window:           QueryWindow,
  pub competition_type: CompetitionFilter,
  /// Rank by distance from this place when set.
  pub city:             Option<String>,
}

impl MatchQuery {
  pub fn on(date: NaiveDate) -> Self {
    Self {
      window:           QueryWindow::Date(date),
      competition_type: CompetitionFilter::All,
      city:             None,
    }
  }

  pub fn upcoming(limit: usize) -> Self {
    Self {
      window:           QueryWindow::Upcoming { limit },
      competition_type: CompetitionFilter::All,
      city:             None,
    }
  }

  pub fn with_competition_type(mut self, filter: CompetitionFilter) -> Self {
    self.competition_type = filter;
    self
  }

  pub fn near(mut self, city: impl Into<String>) -> Self {
    self.city = Some(city.into());
    self
  }

  fn validate(&self) -> Result<()> {
    if self.window == (QueryWindow::Upcoming { limit: 0 }) {
      return Err(Error::InvalidQuery("limit must be at least 1".into()));
    }
    Ok(())
  }

  /// The city to rank by, if any. Blank counts as none.
  fn origin_city(&self) -> Option<&str> {
    self.city.as_deref().map(str::trim).filter(|c| !c.is_empty())
  }
}

/// What a refresh asks upstream for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RefreshScope {
  /// Everything on the partition's date.
  Date,
  /// The next `n` fixtures of the partition's competition.
  Next(u32),
}

// ─── Results ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum PartitionState {
  /// The ledger vouched for the partition; upstream was not called.
  CacheHit,
  /// Stale or never checked. Transient, only logged.
  RefreshNeeded,
  /// Upstream call in flight. Transient, only logged.
  Refreshing,
  Refreshed { fetched: usize },
  /// The partition stays stale until the next query.
  RefreshFailed {
    #[serde(serialize_with = "display")]
    error: Error,
  },
}

impl fmt::Display for PartitionState {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::CacheHit => f.write_str("cache hit"),
      Self::RefreshNeeded => f.write_str("refresh needed"),
      Self::Refreshing => f.write_str("refreshing"),
      Self::Refreshed { fetched } => write!(f, "refreshed ({fetched} fetched)"),
      Self::RefreshFailed { error } => write!(f, "refresh failed: {error}"),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PartitionReport {
  pub key:   SyncPartitionKey,
  #[serde(flatten)]
  pub state: PartitionState,
}

/// A problem that degraded part of a query without failing it.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Warning {
  /// The query city has no coordinates; results are in date order.
  CityUnresolved {
    city:   String,
    #[serde(serialize_with = "display")]
    reason: Error,
  },
  /// This many fixtures could not be placed and were ranked last.
  VenueCoordinatesMissing { count: usize },
  /// The ledger could not be read; the partition was treated as stale.
  LedgerUnavailable {
    partition: SyncPartitionKey,
    #[serde(serialize_with = "display")]
    reason:    Error,
  },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryResult {
  pub fixtures:   Vec<RankedFixture>,
  pub partitions: Vec<PartitionReport>,
  /// At least one partition could not be refreshed.
  pub degraded:   bool,
  pub warnings:   Vec<Warning>,
}

fn display<S: Serializer>(error: &Error, s: S) -> Result<S::Ok, S::Error> {
  s.collect_str(error)
}

fn storage(e: impl std::error::Error) -> Error {
  Error::StorageUnavailable(e.to_string())
}

// ─── Coordinator ─────────────────────────────────────────────────────────────

/// Serves fixture queries from the store, refreshing stale partitions from
/// upstream first.
///
/// Cloning is cheap; clones share the store, the collaborators and the
/// in-flight refresh map.
pub struct SyncCoordinator<S, F, G> {
  store:     Arc<S>,
  source:    Arc<F>,
  geo:       GeoCache<S, G>,
  config:    Arc<SyncConfig>,
  refreshes: SingleFlight<(SyncPartitionKey, RefreshScope), Result<usize>>,
}

impl<S, F, G> Clone for SyncCoordinator<S, F, G> {
  fn clone(&self) -> Self {
    Self {
      store:     Arc::clone(&self.store),
      source:    Arc::clone(&self.source),
      geo:       self.geo.clone(),
      config:    Arc::clone(&self.config),
      refreshes: self.refreshes.clone(),
    }
  }
}

impl<S, F, G> SyncCoordinator<S, F, G>
where
  S: FixtureStore + SyncLedger + GeoStore + 'static,
  F: FixtureSource + 'static,
  G: Geocoder + 'static,
{
  pub fn new(
    store: Arc<S>,
    source: Arc<F>,
    geocoder: Arc<G>,
    config: SyncConfig,
  ) -> Self {
    let geo = GeoCache::new(Arc::clone(&store), geocoder, config.geocode);
    Self {
      store,
      source,
      geo,
      config: Arc::new(config),
      refreshes: SingleFlight::new(),
    }
  }

  pub fn geocache(&self) -> &GeoCache<S, G> { &self.geo }

  /// Answer `query`, refreshing whatever partitions it covers that are stale.
  ///
  /// Fails only with [`Error::InvalidQuery`] or
  /// [`Error::StorageUnavailable`]; every other failure is reported in the
  /// result.
  #[tracing::instrument(skip(self))]
  pub async fn query(&self, query: MatchQuery) -> Result<QueryResult> {
    self.query_at(query, Utc::now()).await
  }

  /// [`query`](Self::query) with an explicit clock for freshness decisions
  /// and the upcoming window.
  pub async fn query_at(
    &self,
    query: MatchQuery,
    now: DateTime<Utc>,
  ) -> Result<QueryResult> {
    query.validate()?;
    let mut warnings = Vec::new();

    let partitions = self.sync_window(query.window, now, &mut warnings).await?;
    let degraded = partitions
      .iter()
      .any(|p| matches!(p.state, PartitionState::RefreshFailed { .. }));

    let filter = query.competition_type;
    let fixtures = match query.window {
      QueryWindow::Date(date) => {
        let fixtures = self.store.query_by_date(date).await.map_err(storage)?;
        filter_by_competition_type(fixtures, filter)
      }
      QueryWindow::Upcoming { limit } => {
        // The filter runs after the store query, so only an unfiltered query
        // can push the limit down.
        let fetch = match filter {
          CompetitionFilter::All => limit,
          CompetitionFilter::Only(_) => usize::MAX,
        };
        let fixtures = self
          .store
          .query_upcoming_from(now, fetch)
          .await
          .map_err(storage)?;
        let mut fixtures = filter_by_competition_type(fixtures, filter);
        fixtures.truncate(limit);
        fixtures
      }
    };

    let fixtures = match query.origin_city() {
      None => sort_by_kickoff(fixtures),
      Some(city) => self.rank_near(city, fixtures, &mut warnings).await,
    };

    if degraded {
      tracing::warn!("serving stale fixtures for unrefreshed partitions");
    }
    Ok(QueryResult { fixtures, partitions, degraded, warnings })
  }

  // ─── Freshness ─────────────────────────────────────────────────────────────

  /// Check, and if needed refresh, every partition `window` covers. The
  /// partitions run concurrently; reports come back in competition order.
  async fn sync_window(
    &self,
    window: QueryWindow,
    now: DateTime<Utc>,
    warnings: &mut Vec<Warning>,
  ) -> Result<Vec<PartitionReport>> {
    let (date, scope) = match window {
      QueryWindow::Date(date) => (date, RefreshScope::Date),
      QueryWindow::Upcoming { .. } => (
        now.date_naive(),
        RefreshScope::Next(self.config.upcoming_per_competition),
      ),
    };

    let tasks: Vec<_> = self
      .config
      .competitions
      .iter()
      .map(|competition| {
        let key = SyncPartitionKey::new(*competition, date);
        let this = self.clone();
        let task =
          tokio::spawn(async move { this.sync_partition(key, scope, now).await });
        (key, task)
      })
      .collect();

    let mut reports = Vec::with_capacity(tasks.len());
    for (key, task) in tasks {
      let (state, warning) = task.await.unwrap_or_else(|e| {
        tracing::error!(partition = %key, error = %e, "partition task failed");
        let error =
          Error::UpstreamUnavailable(format!("refresh task failed: {e}"));
        Ok((PartitionState::RefreshFailed { error }, None))
      })?;
      warnings.extend(warning);
      reports.push(PartitionReport { key, state });
    }
    Ok(reports)
  }

  async fn sync_partition(
    &self,
    key: SyncPartitionKey,
    scope: RefreshScope,
    now: DateTime<Utc>,
  ) -> Result<(PartitionState, Option<Warning>)> {
    let ttl = self.config.freshness.ttl_for(key.date, now);
    let mut warning = None;

    match self.store.is_fresh_at(key, ttl, now).await {
      Ok(true) => {
        tracing::debug!(partition = %key, state = %PartitionState::CacheHit);
        return Ok((PartitionState::CacheHit, None));
      }
      Ok(false) => {}
      Err(e) => match self.config.ledger_failure {
        LedgerFailurePolicy::FailQuery => return Err(storage(e)),
        LedgerFailurePolicy::AssumeStale => {
          tracing::warn!(
            partition = %key,
            error = %e,
            "ledger unreadable, assuming stale"
          );
          warning = Some(Warning::LedgerUnavailable {
            partition: key,
            reason:    storage(e),
          });
        }
      },
    }

    tracing::debug!(partition = %key, state = %PartitionState::RefreshNeeded);
    let state = match self.refresh(key, scope).await {
      Ok(fetched) => PartitionState::Refreshed { fetched },
      Err(error) if error.is_fatal() => return Err(error),
      Err(error) => PartitionState::RefreshFailed { error },
    };
    match &state {
      PartitionState::RefreshFailed { .. } => {
        tracing::warn!(partition = %key, state = %state);
      }
      _ => tracing::debug!(partition = %key, state = %state),
    }
    Ok((state, warning))
  }

  /// Refresh `key` once, however many queries ask for it concurrently.
  async fn refresh(
    &self,
    key: SyncPartitionKey,
    scope: RefreshScope,
  ) -> Result<usize> {
    let this = self.clone();
    self
      .refreshes
      .run((key, scope), move || async move {
        this.fetch_and_merge(key, scope).await
      })
      .await
      .unwrap_or_else(|e| Err(Error::UpstreamUnavailable(e.to_string())))
  }

  async fn fetch_and_merge(
    &self,
    key: SyncPartitionKey,
    scope: RefreshScope,
  ) -> Result<usize> {
    tracing::debug!(partition = %key, state = %PartitionState::Refreshing);
    tracing::info!(
      competition = %key.competition_id,
      date = %key.date,
      ?scope,
      "fetching fixtures from upstream"
    );

    let timeout = self.config.upstream_timeout();
    let call = async {
      match scope {
        RefreshScope::Date => {
          self.source.fixtures_on(key.competition_id, key.date).await
        }
        RefreshScope::Next(count) => {
          self.source.fixtures_next(key.competition_id, count).await
        }
      }
    };
    let fetched = tokio::time::timeout(timeout, call)
      .await
      .unwrap_or(Err(Error::UpstreamTimeout(timeout)))?;
    let answered_at = Utc::now();

    let count = fetched.len();
    let mut covered: BTreeSet<NaiveDate> =
      fetched.iter().map(NewFixture::match_date).collect();
    for new in fetched {
      self.merge(new.into_fixture(answered_at)).await?;
    }

    let confirmed = match scope {
      RefreshScope::Date => BTreeSet::from([key.date]),
      RefreshScope::Next(requested) => {
        // A full page may stop partway through its last date, so that date
        // is never confirmed, even when it is the partition's own date.
        let truncated = if count >= requested as usize {
          covered.pop_last()
        } else {
          None
        };
        if truncated != Some(key.date) {
          covered.insert(key.date);
        }
        covered
      }
    };
    for date in confirmed {
      let partition = SyncPartitionKey::new(key.competition_id, date);
      if let Err(e) = self.store.mark_synced(partition, answered_at).await {
        match self.config.ledger_failure {
          LedgerFailurePolicy::FailQuery => return Err(storage(e)),
          LedgerFailurePolicy::AssumeStale => tracing::warn!(
            partition = %partition,
            error = %e,
            "could not record sync, partition stays stale"
          ),
        }
      }
    }

    tracing::info!(partition = %key, fetched = count, "partition synced");
    Ok(count)
  }

  async fn merge(&self, fixture: Fixture) -> Result<()> {
    let id = fixture.id.clone();
    match self.store.upsert(fixture).await.map_err(storage)? {
      UpsertOutcome::Inserted => tracing::debug!(fixture = %id, "new fixture"),
      UpsertOutcome::Updated(changes) => {
        if let Some((from, to)) = changes.kickoff {
          tracing::info!(fixture = %id, %from, %to, "kickoff rescheduled");
        }
        if let Some(transition) = changes.status {
          if transition.kicked_off() || transition.ended() {
            tracing::info!(fixture = %id, %transition, "status changed");
          } else {
            tracing::debug!(fixture = %id, %transition, "status changed");
          }
        }
      }
      UpsertOutcome::Stale { stored_synced_at } => {
        tracing::debug!(
          fixture = %id,
          %stored_synced_at,
          "kept newer stored snapshot"
        );
      }
    }
    Ok(())
  }

  // ─── Proximity ─────────────────────────────────────────────────────────────

  async fn rank_near(
    &self,
    city: &str,
    mut fixtures: Vec<Fixture>,
    warnings: &mut Vec<Warning>,
  ) -> Vec<RankedFixture> {
    let origin = match self.geo.resolve(city).await {
      Ok(origin) => origin,
      Err(reason) => {
        tracing::warn!(city, error = %reason, "city not resolved, using date order");
        warnings.push(Warning::CityUnresolved {
          city: city.to_owned(),
          reason,
        });
        return sort_by_kickoff(fixtures);
      }
    };

    let venues = self.locate_venues(&fixtures).await;
    let mut missing = 0;
    for fixture in &mut fixtures {
      fixture.venue_coordinates = fixture
        .venue_city
        .as_deref()
        .and_then(|c| venues.get(c).copied());
      if fixture.venue_coordinates.is_none() {
        missing += 1;
      }
    }
    if missing > 0 {
      warnings.push(Warning::VenueCoordinatesMissing { count: missing });
    }

    rank_by_distance(origin, fixtures)
  }

  /// Coordinates of every distinct venue city, looked up concurrently.
  /// Cities that could not be resolved are absent.
  async fn locate_venues(
    &self,
    fixtures: &[Fixture],
  ) -> HashMap<String, Coordinates> {
    let cities: BTreeSet<&str> = fixtures
      .iter()
      .filter_map(|f| f.venue_city.as_deref())
      .collect();

    let mut lookups = JoinSet::new();
    for city in cities {
      let geo = self.geo.clone();
      let city = city.to_owned();
      lookups.spawn(async move {
        let coordinates = geo.resolve_or_default(&city).await;
        (city, coordinates)
      });
    }

    let mut venues = HashMap::new();
    while let Some(joined) = lookups.join_next().await {
      if let Ok((city, Some(coordinates))) = joined {
        venues.insert(city, coordinates);
      }
    }
    venues
  }
}
