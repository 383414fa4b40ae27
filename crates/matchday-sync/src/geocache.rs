//! Place name to coordinates, cached.
//!
//! Successful lookups persist through a [`GeoStore`]. A "no such place"
//! answer is remembered in memory for a short while; a failure to reach the
//! geocoder is never remembered. Concurrent lookups of the same uncached
//! name share one geocoder call.

use std::{
  collections::HashMap,
  sync::{Arc, Mutex, PoisonError},
};

use chrono::{DateTime, Utc};
use matchday_core::{
  Error, Result,
  geo::{Coordinates, GeoCacheEntry, PlaceKey},
  source::Geocoder,
  store::GeoStore,
};

use crate::{config::GeoCacheConfig, single_flight::SingleFlight};

type Negatives = Arc<Mutex<HashMap<PlaceKey, DateTime<Utc>>>>;

pub struct GeoCache<S, G> {
  store:    Arc<S>,
  geocoder: Arc<G>,
  config:   GeoCacheConfig,
  /// Unresolvable names and when the geocoder said so.
  negative: Negatives,
  flight:   SingleFlight<PlaceKey, Result<Coordinates>>,
}

impl<S, G> Clone for GeoCache<S, G> {
  fn clone(&self) -> Self {
    Self {
      store:    Arc::clone(&self.store),
      geocoder: Arc::clone(&self.geocoder),
      config:   self.config,
      negative: Arc::clone(&self.negative),
      flight:   self.flight.clone(),
    }
  }
}

impl<S, G> GeoCache<S, G>
where
  S: GeoStore + 'static,
  G: Geocoder + 'static,
{
  pub fn new(store: Arc<S>, geocoder: Arc<G>, config: GeoCacheConfig) -> Self {
    Self {
      store,
      geocoder,
      config,
      negative: Arc::default(),
      flight: SingleFlight::new(),
    }
  }

  /// Coordinates for `place`.
  ///
  /// Fails with [`Error::GeocodeUnresolved`] when the geocoder knows no such
  /// place and [`Error::GeocodeUnavailable`] when it could not be asked.
  pub async fn resolve(&self, place: &str) -> Result<Coordinates> {
    let Some(key) = PlaceKey::new(place) else {
      return Err(Error::GeocodeUnresolved(place.to_owned()));
    };
    let now = Utc::now();

    if self.known_unresolvable(&key, now) {
      tracing::debug!(place = key.as_str(), "negative geocache hit");
      return Err(Error::GeocodeUnresolved(place.trim().to_owned()));
    }

    match self.store.get_place(&key).await {
      Ok(Some(entry)) if entry.is_fresh_at(self.config.ttl(), now) => {
        tracing::debug!(place = key.as_str(), "geocache hit");
        return Ok(entry.coordinates);
      }
      Ok(_) => {}
      Err(e) => {
        tracing::warn!(
          place = key.as_str(),
          error = %e,
          "geocache read failed, treating as a miss"
        );
      }
    }

    let name = place.trim().to_owned();
    let store = Arc::clone(&self.store);
    let geocoder = Arc::clone(&self.geocoder);
    let negative = Arc::clone(&self.negative);
    let config = self.config;
    let flight_key = key.clone();

    self
      .flight
      .run(key, move || async move {
        lookup(&*store, &*geocoder, &negative, config, flight_key, name).await
      })
      .await
      .unwrap_or_else(|e| Err(Error::GeocodeUnavailable(e.to_string())))
  }

  /// [`resolve`](Self::resolve), with `None` standing in for any failure.
  pub async fn resolve_or_default(&self, place: &str) -> Option<Coordinates> {
    match self.resolve(place).await {
      Ok(coordinates) => Some(coordinates),
      Err(e) => {
        tracing::debug!(place, error = %e, "no coordinates");
        None
      }
    }
  }

  fn known_unresolvable(&self, key: &PlaceKey, now: DateTime<Utc>) -> bool {
    let Some(ttl) = self.config.negative_ttl() else {
      return false;
    };
    let mut negative =
      self.negative.lock().unwrap_or_else(PoisonError::into_inner);
    match negative.get(key) {
      Some(at) if now - *at < ttl => true,
      Some(_) => {
        negative.remove(key);
        false
      }
      None => false,
    }
  }
}

/// One geocoder call and its cache side effects.
async fn lookup<S: GeoStore, G: Geocoder>(
  store: &S,
  geocoder: &G,
  negative: &Mutex<HashMap<PlaceKey, DateTime<Utc>>>,
  config: GeoCacheConfig,
  key: PlaceKey,
  name: String,
) -> Result<Coordinates> {
  tracing::info!(place = %name, "geocoding");
  let timeout = config.timeout();
  let outcome = tokio::time::timeout(timeout, geocoder.geocode(&name))
    .await
    .unwrap_or_else(|_| {
      Err(Error::GeocodeUnavailable(format!("timed out after {timeout:?}")))
    });

  match &outcome {
    Ok(coordinates) => {
      let entry = GeoCacheEntry {
        key,
        coordinates: *coordinates,
        acquired_at: Utc::now(),
      };
      if let Err(e) = store.put_place(entry).await {
        tracing::warn!(place = %name, error = %e, "geocache write failed");
      }
    }
    Err(Error::GeocodeUnresolved(_)) => {
      if let Some(ttl) = config.negative_ttl() {
        let now = Utc::now();
        let mut negative =
          negative.lock().unwrap_or_else(PoisonError::into_inner);
        // Names that are never asked for again would otherwise stay forever.
        negative.retain(|_, at| now - *at < ttl);
        negative.insert(key, now);
      }
      tracing::info!(place = %name, "place could not be geocoded");
    }
    Err(e) => {
      tracing::warn!(place = %name, error = %e, "geocoder unavailable");
    }
  }
  outcome
}
