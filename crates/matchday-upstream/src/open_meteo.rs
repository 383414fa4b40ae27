//! Open-Meteo geocoder: `GET {base}?name=<place>&count=1`.

use std::time::Duration;

use matchday_core::{Error, Result, geo::Coordinates, source::Geocoder};
use reqwest::Client;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OpenMeteoConfig {
  pub base_url:   String,
  pub timeout_ms: u64,
}

impl Default for OpenMeteoConfig {
  fn default() -> Self {
    Self {
      base_url:   "https://geocoding-api.open-meteo.com/v1/search".into(),
      timeout_ms: 5_000,
    }
  }
}

#[derive(Clone)]
pub struct OpenMeteo {
  client: Client,
  config: OpenMeteoConfig,
}

impl OpenMeteo {
  pub fn new(config: OpenMeteoConfig) -> Result<Self> {
    let client = Client::builder()
      .timeout(Duration::from_millis(config.timeout_ms))
      .build()
      .map_err(|e| Error::GeocodeUnavailable(format!("http client: {e}")))?;
    Ok(Self { client, config })
  }
}

impl Geocoder for OpenMeteo {
  async fn geocode(&self, place: &str) -> Result<Coordinates> {
    let unavailable = |e: reqwest::Error| Error::GeocodeUnavailable(e.to_string());

    let resp = self
      .client
      .get(&self.config.base_url)
      .query(&[("name", place), ("count", "1")])
      .send()
      .await
      .map_err(unavailable)?;

    if !resp.status().is_success() {
      return Err(Error::GeocodeUnavailable(format!("HTTP {}", resp.status())));
    }

    let body: SearchResponse = resp.json().await.map_err(unavailable)?;
    first_match(place, body)
  }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
  /// Absent altogether when nothing matched.
  #[serde(default)]
  results: Vec<Place>,
}

#[derive(Debug, Deserialize)]
struct Place {
  latitude:  f64,
  longitude: f64,
}

fn first_match(place: &str, body: SearchResponse) -> Result<Coordinates> {
  let Some(hit) = body.results.first() else {
    return Err(Error::GeocodeUnresolved(place.to_owned()));
  };
  Coordinates::new(hit.latitude, hit.longitude).ok_or_else(|| {
    Error::GeocodeUnavailable(format!(
      "out-of-range coordinates for {place:?}: {}, {}",
      hit.latitude, hit.longitude
    ))
  })
}

#[cfg(test)]
mod tests {
  use serde_json::json;

  use super::*;

  fn parse(place: &str, body: serde_json::Value) -> Result<Coordinates> {
    first_match(place, serde_json::from_value(body).unwrap())
  }

  #[test]
  fn first_result_wins() {
    let coordinates = parse("Paris", json!({
      "results": [
        { "id": 2988507, "name": "Paris", "latitude": 48.85341, "longitude": 2.3488, "country_code": "FR" },
        { "id": 4717560, "name": "Paris", "latitude": 33.66094, "longitude": -95.55551, "country_code": "US" }
      ],
      "generationtime_ms": 0.5
    }))
    .unwrap();
    assert_eq!(coordinates, Coordinates { lat: 48.85341, lng: 2.3488 });
  }

  #[test]
  fn no_results_is_unresolved() {
    let missing = parse("Atlantis", json!({ "generationtime_ms": 0.2 }));
    assert_eq!(missing, Err(Error::GeocodeUnresolved("Atlantis".into())));

    let empty = parse("Atlantis", json!({ "results": [] }));
    assert!(matches!(empty, Err(Error::GeocodeUnresolved(_))));
  }

  #[tokio::test]
  async fn unreachable_host_is_unavailable() {
    let geocoder = OpenMeteo::new(OpenMeteoConfig {
      base_url:   "http://127.0.0.1:9/v1/search".into(),
      timeout_ms: 2_000,
    })
    .unwrap();
    assert!(matches!(
      geocoder.geocode("Paris").await,
      Err(Error::GeocodeUnavailable(_))
    ));
  }
}
