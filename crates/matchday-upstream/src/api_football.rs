//! API-Football v3 fixture source.
//!
//! Both endpoints are `GET /fixtures` authenticated with the
//! `x-apisports-key` header: `?league=&season=&date=` for one day and
//! `?league=&season=&next=` for the next N fixtures.

use std::time::Duration;

use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use matchday_core::{
  Error, Result,
  fixture::{CompetitionId, CompetitionType, FixtureId, NewFixture},
  source::FixtureSource,
};
use reqwest::{Client, StatusCode};
use serde::Deserialize;

/// League ids API-Football files as plain leagues or cups that are really
/// international competitions (World Cup, Euros, qualifiers, friendlies).
const INTERNATIONAL_LEAGUE_IDS: [u32; 14] =
  [1, 4, 5, 6, 7, 9, 10, 11, 29, 30, 31, 32, 33, 34];

// ─── Config ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApiFootballConfig {
  pub base_url:   String,
  pub api_key:    String,
  /// Season year sent with every request.
  pub season:     u16,
  pub timeout_ms: u64,
}

impl Default for ApiFootballConfig {
  fn default() -> Self {
    Self {
      base_url:   "https://v3.football.api-sports.io".into(),
      api_key:    String::new(),
      season:     2025,
      timeout_ms: 10_000,
    }
  }
}

// ─── Client ──────────────────────────────────────────────────────────────────

/// Cheap to clone; the inner [`reqwest::Client`] is `Arc`-based.
#[derive(Clone)]
pub struct ApiFootball {
  client:  Client,
  config:  ApiFootballConfig,
  timeout: Duration,
}

impl ApiFootball {
  pub fn new(config: ApiFootballConfig) -> Result<Self> {
    let timeout = Duration::from_millis(config.timeout_ms);
    let client = Client::builder()
      .timeout(timeout)
      .build()
      .map_err(|e| Error::UpstreamUnavailable(format!("http client: {e}")))?;
    Ok(Self { client, config, timeout })
  }

  fn url(&self) -> String {
    format!("{}/fixtures", self.config.base_url.trim_end_matches('/'))
  }

  fn transport(&self, e: reqwest::Error) -> Error {
    if e.is_timeout() {
      Error::UpstreamTimeout(self.timeout)
    } else {
      Error::UpstreamUnavailable(e.to_string())
    }
  }

  async fn fetch(
    &self,
    competition: CompetitionId,
    selector: (&str, String),
  ) -> Result<Vec<NewFixture>> {
    let resp = self
      .client
      .get(self.url())
      .header("x-apisports-key", &self.config.api_key)
      .query(&[
        ("league", competition.to_string()),
        ("season", self.config.season.to_string()),
        (selector.0, selector.1),
      ])
      .send()
      .await
      .map_err(|e| self.transport(e))?;

    let status = resp.status();
    if status == StatusCode::TOO_MANY_REQUESTS {
      return Err(Error::UpstreamUnavailable("rate limited (HTTP 429)".into()));
    }
    if !status.is_success() {
      return Err(Error::UpstreamUnavailable(format!("HTTP {status}")));
    }

    let envelope: Envelope = resp.json().await.map_err(|e| self.transport(e))?;
    let Parsed { fixtures, skipped } = parse_envelope(envelope)?;
    if skipped > 0 {
      tracing::warn!(
        competition = %competition,
        count = fixtures.len(),
        skipped,
        "api-football answered with malformed records"
      );
    } else {
      tracing::info!(
        competition = %competition,
        count = fixtures.len(),
        "api-football answered"
      );
    }
    Ok(fixtures)
  }
}

impl FixtureSource for ApiFootball {
  async fn fixtures_on(
    &self,
    competition: CompetitionId,
    date: NaiveDate,
  ) -> Result<Vec<NewFixture>> {
    self
      .fetch(competition, ("date", date.format("%Y-%m-%d").to_string()))
      .await
  }

  async fn fixtures_next(
    &self,
    competition: CompetitionId,
    count: u32,
  ) -> Result<Vec<NewFixture>> {
    self.fetch(competition, ("next", count.to_string())).await
  }
}

// ─── Wire format ─────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct Envelope {
  /// `[]` when fine, an object such as `{"requests": "..."}` when the call
  /// was refused.
  #[serde(default)]
  errors:   serde_json::Value,
  #[serde(default)]
  response: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct RawFixture {
  fixture: RawFixtureInfo,
  league:  RawLeague,
  teams:   RawTeams,
}

#[derive(Debug, Deserialize)]
struct RawFixtureInfo {
  id:     u64,
  date:   DateTime<FixedOffset>,
  #[serde(default)]
  venue:  Option<RawVenue>,
  #[serde(default)]
  status: Option<RawStatus>,
}

#[derive(Debug, Deserialize)]
struct RawVenue {
  name: Option<String>,
  city: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawStatus {
  short: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawLeague {
  id:    u32,
  name:  String,
  #[serde(rename = "type")]
  kind:  Option<String>,
  round: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawTeams {
  home: RawTeam,
  away: RawTeam,
}

#[derive(Debug, Deserialize)]
struct RawTeam {
  name: String,
  logo: Option<String>,
}

/// The usable records of one answer, and how many were dropped.
#[derive(Debug)]
struct Parsed {
  fixtures: Vec<NewFixture>,
  skipped:  usize,
}

fn parse_envelope(envelope: Envelope) -> Result<Parsed> {
  let refused = match &envelope.errors {
    serde_json::Value::Object(map) => !map.is_empty(),
    serde_json::Value::Array(list) => !list.is_empty(),
    _ => false,
  };
  if refused {
    return Err(Error::UpstreamUnavailable(format!(
      "api-football refused the request: {}",
      envelope.errors
    )));
  }

  let mut parsed = Parsed { fixtures: Vec::new(), skipped: 0 };
  for value in envelope.response {
    match serde_json::from_value::<RawFixture>(value) {
      Ok(raw) => parsed.fixtures.push(transform(raw)),
      Err(e) => {
        tracing::warn!(error = %e, "skipping malformed fixture record");
        parsed.skipped += 1;
      }
    }
  }
  Ok(parsed)
}

fn classify(league: &RawLeague) -> CompetitionType {
  if INTERNATIONAL_LEAGUE_IDS.contains(&league.id) {
    return CompetitionType::International;
  }
  match league.kind.as_deref().map(str::to_lowercase).as_deref() {
    Some("cup") => CompetitionType::Cup,
    _ => CompetitionType::League,
  }
}

/// Empty strings upstream mean "unknown", same as null.
fn non_empty(value: Option<String>) -> Option<String> {
  value.filter(|s| !s.trim().is_empty())
}

fn transform(raw: RawFixture) -> NewFixture {
  let competition_type = classify(&raw.league);
  let (venue_name, venue_city) = raw
    .fixture
    .venue
    .map(|v| (non_empty(v.name), non_empty(v.city)))
    .unwrap_or_default();

  NewFixture {
    id: FixtureId(raw.fixture.id.to_string()),
    home_team: raw.teams.home.name,
    away_team: raw.teams.away.name,
    home_team_badge: non_empty(raw.teams.home.logo),
    away_team_badge: non_empty(raw.teams.away.logo),
    competition_id: CompetitionId(raw.league.id),
    competition_name: raw.league.name,
    competition_type,
    round: non_empty(raw.league.round),
    kickoff: raw.fixture.date.with_timezone(&Utc),
    venue_name,
    venue_city,
    status_code: raw
      .fixture
      .status
      .and_then(|s| s.short)
      .unwrap_or_default(),
  }
}

#[cfg(test)]
mod tests {
  use chrono::TimeZone;
  use serde_json::json;

  use super::*;

  fn record(id: u64, league_id: u32, league_type: &str) -> serde_json::Value {
    json!({
      "fixture": {
        "id": id,
        "date": "2026-03-15T17:30:00+01:00",
        "venue": { "id": 556, "name": "Old Trafford", "city": "Manchester" },
        "status": { "long": "Not Started", "short": "NS", "elapsed": null }
      },
      "league": {
        "id": league_id,
        "name": "Premier League",
        "type": league_type,
        "round": "Regular Season - 28"
      },
      "teams": {
        "home": { "id": 33, "name": "Manchester United", "logo": "https://media.api-sports.io/football/teams/33.png" },
        "away": { "id": 40, "name": "Liverpool", "logo": "https://media.api-sports.io/football/teams/40.png" }
      }
    })
  }

  fn parse(body: serde_json::Value) -> Result<Vec<NewFixture>> {
    parse_envelope(serde_json::from_value(body).unwrap()).map(|p| p.fixtures)
  }

  #[test]
  fn transforms_a_fixture_record() {
    let fixtures = parse(json!({
      "errors": [],
      "results": 1,
      "response": [record(1_208_021, 39, "League")]
    }))
    .unwrap();

    let f = &fixtures[0];
    assert_eq!(f.id.as_str(), "1208021");
    assert_eq!(f.home_team, "Manchester United");
    assert_eq!(f.away_team, "Liverpool");
    assert_eq!(
      f.home_team_badge.as_deref(),
      Some("https://media.api-sports.io/football/teams/33.png")
    );
    assert_eq!(f.competition_id, CompetitionId(39));
    assert_eq!(f.competition_name, "Premier League");
    assert_eq!(f.competition_type, CompetitionType::League);
    assert_eq!(f.round.as_deref(), Some("Regular Season - 28"));
    assert_eq!(f.kickoff, Utc.with_ymd_and_hms(2026, 3, 15, 16, 30, 0).unwrap());
    assert_eq!(f.venue_name.as_deref(), Some("Old Trafford"));
    assert_eq!(f.venue_city.as_deref(), Some("Manchester"));
    assert_eq!(f.status_code, "NS");
  }

  #[test]
  fn competition_type_prefers_the_international_list() {
    let fixtures = parse(json!({
      "response": [
        record(1, 2, "Cup"),
        record(2, 1, "Cup"),
        record(3, 32, "League"),
        record(4, 140, "League"),
        record(5, 140, "Friendly"),
      ]
    }))
    .unwrap();

    let kinds: Vec<_> = fixtures.iter().map(|f| f.competition_type).collect();
    assert_eq!(kinds, [
      CompetitionType::Cup,
      CompetitionType::International,
      CompetitionType::International,
      CompetitionType::League,
      CompetitionType::League,
    ]);
  }

  #[test]
  fn missing_venue_and_status_become_none_and_empty() {
    let mut raw = record(9, 39, "League");
    raw["fixture"]["venue"] = json!({ "id": null, "name": null, "city": "" });
    raw["fixture"].as_object_mut().unwrap().remove("status");
    raw["league"]["round"] = serde_json::Value::Null;

    let fixtures = parse(json!({ "response": [raw] })).unwrap();
    let f = &fixtures[0];
    assert_eq!(f.venue_name, None);
    assert_eq!(f.venue_city, None);
    assert_eq!(f.round, None);
    assert_eq!(f.status_code, "");
  }

  #[test]
  fn malformed_records_are_skipped() {
    let mut broken = record(2, 39, "League");
    broken["fixture"]["date"] = json!("not a date");
    let envelope = serde_json::from_value(json!({
      "response": [record(1, 39, "League"), broken, { "fixture": {} }]
    }))
    .unwrap();
    let Parsed { fixtures, skipped } = parse_envelope(envelope).unwrap();
    assert_eq!(fixtures.len(), 1);
    assert_eq!(fixtures[0].id.as_str(), "1");
    assert_eq!(skipped, 2);
  }

  #[test]
  fn errors_object_is_upstream_unavailable() {
    let outcome = parse(json!({
      "errors": { "requests": "You have reached the request limit for the day" },
      "response": []
    }));
    assert!(matches!(outcome, Err(Error::UpstreamUnavailable(_))));
  }

  #[test]
  fn empty_response_is_a_valid_answer() {
    assert!(parse(json!({ "errors": [], "response": [] })).unwrap().is_empty());
  }

  #[tokio::test]
  async fn unreachable_host_is_upstream_unavailable() {
    let source = ApiFootball::new(ApiFootballConfig {
      base_url: "http://127.0.0.1:9".into(),
      timeout_ms: 2_000,
      ..ApiFootballConfig::default()
    })
    .unwrap();
    let outcome = source.fixtures_next(CompetitionId(39), 5).await;
    assert!(matches!(
      outcome,
      Err(Error::UpstreamUnavailable(_) | Error::UpstreamTimeout(_))
    ));
  }
}
