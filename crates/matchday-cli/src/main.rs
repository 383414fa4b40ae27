//! `matchday` — query the fixture cache from the command line.
//!
//! Loads `matchday.toml` (or the path given with `--config`) plus
//! `MATCHDAY_*` environment overrides, opens the SQLite cache, answers one
//! query through the sync coordinator and prints the result as JSON on
//! stdout. Logs go to stderr.

mod config;

use std::{path::PathBuf, sync::Arc};

use anyhow::Context as _;
use chrono::NaiveDate;
use clap::Parser;
use matchday_core::{Error, fixture::CompetitionFilter};
use matchday_store_sqlite::SqliteStore;
use matchday_sync::{MatchQuery, SyncCoordinator};
use matchday_upstream::{ApiFootball, OpenMeteo};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

use crate::config::AppConfig;

#[derive(Parser)]
#[command(author, version, about = "Football fixtures, cached")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "matchday.toml")]
  config: PathBuf,

  /// UTC match date (YYYY-MM-DD). Without it, lists upcoming fixtures.
  #[arg(short, long)]
  date: Option<String>,

  /// Rank fixtures by distance from this place.
  #[arg(long)]
  city: Option<String>,

  /// One of all, league, cup, international.
  #[arg(short, long, default_value = "all")]
  filter: String,

  /// Number of upcoming fixtures to list.
  #[arg(short, long, default_value_t = 50)]
  limit: usize,
}

impl Cli {
  fn query(&self) -> Result<MatchQuery, Error> {
    let filter: CompetitionFilter = self.filter.parse()?;
    let query = match &self.date {
      Some(date) => MatchQuery::on(
        NaiveDate::parse_from_str(date, "%Y-%m-%d").map_err(|e| {
          Error::InvalidQuery(format!("invalid date {date:?}: {e}"))
        })?,
      ),
      None => MatchQuery::upcoming(self.limit),
    };
    let query = query.with_competition_type(filter);
    Ok(match &self.city {
      Some(city) => query.near(city),
      None => query,
    })
  }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  // stdout carries the JSON result only.
  tracing_subscriber::fmt()
    .with_writer(std::io::stderr)
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();
  let query = cli.query()?;
  let config = AppConfig::load(&cli.config)?;

  if config.api_football.api_key.is_empty() {
    tracing::warn!("no API-Football key configured; upstream calls will fail");
  }

  if let Some(parent) = config.store_path.parent() {
    std::fs::create_dir_all(parent)
      .with_context(|| format!("failed to create {parent:?}"))?;
  }
  let store = SqliteStore::open(&config.store_path)
    .await
    .with_context(|| format!("failed to open store at {:?}", config.store_path))?;

  let source = ApiFootball::new(config.api_football.clone())
    .context("failed to build API-Football client")?;
  let geocoder = OpenMeteo::new(config.geocoder.clone())
    .context("failed to build geocoding client")?;

  let coordinator = SyncCoordinator::new(
    Arc::new(store),
    Arc::new(source),
    Arc::new(geocoder),
    config.sync,
  );

  let result = coordinator.query(query).await.context("query failed")?;
  if result.degraded {
    tracing::warn!("some partitions could not be refreshed; results may be stale");
  }

  let json = serde_json::to_string_pretty(&result)
    .context("failed to serialise result")?;
  println!("{json}");
  Ok(())
}

#[cfg(test)]
mod tests {
  use matchday_core::fixture::CompetitionType;
  use matchday_sync::QueryWindow;

  use super::*;

  fn cli(args: &[&str]) -> Cli {
    Cli::parse_from(std::iter::once("matchday").chain(args.iter().copied()))
  }

  #[test]
  fn date_filter_and_city_build_a_query() {
    let query = cli(&["--date", "2026-03-15", "--filter", "cup", "--city", "Leeds"])
      .query()
      .unwrap();
    assert_eq!(
      query.window,
      QueryWindow::Date(NaiveDate::from_ymd_opt(2026, 3, 15).unwrap())
    );
    assert_eq!(
      query.competition_type,
      CompetitionFilter::Only(CompetitionType::Cup)
    );
    assert_eq!(query.city.as_deref(), Some("Leeds"));
  }

  #[test]
  fn no_date_means_upcoming() {
    let query = cli(&["--limit", "10"]).query().unwrap();
    assert_eq!(query.window, QueryWindow::Upcoming { limit: 10 });
    assert_eq!(query.competition_type, CompetitionFilter::All);
  }

  #[test]
  fn bad_date_or_filter_is_an_invalid_query() {
    assert!(matches!(
      cli(&["--date", "15/03/2026"]).query(),
      Err(Error::InvalidQuery(_))
    ));
    assert!(matches!(
      cli(&["--filter", "friendly"]).query(),
      Err(Error::InvalidQuery(_))
    ));
  }
}
