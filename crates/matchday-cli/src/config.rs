//! Layered configuration: optional TOML file, then `MATCHDAY_*` environment
//! variables.

use std::path::{Path, PathBuf};

use anyhow::Context as _;
use matchday_sync::SyncConfig;
use matchday_upstream::{ApiFootballConfig, OpenMeteoConfig};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
  /// SQLite file; a leading `~/` is expanded.
  pub store_path:   PathBuf,
  pub sync:         SyncConfig,
  pub api_football: ApiFootballConfig,
  pub geocoder:     OpenMeteoConfig,
}

impl Default for AppConfig {
  fn default() -> Self {
    Self {
      store_path:   PathBuf::from("~/.local/share/matchday/matchday.db"),
      sync:         SyncConfig::default(),
      api_football: ApiFootballConfig::default(),
      geocoder:     OpenMeteoConfig::default(),
    }
  }
}

impl AppConfig {
  /// Read `path` if it exists, then overlay the environment.
  ///
  /// Nested keys use `__`, e.g. `MATCHDAY_API_FOOTBALL__API_KEY`;
  /// `MATCHDAY_SYNC__COMPETITIONS` takes a comma-separated list.
  pub fn load(path: &Path) -> anyhow::Result<Self> {
    let settings = ::config::Config::builder()
      .add_source(::config::File::from(path).required(false))
      .add_source(
        ::config::Environment::with_prefix("MATCHDAY")
          .separator("__")
          .list_separator(",")
          .with_list_parse_key("sync.competitions")
          .try_parsing(true),
      )
      .build()
      .context("failed to read configuration")?;

    let mut config: Self = settings
      .try_deserialize()
      .context("failed to deserialise configuration")?;
    config.store_path = expand_tilde(&config.store_path);
    Ok(config)
  }
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn missing_file_yields_defaults() {
    let config = AppConfig::load(Path::new("/nonexistent/matchday.toml")).unwrap();
    assert_eq!(config.sync.competitions.len(), 7);
    assert_eq!(config.api_football.season, 2025);
    assert!(!config.store_path.starts_with("~"));
  }

  #[test]
  fn paths_without_a_tilde_are_untouched() {
    let path = Path::new("/var/lib/matchday.db");
    assert_eq!(expand_tilde(path), path);
  }
}
