//! The error taxonomy shared by every Matchday crate.
//!
//! Variants carry only owned strings and durations so the type is `Clone`:
//! one single-flight outcome is handed to every caller that joined it.

use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
  /// The local store could not be read or written.
  #[error("storage unavailable: {0}")]
  StorageUnavailable(String),

  #[error("upstream unavailable: {0}")]
  UpstreamUnavailable(String),

  #[error("upstream timed out after {0:?}")]
  UpstreamTimeout(Duration),

  /// The geocoder answered, but knows no such place.
  #[error("could not geocode {0:?}")]
  GeocodeUnresolved(String),

  #[error("geocoding unavailable: {0}")]
  GeocodeUnavailable(String),

  #[error("invalid query: {0}")]
  InvalidQuery(String),
}

impl Error {
  /// Fatal errors fail the whole query; everything else degrades it.
  pub fn is_fatal(&self) -> bool {
    matches!(self, Self::StorageUnavailable(_) | Self::InvalidQuery(_))
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
