//! Upstream collaborator traits.
//!
//! Implemented by HTTP clients (e.g. `matchday-upstream`). The core never
//! retries a collaborator call; each call is one attempt whose outcome is
//! reported as-is.

use std::future::Future;

use chrono::NaiveDate;

use crate::{
  Result,
  fixture::{CompetitionId, NewFixture},
  geo::Coordinates,
};

/// The slow, rate-limited fixture provider.
///
/// Failures must be [`Error::UpstreamUnavailable`](crate::Error::UpstreamUnavailable)
/// or [`Error::UpstreamTimeout`](crate::Error::UpstreamTimeout).
pub trait FixtureSource: Send + Sync {
  /// Every fixture of `competition` kicking off on `date` (UTC).
  fn fixtures_on(
    &self,
    competition: CompetitionId,
    date: NaiveDate,
  ) -> impl Future<Output = Result<Vec<NewFixture>>> + Send + '_;

  /// The next `count` fixtures of `competition`, soonest first.
  fn fixtures_next(
    &self,
    competition: CompetitionId,
    count: u32,
  ) -> impl Future<Output = Result<Vec<NewFixture>>> + Send + '_;
}

/// Free-text place name to coordinates.
///
/// Must distinguish "no such place"
/// ([`Error::GeocodeUnresolved`](crate::Error::GeocodeUnresolved)) from
/// "could not ask" ([`Error::GeocodeUnavailable`](crate::Error::GeocodeUnavailable)).
pub trait Geocoder: Send + Sync {
  fn geocode<'a>(
    &'a self,
    place: &'a str,
  ) -> impl Future<Output = Result<Coordinates>> + Send + 'a;
}
