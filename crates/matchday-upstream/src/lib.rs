//! HTTP collaborators for the Matchday fixture cache.
//!
//! [`ApiFootball`] implements [`FixtureSource`] over the API-Football v3
//! REST API; [`OpenMeteo`] implements [`Geocoder`] over the Open-Meteo
//! geocoding API. Each call is a single attempt: retries and backoff belong
//! to the caller.
//!
//! [`FixtureSource`]: matchday_core::source::FixtureSource
//! [`Geocoder`]: matchday_core::source::Geocoder

pub mod api_football;
pub mod open_meteo;

pub use api_football::{ApiFootball, ApiFootballConfig};
pub use open_meteo::{OpenMeteo, OpenMeteoConfig};
