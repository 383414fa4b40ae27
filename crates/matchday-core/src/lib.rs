//! Core types and trait definitions for the Matchday fixture cache.
//!
//! This crate is deliberately free of HTTP and database dependencies.
//! All other crates depend on it; it depends on nothing proprietary.

pub mod error;
pub mod fixture;
pub mod geo;
pub mod source;
pub mod status;
pub mod store;
pub mod sync;

pub use error::{Error, Result};
