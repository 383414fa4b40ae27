//! Fixture status tokens and the live-status state machine.
//!
//! Upstream reports status as a short token (`"NS"`, `"1H"`, `"FT"`, ...).
//! The raw token is what gets stored; everything derived from it, liveness
//! included, is recomputed through [`FixtureStatus`] on every read.

use std::fmt;

use serde::{Deserialize, Serialize};

// ─── Status ──────────────────────────────────────────────────────────────────

/// A parsed upstream status token.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FixtureStatus {
  /// Kickoff time not yet fixed.
  TimeToBeDefined,
  NotStarted,
  FirstHalf,
  HalfTime,
  SecondHalf,
  ExtraTime,
  /// Break between the end of normal time and extra time.
  Break,
  /// Penalty shoot-out in progress.
  Penalties,
  Suspended,
  Interrupted,
  FullTime,
  AfterExtraTime,
  AfterPenalties,
  Postponed,
  Cancelled,
  Abandoned,
  TechnicalLoss,
  Walkover,
  /// In play, without a more specific phase.
  Live,
  /// Any token outside the known vocabulary, kept verbatim.
  Other(String),
}

impl FixtureStatus {
  /// Parse an upstream token. Matching is exact and case-sensitive.
  pub fn from_code(code: &str) -> Self {
    match code {
      "TBD" => Self::TimeToBeDefined,
      "NS" => Self::NotStarted,
      "1H" => Self::FirstHalf,
      "HT" => Self::HalfTime,
      "2H" => Self::SecondHalf,
      "ET" => Self::ExtraTime,
      "BT" => Self::Break,
      "P" => Self::Penalties,
      "SUSP" => Self::Suspended,
      "INT" => Self::Interrupted,
      "FT" => Self::FullTime,
      "AET" => Self::AfterExtraTime,
      "PEN" => Self::AfterPenalties,
      "PST" => Self::Postponed,
      "CANC" => Self::Cancelled,
      "ABD" => Self::Abandoned,
      "AWD" => Self::TechnicalLoss,
      "WO" => Self::Walkover,
      "LIVE" => Self::Live,
      other => Self::Other(other.to_owned()),
    }
  }

  /// The token this status was parsed from.
  pub fn as_code(&self) -> &str {
    match self {
      Self::TimeToBeDefined => "TBD",
      Self::NotStarted => "NS",
      Self::FirstHalf => "1H",
      Self::HalfTime => "HT",
      Self::SecondHalf => "2H",
      Self::ExtraTime => "ET",
      Self::Break => "BT",
      Self::Penalties => "P",
      Self::Suspended => "SUSP",
      Self::Interrupted => "INT",
      Self::FullTime => "FT",
      Self::AfterExtraTime => "AET",
      Self::AfterPenalties => "PEN",
      Self::Postponed => "PST",
      Self::Cancelled => "CANC",
      Self::Abandoned => "ABD",
      Self::TechnicalLoss => "AWD",
      Self::Walkover => "WO",
      Self::Live => "LIVE",
      Self::Other(code) => code,
    }
  }

  pub fn phase(&self) -> Phase {
    match self {
      Self::TimeToBeDefined | Self::NotStarted => Phase::Scheduled,
      Self::FirstHalf
      | Self::HalfTime
      | Self::SecondHalf
      | Self::ExtraTime
      | Self::Break
      | Self::Penalties
      | Self::Live => Phase::InPlay,
      Self::Suspended | Self::Interrupted => Phase::Interrupted,
      Self::FullTime
      | Self::AfterExtraTime
      | Self::AfterPenalties
      | Self::TechnicalLoss
      | Self::Walkover => Phase::Finished,
      Self::Postponed => Phase::Postponed,
      Self::Cancelled | Self::Abandoned => Phase::Cancelled,
      Self::Other(_) => Phase::Unknown,
    }
  }

  /// Whether the fixture is being played right now.
  pub fn is_live(&self) -> bool { self.phase() == Phase::InPlay }
}

impl fmt::Display for FixtureStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_code())
  }
}

/// True iff `status_code` is one of the in-play tokens. Unknown tokens are
/// never live.
pub fn classify_live(status_code: &str) -> bool {
  FixtureStatus::from_code(status_code).is_live()
}

// ─── Phase ───────────────────────────────────────────────────────────────────

/// Coarse lifecycle phase of a fixture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
  Scheduled,
  InPlay,
  Interrupted,
  Finished,
  Postponed,
  Cancelled,
  Unknown,
}

// ─── Transitions ─────────────────────────────────────────────────────────────

/// A status change observed while merging a fresh snapshot over a stored one.
///
/// Upstream is authoritative, so no transition is ever rejected; this type
/// only describes what happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusTransition {
  pub from: FixtureStatus,
  pub to:   FixtureStatus,
}

impl StatusTransition {
  /// `None` when the two tokens are identical.
  pub fn between(from: &str, to: &str) -> Option<Self> {
    (from != to).then(|| Self {
      from: FixtureStatus::from_code(from),
      to:   FixtureStatus::from_code(to),
    })
  }

  pub fn kicked_off(&self) -> bool { !self.from.is_live() && self.to.is_live() }

  pub fn ended(&self) -> bool {
    self.from.phase() != Phase::Finished && self.to.phase() == Phase::Finished
  }

  pub fn phase_changed(&self) -> bool { self.from.phase() != self.to.phase() }
}

impl fmt::Display for StatusTransition {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{} -> {}", self.from, self.to)
  }
}
