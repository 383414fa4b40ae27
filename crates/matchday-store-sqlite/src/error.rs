//! Error type for `matchday-store-sqlite`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  /// A stored column holds a value no domain type accepts.
  #[error("corrupt column {column}: {value:?}")]
  Decode { column: &'static str, value: String },

  #[error("database schema version {found} is newer than supported {supported}")]
  SchemaTooNew { found: i64, supported: i64 },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
