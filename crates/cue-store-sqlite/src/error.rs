//! Error type for `cue-store-sqlite`.

use cue_core::store::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error(transparent)]
  Core(#[from] cue_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("uuid parse error: {0}")]
  Uuid(#[from] uuid::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  #[error("unrecognised enum value: {0}")]
  Enum(#[from] strum::ParseError),

  #[error("column {column} out of range: {value}")]
  OutOfRange { column: &'static str, value: i64 },
}

impl From<cue_core::mark::MarkError> for Error {
  fn from(e: cue_core::mark::MarkError) -> Self { Self::Core(e.into()) }
}

impl StoreError for Error {
  fn domain(&self) -> Option<&cue_core::Error> {
    match self {
      Self::Core(e) => Some(e),
      _ => None,
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
