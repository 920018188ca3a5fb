//! Error types for `cue-core`.

use thiserror::Error;
use uuid::Uuid;

use crate::mark::MarkError;

#[derive(Debug, Error)]
pub enum Error {
  #[error("session not found: {0}")]
  SessionNotFound(Uuid),

  #[error("session {0} has already ended")]
  SessionEnded(Uuid),

  #[error("subject not found: {0}")]
  SubjectNotFound(Uuid),

  #[error("user not found: {0}")]
  UserNotFound(Uuid),

  #[error("a user with email {0:?} already exists")]
  DuplicateEmail(String),

  #[error("session name must not be empty")]
  EmptySessionName,

  #[error("attendance rejected: {0}")]
  Mark(#[from] MarkError),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
