//! Attendance sessions and their one-way lifecycle.
//!
//! A session is created `Active` and transitions exactly once, irreversibly,
//! to `Ended`. `end_time` is null while active and immutable once set.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use uuid::Uuid;

use crate::{Error, Result};

/// Lifecycle state of an [`AttendanceSession`].
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum SessionState {
  Active,
  Ended,
}

/// One instructor-initiated attendance-taking window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendanceSession {
  #[serde(rename = "id")]
  pub session_id:   Uuid,
  #[serde(rename = "session_name")]
  pub name:         String,
  pub subject_id:   Uuid,
  pub subject_name: String,
  pub owner_id:     Uuid,
  /// Server-assigned at creation; the only anchor for duration.
  pub start_time:   DateTime<Utc>,
  pub end_time:     Option<DateTime<Utc>>,
  pub state:        SessionState,
}

impl AttendanceSession {
  pub fn is_active(&self) -> bool { self.state == SessionState::Active }

  /// Apply the `Active → Ended` transition.
  pub fn end(&mut self, at: DateTime<Utc>) -> Result<()> {
    if !self.is_active() {
      return Err(Error::SessionEnded(self.session_id));
    }
    self.state = SessionState::Ended;
    self.end_time = Some(at);
    Ok(())
  }
}

/// Input to [`crate::store::AttendanceStore::create_session`].
/// `start_time` is always set by the store.
#[derive(Debug, Clone)]
pub struct NewSession {
  pub name:       String,
  pub subject_id: Uuid,
  pub owner_id:   Uuid,
}

impl NewSession {
  /// Build a session request, rejecting a blank name before any I/O happens.
  pub fn new(name: &str, subject_id: Uuid, owner_id: Uuid) -> Result<Self> {
    let name = name.trim();
    if name.is_empty() {
      return Err(Error::EmptySessionName);
    }
    Ok(Self { name: name.to_owned(), subject_id, owner_id })
  }
}

/// Acknowledgement returned when a session is ended.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndedSession {
  pub session:     AttendanceSession,
  /// Authoritative number of records at the moment the session ended.
  pub total_count: u64,
}

/// Whole seconds between `start` and `end`, floored; zero if `end` precedes
/// `start`.
pub fn session_duration_secs(start: DateTime<Utc>, end: DateTime<Utc>) -> u64 {
  let millis = (end - start).num_milliseconds();
  u64::try_from(millis).map(|m| m / 1000).unwrap_or(0)
}
