//! Attendance records and the roster read model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{RECENT_LIMIT, session::AttendanceSession};

/// Proof that a student was present. At most one per (session, student);
/// never mutated or deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendanceRecord {
  pub session_id: Uuid,
  pub student_id: Uuid,
  pub marked_at:  DateTime<Utc>,
}

/// A record joined with the student's display details.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterEntry {
  pub student_id:        Uuid,
  pub student_name:      String,
  pub enrollment_number: String,
  pub marked_at:         DateTime<Utc>,
}

/// Everyone who has checked in to a session, in arrival order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Roster {
  pub total_count: u64,
  pub records:     Vec<RosterEntry>,
}

impl Roster {
  /// The trailing [`RECENT_LIMIT`] entries, oldest first.
  pub fn recent(&self) -> &[RosterEntry] {
    let skip = self.records.len().saturating_sub(RECENT_LIMIT);
    &self.records[skip..]
  }
}

/// Confirmation handed back to a student after a successful scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkReceipt {
  pub session_id:   Uuid,
  pub session_name: String,
  pub subject_name: String,
  pub marked_at:    DateTime<Utc>,
}

impl MarkReceipt {
  pub fn for_record(record: &AttendanceRecord, session: &AttendanceSession) -> Self {
    Self {
      session_id:   record.session_id,
      session_name: session.name.clone(),
      subject_name: session.subject_name.clone(),
      marked_at:    record.marked_at,
    }
  }
}
