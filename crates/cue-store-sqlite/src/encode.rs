//! Encoding and decoding helpers between domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as fixed-width RFC 3339 strings (microsecond
//! precision, `Z` suffix) so that lexical order equals chronological order.
//! UUIDs are stored as hyphenated lowercase strings.

use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};
use cue_core::{
  code::RotatingCode,
  identity::{Role, StudentProfile, Subject, User},
  record::RosterEntry,
  session::{AttendanceSession, SessionState},
};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Uuid ─────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

// ─── DateTime<Utc> ────────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── Small integers ───────────────────────────────────────────────────────────

fn decode_semester(value: i64) -> Result<u8> {
  u8::try_from(value).map_err(|_| Error::OutOfRange { column: "semester", value })
}

// ─── Raw rows ─────────────────────────────────────────────────────────────────

/// A `users` row as read from SQLite, before parsing.
pub struct RawUser {
  pub user_id:       String,
  pub email:         String,
  pub role:          String,
  pub password_hash: String,
  pub created_at:    String,
}

impl RawUser {
  pub const COLUMNS: &'static str = "user_id, email, role, password_hash, created_at";

  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      user_id:       row.get(0)?,
      email:         row.get(1)?,
      role:          row.get(2)?,
      password_hash: row.get(3)?,
      created_at:    row.get(4)?,
    })
  }

  pub fn into_user(self) -> Result<User> {
    Ok(User {
      user_id:       decode_uuid(&self.user_id)?,
      email:         self.email,
      role:          Role::from_str(&self.role)?,
      created_at:    decode_dt(&self.created_at)?,
      password_hash: self.password_hash,
    })
  }
}

/// A `student_profiles` row.
pub struct RawProfile {
  pub user_id:           String,
  pub enrollment_number: String,
  pub full_name:         String,
  pub department:        String,
  pub semester:          i64,
}

impl RawProfile {
  pub const COLUMNS: &'static str =
    "user_id, enrollment_number, full_name, department, semester";

  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      user_id:           row.get(0)?,
      enrollment_number: row.get(1)?,
      full_name:         row.get(2)?,
      department:        row.get(3)?,
      semester:          row.get(4)?,
    })
  }

  pub fn into_profile(self) -> Result<StudentProfile> {
    Ok(StudentProfile {
      user_id:           decode_uuid(&self.user_id)?,
      enrollment_number: self.enrollment_number,
      full_name:         self.full_name,
      department:        self.department,
      semester:          decode_semester(self.semester)?,
    })
  }
}

/// A `subjects` row.
pub struct RawSubject {
  pub subject_id:   String,
  pub subject_code: String,
  pub name:         String,
  pub semester:     i64,
}

impl RawSubject {
  pub const COLUMNS: &'static str = "subject_id, subject_code, name, semester";

  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      subject_id:   row.get(0)?,
      subject_code: row.get(1)?,
      name:         row.get(2)?,
      semester:     row.get(3)?,
    })
  }

  pub fn into_subject(self) -> Result<Subject> {
    Ok(Subject {
      subject_id:   decode_uuid(&self.subject_id)?,
      subject_code: self.subject_code,
      name:         self.name,
      semester:     decode_semester(self.semester)?,
    })
  }
}

/// An `attendance_sessions` row joined with its subject's name.
pub struct RawSession {
  pub session_id:   String,
  pub name:         String,
  pub subject_id:   String,
  pub subject_name: String,
  pub owner_id:     String,
  pub start_time:   String,
  pub end_time:     Option<String>,
  pub state:        String,
}

impl RawSession {
  /// SELECT prefix; callers append a WHERE / ORDER BY clause.
  pub const SELECT: &'static str = "SELECT s.session_id, s.name, s.subject_id, sub.name,
            s.owner_id, s.start_time, s.end_time, s.state
     FROM attendance_sessions s
     JOIN subjects sub ON sub.subject_id = s.subject_id";

  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      session_id:   row.get(0)?,
      name:         row.get(1)?,
      subject_id:   row.get(2)?,
      subject_name: row.get(3)?,
      owner_id:     row.get(4)?,
      start_time:   row.get(5)?,
      end_time:     row.get(6)?,
      state:        row.get(7)?,
    })
  }

  pub fn into_session(self) -> Result<AttendanceSession> {
    Ok(AttendanceSession {
      session_id:   decode_uuid(&self.session_id)?,
      name:         self.name,
      subject_id:   decode_uuid(&self.subject_id)?,
      subject_name: self.subject_name,
      owner_id:     decode_uuid(&self.owner_id)?,
      start_time:   decode_dt(&self.start_time)?,
      end_time:     self.end_time.as_deref().map(decode_dt).transpose()?,
      state:        SessionState::from_str(&self.state)?,
    })
  }
}

/// A `rotating_codes` row.
pub struct RawCode {
  pub code:       String,
  pub session_id: String,
  pub issued_at:  String,
  pub expires_at: String,
}

impl RawCode {
  pub const COLUMNS: &'static str = "code, session_id, issued_at, expires_at";

  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      code:       row.get(0)?,
      session_id: row.get(1)?,
      issued_at:  row.get(2)?,
      expires_at: row.get(3)?,
    })
  }

  pub fn from_code(c: &RotatingCode) -> Self {
    Self {
      code:       c.code.clone(),
      session_id: encode_uuid(c.session_id),
      issued_at:  encode_dt(c.issued_at),
      expires_at: encode_dt(c.expires_at),
    }
  }

  pub fn into_code(self) -> Result<RotatingCode> {
    Ok(RotatingCode {
      session_id: decode_uuid(&self.session_id)?,
      code:       self.code,
      issued_at:  decode_dt(&self.issued_at)?,
      expires_at: decode_dt(&self.expires_at)?,
    })
  }
}

/// An `attendance_records` row joined with the student's profile.
pub struct RawRosterEntry {
  pub student_id:        String,
  pub student_name:      String,
  pub enrollment_number: String,
  pub marked_at:         String,
}

impl RawRosterEntry {
  pub fn into_entry(self) -> Result<RosterEntry> {
    Ok(RosterEntry {
      student_id:        decode_uuid(&self.student_id)?,
      student_name:      self.student_name,
      enrollment_number: self.enrollment_number,
      marked_at:         decode_dt(&self.marked_at)?,
    })
  }
}
