//! Users, roles, student profiles, and the subject catalogue.
//!
//! Authentication identity (a [`User`]) is distinct from the student profile
//! it may own. A student account without a profile can log in but cannot be
//! credited with attendance.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use uuid::Uuid;

/// What an authenticated user is allowed to do.
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
pub enum Role {
  Student,
  Teacher,
  Admin,
}

impl Role {
  /// Teachers and admins may run attendance sessions.
  pub fn can_run_sessions(self) -> bool {
    matches!(self, Self::Teacher | Self::Admin)
  }
}

/// An account that can authenticate against the API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
  pub user_id:       Uuid,
  pub email:         String,
  pub role:          Role,
  pub created_at:    DateTime<Utc>,
  /// argon2 PHC string. Never leaves the server.
  #[serde(skip)]
  pub password_hash: String,
}

impl User {
  /// Whether this user may manage `owner_id`'s sessions.
  pub fn may_manage(&self, owner_id: Uuid) -> bool {
    self.user_id == owner_id || self.role == Role::Admin
  }
}

/// Input to [`crate::store::AttendanceStore::add_user`].
#[derive(Debug, Clone)]
pub struct NewUser {
  pub email:         String,
  pub role:          Role,
  pub password_hash: String,
}

/// The academic identity attached to a student account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudentProfile {
  pub user_id:           Uuid,
  pub enrollment_number: String,
  pub full_name:         String,
  pub department:        String,
  pub semester:          u8,
}

/// A course offering that sessions are held for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subject {
  pub subject_id:   Uuid,
  pub subject_code: String,
  pub name:         String,
  pub semester:     u8,
}

/// Input to [`crate::store::AttendanceStore::add_subject`].
#[derive(Debug, Clone)]
pub struct NewSubject {
  pub subject_code: String,
  pub name:         String,
  pub semester:     u8,
}

/// What `GET /profile` returns: the account plus its student profile, if any.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
  pub user:            User,
  pub student_profile: Option<StudentProfile>,
}
