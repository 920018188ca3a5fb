//! The `AttendanceStore` trait.
//!
//! The trait is implemented by storage backends (e.g. `cue-store-sqlite`).
//! Higher layers (`cue-api`, `cue-server`) depend on this abstraction, not on
//! any concrete backend.

use std::future::Future;

use uuid::Uuid;

use crate::{
  code::RotatingCode,
  identity::{NewSubject, NewUser, StudentProfile, Subject, User},
  record::{MarkReceipt, Roster},
  session::{AttendanceSession, EndedSession, NewSession},
};

/// Backend errors must say whether they carry a domain-level failure, so
/// callers can tell "session ended" apart from "disk full".
pub trait StoreError: std::error::Error + Send + Sync + 'static {
  fn domain(&self) -> Option<&crate::Error>;
}

impl StoreError for crate::Error {
  fn domain(&self) -> Option<&crate::Error> { Some(self) }
}

/// Abstraction over a ClassCue storage backend.
///
/// Sessions, codes and records are append-only apart from the single
/// `Active → Ended` transition of a session. All methods return `Send`
/// futures so the trait can be used from axum handlers.
pub trait AttendanceStore: Send + Sync {
  type Error: StoreError;

  // ── Users & profiles ──────────────────────────────────────────────────

  fn add_user(
    &self,
    input: NewUser,
  ) -> impl Future<Output = Result<User, Self::Error>> + Send + '_;

  /// Look a user up by login email (case-insensitive).
  fn find_user_by_email<'a>(
    &'a self,
    email: &'a str,
  ) -> impl Future<Output = Result<Option<User>, Self::Error>> + Send + 'a;

  fn get_user(
    &self,
    user_id: Uuid,
  ) -> impl Future<Output = Result<Option<User>, Self::Error>> + Send + '_;

  /// Attach a student profile to an existing user.
  fn add_student_profile(
    &self,
    profile: StudentProfile,
  ) -> impl Future<Output = Result<StudentProfile, Self::Error>> + Send + '_;

  fn get_student_profile(
    &self,
    user_id: Uuid,
  ) -> impl Future<Output = Result<Option<StudentProfile>, Self::Error>> + Send + '_;

  // ── Subjects ──────────────────────────────────────────────────────────

  fn add_subject(
    &self,
    input: NewSubject,
  ) -> impl Future<Output = Result<Subject, Self::Error>> + Send + '_;

  fn list_subjects(
    &self,
  ) -> impl Future<Output = Result<Vec<Subject>, Self::Error>> + Send + '_;

  fn get_subject(
    &self,
    subject_id: Uuid,
  ) -> impl Future<Output = Result<Option<Subject>, Self::Error>> + Send + '_;

  // ── Sessions ──────────────────────────────────────────────────────────

  /// Create a session in the `Active` state. `start_time` is set by the
  /// store. Fails with `SubjectNotFound` for an unknown subject.
  fn create_session(
    &self,
    input: NewSession,
  ) -> impl Future<Output = Result<AttendanceSession, Self::Error>> + Send + '_;

  fn get_session(
    &self,
    session_id: Uuid,
  ) -> impl Future<Output = Result<Option<AttendanceSession>, Self::Error>> + Send + '_;

  /// All sessions owned by `owner_id`, newest first.
  fn list_sessions_for_owner(
    &self,
    owner_id: Uuid,
  ) -> impl Future<Output = Result<Vec<AttendanceSession>, Self::Error>> + Send + '_;

  /// Transition a session to `Ended`. Fails with `SessionEnded` if it
  /// already has.
  fn end_session(
    &self,
    session_id: Uuid,
  ) -> impl Future<Output = Result<EndedSession, Self::Error>> + Send + '_;

  // ── Codes ─────────────────────────────────────────────────────────────

  /// Return the session's current code, minting a new one if none is
  /// current. Never produces two current codes for one session.
  fn current_code(
    &self,
    session_id: Uuid,
  ) -> impl Future<Output = Result<RotatingCode, Self::Error>> + Send + '_;

  // ── Attendance ────────────────────────────────────────────────────────

  /// Validate `code` for `user_id` and append exactly one record.
  /// Rejections surface as [`crate::Error::Mark`].
  fn mark_attendance(
    &self,
    user_id: Uuid,
    code: String,
  ) -> impl Future<Output = Result<MarkReceipt, Self::Error>> + Send + '_;

  /// Everyone who has checked in, ordered by arrival.
  fn roster(
    &self,
    session_id: Uuid,
  ) -> impl Future<Output = Result<Roster, Self::Error>> + Send + '_;
}
