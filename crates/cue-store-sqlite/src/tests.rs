//! Integration tests for `SqliteStore` against an in-memory database.

use std::sync::Arc;

use chrono::{Duration, TimeZone, Utc};
use cue_core::{
  clock::{Clock as _, ManualClock},
  identity::{NewSubject, NewUser, Role, StudentProfile, Subject, User},
  mark::MarkError,
  record::AttendanceRecord,
  session::{NewSession, SessionState},
  store::AttendanceStore,
};
use uuid::Uuid;

use crate::{Error, SqliteStore};

struct Fixture {
  store:   SqliteStore,
  clock:   ManualClock,
  teacher: User,
  subject: Subject,
}

async fn fixture() -> Fixture {
  let clock = ManualClock::new(Utc.with_ymd_and_hms(2025, 3, 3, 9, 0, 0).unwrap());
  let store = SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
    .with_clock(Arc::new(clock.clone()));

  let teacher = store
    .add_user(NewUser {
      email:         "prof@example.edu".into(),
      role:          Role::Teacher,
      password_hash: "x".into(),
    })
    .await
    .unwrap();

  let subject = store
    .add_subject(NewSubject {
      subject_code: "CS201".into(),
      name:         "Data Structures".into(),
      semester:     3,
    })
    .await
    .unwrap();

  Fixture { store, clock, teacher, subject }
}

async fn student(store: &SqliteStore, n: u32, with_profile: bool) -> User {
  let user = store
    .add_user(NewUser {
      email:         format!("student{n}@example.edu"),
      role:          Role::Student,
      password_hash: "x".into(),
    })
    .await
    .unwrap();
  if with_profile {
    store
      .add_student_profile(StudentProfile {
        user_id:           user.user_id,
        enrollment_number: format!("EN{n:04}"),
        full_name:         format!("Student {n}"),
        department:        "CS".into(),
        semester:          3,
      })
      .await
      .unwrap();
  }
  user
}

fn mark_err(e: Error) -> Option<MarkError> {
  match e {
    Error::Core(cue_core::Error::Mark(m)) => Some(m),
    _ => None,
  }
}

impl Fixture {
  async fn start(&self, name: &str) -> Uuid {
    let input = NewSession::new(name, self.subject.subject_id, self.teacher.user_id).unwrap();
    self.store.create_session(input).await.unwrap().session_id
  }
}

// ─── Users & subjects ────────────────────────────────────────────────────────

#[tokio::test]
async fn users_are_found_by_email_case_insensitively() {
  let f = fixture().await;
  let found = f.store.find_user_by_email("PROF@example.edu").await.unwrap();
  assert_eq!(found.map(|u| u.user_id), Some(f.teacher.user_id));
  assert!(f.store.find_user_by_email("nobody@example.edu").await.unwrap().is_none());
}

#[tokio::test]
async fn duplicate_email_is_rejected() {
  let f = fixture().await;
  let again = f
    .store
    .add_user(NewUser {
      email:         "prof@example.edu".into(),
      role:          Role::Admin,
      password_hash: "y".into(),
    })
    .await;
  assert!(matches!(again, Err(Error::Core(cue_core::Error::DuplicateEmail(_)))));
}

#[tokio::test]
async fn profile_for_unknown_user_is_rejected() {
  let f = fixture().await;
  let result = f
    .store
    .add_student_profile(StudentProfile {
      user_id:           Uuid::new_v4(),
      enrollment_number: "EN9999".into(),
      full_name:         "Ghost".into(),
      department:        "CS".into(),
      semester:          1,
    })
    .await;
  assert!(matches!(result, Err(Error::Core(cue_core::Error::UserNotFound(_)))));
}

#[tokio::test]
async fn subjects_are_listed() {
  let f = fixture().await;
  let subjects = f.store.list_subjects().await.unwrap();
  assert_eq!(subjects, vec![f.subject.clone()]);
}

// ─── Sessions ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn session_starts_active_with_server_start_time() {
  let f = fixture().await;
  let id = f.start("Lecture 1").await;
  let s = f.store.get_session(id).await.unwrap().unwrap();
  assert_eq!(s.state, SessionState::Active);
  assert_eq!(s.start_time, f.clock.now());
  assert_eq!(s.subject_name, "Data Structures");
  assert!(s.end_time.is_none());
}

#[tokio::test]
async fn session_for_unknown_subject_fails() {
  let f = fixture().await;
  let input = NewSession::new("Lecture", Uuid::new_v4(), f.teacher.user_id).unwrap();
  let result = f.store.create_session(input).await;
  assert!(matches!(result, Err(Error::Core(cue_core::Error::SubjectNotFound(_)))));
}

#[tokio::test]
async fn sessions_for_owner_newest_first() {
  let f = fixture().await;
  let first = f.start("Lecture 1").await;
  f.clock.advance(Duration::hours(1));
  let second = f.start("Lecture 2").await;

  let listed: Vec<_> = f
    .store
    .list_sessions_for_owner(f.teacher.user_id)
    .await
    .unwrap()
    .into_iter()
    .map(|s| s.session_id)
    .collect();
  assert_eq!(listed, vec![second, first]);
}

#[tokio::test]
async fn ending_sets_end_time_once_and_reports_count() {
  let f = fixture().await;
  let id = f.start("Lecture 1").await;
  let s1 = student(&f.store, 1, true).await;

  let code = f.store.current_code(id).await.unwrap();
  f.store.mark_attendance(s1.user_id, code.code).await.unwrap();

  f.clock.advance(Duration::milliseconds(125_900));
  let ended = f.store.end_session(id).await.unwrap();
  assert_eq!(ended.total_count, 1);
  assert_eq!(ended.session.state, SessionState::Ended);
  let duration = cue_core::session::session_duration_secs(
    ended.session.start_time,
    ended.session.end_time.unwrap(),
  );
  assert_eq!(duration, 125);

  let again = f.store.end_session(id).await;
  assert!(matches!(again, Err(Error::Core(cue_core::Error::SessionEnded(_)))));

  let stored = f.store.get_session(id).await.unwrap().unwrap();
  assert_eq!(stored.end_time, ended.session.end_time);
}

// ─── Codes ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn code_is_stable_within_its_period_and_rotates_at_expiry() {
  let f = fixture().await;
  let id = f.start("Lecture 1").await;

  let c1 = f.store.current_code(id).await.unwrap();
  assert_eq!(c1.expires_at - c1.issued_at, Duration::seconds(10));

  f.clock.advance(Duration::milliseconds(9_999));
  let same = f.store.current_code(id).await.unwrap();
  assert_eq!(same, c1);

  f.clock.advance(Duration::milliseconds(1));
  let c2 = f.store.current_code(id).await.unwrap();
  assert_ne!(c2.code, c1.code);
  assert_eq!(c2.issued_at, c1.expires_at);
}

#[tokio::test]
async fn first_code_is_minted_with_the_session() {
  let f = fixture().await;
  let id = f.start("Lecture 1").await;
  let started = f.store.get_session(id).await.unwrap().unwrap().start_time;

  f.clock.advance(Duration::seconds(3));
  let code = f.store.current_code(id).await.unwrap();
  assert_eq!(code.issued_at, started);
  assert_eq!(code.expires_at, started + Duration::seconds(10));
}

#[tokio::test]
async fn concurrent_fetches_never_mint_two_current_codes() {
  let f = fixture().await;
  let id = f.start("Lecture 1").await;

  let mut handles = Vec::new();
  for _ in 0..8 {
    let store = f.store.clone();
    handles.push(tokio::spawn(async move { store.current_code(id).await.unwrap() }));
  }
  let mut codes = Vec::new();
  for h in handles {
    codes.push(h.await.unwrap().code);
  }
  codes.dedup();
  assert_eq!(codes.len(), 1, "{codes:?}");
}

#[tokio::test]
async fn code_for_ended_or_unknown_session_fails() {
  let f = fixture().await;
  let id = f.start("Lecture 1").await;
  f.store.end_session(id).await.unwrap();

  let ended = f.store.current_code(id).await;
  assert!(matches!(ended, Err(Error::Core(cue_core::Error::SessionEnded(_)))));

  let unknown = f.store.current_code(Uuid::new_v4()).await;
  assert!(matches!(unknown, Err(Error::Core(cue_core::Error::SessionNotFound(_)))));
}

// ─── Marking ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn expired_code_is_rejected_and_fresh_code_marks_once() {
  let f = fixture().await;
  let id = f.start("Lecture 1").await;
  let s1 = student(&f.store, 1, true).await;

  // t=0: C1 valid until t=10.
  let c1 = f.store.current_code(id).await.unwrap();

  // t=10: rotation boundary, C2 valid until t=20.
  f.clock.advance(Duration::seconds(10));
  let c2 = f.store.current_code(id).await.unwrap();
  assert_ne!(c1.code, c2.code);

  // t=11: scanning C1 is too late.
  f.clock.advance(Duration::seconds(1));
  let late = f.store.mark_attendance(s1.user_id, c1.code.clone()).await;
  assert_eq!(late.map_err(mark_err).err(), Some(Some(MarkError::ExpiredCode)));

  // t=12: first scan of C2 succeeds.
  f.clock.advance(Duration::seconds(1));
  let receipt = f.store.mark_attendance(s1.user_id, c2.code.clone()).await.unwrap();
  assert_eq!(receipt.session_id, id);
  assert_eq!(receipt.session_name, "Lecture 1");

  // t=13: second scan of C2 is a duplicate.
  f.clock.advance(Duration::seconds(1));
  let dup = f.store.mark_attendance(s1.user_id, c2.code).await;
  assert_eq!(dup.map_err(mark_err).err(), Some(Some(MarkError::AlreadyMarked)));
}

#[tokio::test]
async fn unknown_code_is_invalid() {
  let f = fixture().await;
  f.start("Lecture 1").await;
  let s1 = student(&f.store, 1, true).await;
  let result = f.store.mark_attendance(s1.user_id, "not-a-code".into()).await;
  assert_eq!(result.map_err(mark_err).err(), Some(Some(MarkError::InvalidCode)));
}

#[tokio::test]
async fn student_without_profile_is_rejected() {
  let f = fixture().await;
  let id = f.start("Lecture 1").await;
  let s1 = student(&f.store, 1, false).await;
  let code = f.store.current_code(id).await.unwrap();
  let result = f.store.mark_attendance(s1.user_id, code.code).await;
  assert_eq!(result.map_err(mark_err).err(), Some(Some(MarkError::ProfileNotFound)));
}

#[tokio::test]
async fn code_from_ended_session_reads_as_expired() {
  let f = fixture().await;
  let id = f.start("Lecture 1").await;
  let s1 = student(&f.store, 1, true).await;
  let code = f.store.current_code(id).await.unwrap();
  f.store.end_session(id).await.unwrap();

  let result = f.store.mark_attendance(s1.user_id, code.code).await;
  assert_eq!(result.map_err(mark_err).err(), Some(Some(MarkError::ExpiredCode)));
}

#[tokio::test]
async fn concurrent_scans_by_one_student_record_once() {
  let f = fixture().await;
  let id = f.start("Lecture 1").await;
  let s1 = student(&f.store, 1, true).await;
  let code = f.store.current_code(id).await.unwrap();

  let user_id = s1.user_id;
  let mut handles = Vec::new();
  for _ in 0..6 {
    let store = f.store.clone();
    let code = code.code.clone();
    handles.push(tokio::spawn(async move { store.mark_attendance(user_id, code).await }));
  }

  let mut ok = 0;
  for h in handles {
    match h.await.unwrap() {
      Ok(_) => ok += 1,
      Err(e) => assert_eq!(mark_err(e), Some(MarkError::AlreadyMarked)),
    }
  }
  assert_eq!(ok, 1);
  assert_eq!(f.store.roster(id).await.unwrap().total_count, 1);
}

#[tokio::test]
async fn many_students_share_one_code() {
  let f = fixture().await;
  let id = f.start("Lecture 1").await;
  let code = f.store.current_code(id).await.unwrap();

  for n in 1..=3 {
    let s = student(&f.store, n, true).await;
    f.clock.advance(Duration::milliseconds(500));
    f.store.mark_attendance(s.user_id, code.code.clone()).await.unwrap();
  }

  let roster = f.store.roster(id).await.unwrap();
  assert_eq!(roster.total_count, 3);
  let names: Vec<_> = roster.records.iter().map(|r| r.student_name.as_str()).collect();
  assert_eq!(names, ["Student 1", "Student 2", "Student 3"]);
}

#[tokio::test]
async fn roster_for_unknown_session_fails() {
  let f = fixture().await;
  let result = f.store.roster(Uuid::new_v4()).await;
  assert!(matches!(result, Err(Error::Core(cue_core::Error::SessionNotFound(_)))));
}

#[test]
fn only_the_uniqueness_constraint_reads_as_already_marked() {
  let conn = rusqlite::Connection::open_in_memory().unwrap();
  conn.execute_batch(crate::schema::SCHEMA).unwrap();

  // No such session, student or code: a foreign-key failure, not a duplicate.
  let orphan = AttendanceRecord {
    session_id: Uuid::new_v4(),
    student_id: Uuid::new_v4(),
    marked_at:  Utc.with_ymd_and_hms(2025, 3, 3, 9, 0, 5).unwrap(),
  };
  let err = crate::store::insert_record(&conn, &orphan, "nope").unwrap_err();
  let rusqlite::Error::SqliteFailure(e, _) = err else {
    panic!("unexpected error: {err}");
  };
  assert_eq!(e.extended_code, rusqlite::ffi::SQLITE_CONSTRAINT_FOREIGNKEY);
}
