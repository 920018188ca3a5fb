//! Test doubles: an in-memory API that counts calls, and a clock that
//! follows tokio's (pausable) time.

use std::sync::{
  Mutex,
  atomic::{AtomicUsize, Ordering},
};

use chrono::{DateTime, Duration, TimeZone, Utc};
use cue_core::{
  clock::Clock,
  code::CodeView,
  identity::{Profile, Role, Subject, User},
  mark::MarkError,
  record::{MarkReceipt, Roster, RosterEntry},
  session::{AttendanceSession, EndedSession, SessionState},
};
use tokio::time::Instant;
use uuid::Uuid;

use crate::{api::AttendanceApi, error::ClientError};

/// Wall-clock time anchored at a fixed instant and advanced by tokio time.
#[derive(Debug, Clone)]
pub struct TokioClock {
  origin: DateTime<Utc>,
  base:   Instant,
}

impl TokioClock {
  pub fn new() -> Self {
    Self {
      origin: Utc.with_ymd_and_hms(2025, 3, 3, 9, 0, 0).unwrap(),
      base:   Instant::now(),
    }
  }
}

impl Clock for TokioClock {
  fn now(&self) -> DateTime<Utc> {
    self.origin + Duration::from_std(self.base.elapsed()).unwrap()
  }
}

fn unavailable() -> ClientError {
  ClientError::Server { status: 503, code: "internal".into(), message: "unavailable".into() }
}

/// Hands out one code per ten-second window of [`TokioClock`] time, like
/// the real issuer, and a roster whose size is the poll number.
pub struct FakeApi {
  pub clock:        TokioClock,
  pub subject_id:   Uuid,
  pub create_calls: AtomicUsize,
  pub code_calls:   AtomicUsize,
  pub poll_calls:   AtomicUsize,
  pub end_calls:    AtomicUsize,
  pub marked:       Mutex<Vec<String>>,
  fail_create:      bool,
  fail_end:         bool,
  ended_elsewhere:  bool,
  fail_first_poll:  bool,
  codes_ok:         usize,
  reject_marks:     Option<MarkError>,
  session:          Mutex<Option<AttendanceSession>>,
}

impl FakeApi {
  pub const FINAL_COUNT: u64 = 7;

  pub fn new() -> Self {
    Self {
      clock:           TokioClock::new(),
      subject_id:      Uuid::new_v4(),
      create_calls:    AtomicUsize::new(0),
      code_calls:      AtomicUsize::new(0),
      poll_calls:      AtomicUsize::new(0),
      end_calls:       AtomicUsize::new(0),
      marked:          Mutex::new(Vec::new()),
      fail_create:     false,
      fail_end:        false,
      ended_elsewhere: false,
      fail_first_poll: false,
      codes_ok:        usize::MAX,
      reject_marks:    None,
      session:         Mutex::new(None),
    }
  }

  pub fn failing_create(mut self) -> Self {
    self.fail_create = true;
    self
  }

  pub fn failing_end(mut self) -> Self {
    self.fail_end = true;
    self
  }

  /// `end_session` answers 409 `session_ended`, as if an earlier end had
  /// already gone through.
  pub fn already_ended(mut self) -> Self {
    self.ended_elsewhere = true;
    self
  }

  pub fn failing_first_poll(mut self) -> Self {
    self.fail_first_poll = true;
    self
  }

  /// Only the first `n` code requests succeed.
  pub fn failing_codes_after(mut self, n: usize) -> Self {
    self.codes_ok = n;
    self
  }

  pub fn rejecting_marks(mut self, reason: MarkError) -> Self {
    self.reject_marks = Some(reason);
    self
  }
}

impl AttendanceApi for FakeApi {
  async fn create_session(
    &self,
    name: &str,
    subject_id: Uuid,
  ) -> Result<AttendanceSession, ClientError> {
    self.create_calls.fetch_add(1, Ordering::SeqCst);
    if self.fail_create {
      return Err(unavailable());
    }
    let session = AttendanceSession {
      session_id: Uuid::new_v4(),
      name: name.to_owned(),
      subject_id,
      subject_name: "Data Structures".into(),
      owner_id: Uuid::new_v4(),
      start_time: self.clock.now(),
      end_time: None,
      state: SessionState::Active,
    };
    *self.session.lock().unwrap() = Some(session.clone());
    Ok(session)
  }

  async fn current_code(&self, _session_id: Uuid) -> Result<CodeView, ClientError> {
    let n = self.code_calls.fetch_add(1, Ordering::SeqCst);
    if n >= self.codes_ok {
      return Err(unavailable());
    }
    let elapsed = self.clock.now() - self.clock.origin;
    let window  = elapsed.num_seconds() / 10;
    let issued  = self.clock.origin + Duration::seconds(window * 10);
    Ok(CodeView {
      code:       format!("C{}", window + 1),
      code_image: None,
      issued_at:  issued,
      expires_at: issued + Duration::seconds(10),
    })
  }

  async fn attendance(&self, _session_id: Uuid) -> Result<Roster, ClientError> {
    let n = self.poll_calls.fetch_add(1, Ordering::SeqCst) + 1;
    if n == 1 && self.fail_first_poll {
      return Err(unavailable());
    }
    let records = (0..n)
      .map(|i| RosterEntry {
        student_id:        Uuid::new_v4(),
        student_name:      format!("Student {i}"),
        enrollment_number: format!("EN{i:04}"),
        marked_at:         self.clock.now(),
      })
      .collect();
    Ok(Roster { total_count: n as u64, records })
  }

  async fn end_session(&self, _session_id: Uuid) -> Result<EndedSession, ClientError> {
    self.end_calls.fetch_add(1, Ordering::SeqCst);
    if self.fail_end {
      return Err(unavailable());
    }
    if self.ended_elsewhere {
      return Err(ClientError::Server {
        status:  409,
        code:    "session_ended".into(),
        message: "session has already ended".into(),
      });
    }
    let mut session = self.session.lock().unwrap().clone().unwrap();
    session.end(self.clock.now()).unwrap();
    Ok(EndedSession { session, total_count: Self::FINAL_COUNT })
  }

  async fn mark_attendance(&self, code: &str) -> Result<MarkReceipt, ClientError> {
    self.marked.lock().unwrap().push(code.to_owned());
    if let Some(reason) = self.reject_marks {
      return Err(ClientError::Rejected(reason));
    }
    Ok(MarkReceipt {
      session_id:   Uuid::nil(),
      session_name: "Lecture 1".into(),
      subject_name: "Data Structures".into(),
      marked_at:    self.clock.now(),
    })
  }

  async fn list_subjects(&self) -> Result<Vec<Subject>, ClientError> {
    Ok(vec![Subject {
      subject_id:   self.subject_id,
      subject_code: "CS201".into(),
      name:         "Data Structures".into(),
      semester:     3,
    }])
  }

  async fn profile(&self) -> Result<Profile, ClientError> {
    Ok(Profile {
      user: User {
        user_id:       Uuid::new_v4(),
        email:         "ada@example.edu".into(),
        role:          Role::Student,
        created_at:    self.clock.now(),
        password_hash: String::new(),
      },
      student_profile: None,
    })
  }
}
