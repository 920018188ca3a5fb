//! [`SqliteStore`]: the SQLite implementation of [`AttendanceStore`].

use std::{path::Path, sync::Arc};

use chrono::{DateTime, SubsecRound as _, Utc};
use rand_core::OsRng;
use rusqlite::{OptionalExtension as _, TransactionBehavior};
use uuid::Uuid;

use cue_core::{
  clock::{Clock, SystemClock},
  code::RotatingCode,
  identity::{NewSubject, NewUser, StudentProfile, Subject, User},
  mark::{MarkCheck, MarkError},
  record::{AttendanceRecord, MarkReceipt, Roster},
  session::{AttendanceSession, EndedSession, NewSession, SessionState},
  store::AttendanceStore,
};

use crate::{
  Error, Result,
  encode::{
    RawCode, RawProfile, RawRosterEntry, RawSession, RawSubject, RawUser, encode_dt,
    encode_uuid,
  },
  schema::SCHEMA,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A ClassCue attendance store backed by a single SQLite file.
///
/// Cloning is cheap: the inner connection and clock are reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn:  tokio_rusqlite::Connection,
  clock: Arc<dyn Clock>,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn, clock: Arc::new(SystemClock) };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store, for tests.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn, clock: Arc::new(SystemClock) };
    store.init_schema().await?;
    Ok(store)
  }

  /// Replace the clock used for every timestamp and expiry comparison.
  pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
    self.clock = clock;
    self
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Storage keeps microseconds; truncate up front so returned values equal
  /// what a later read decodes.
  fn now(&self) -> DateTime<Utc> { self.clock.now().trunc_subsecs(6) }

  async fn session_or_not_found(&self, session_id: Uuid) -> Result<AttendanceSession> {
    self
      .get_session(session_id)
      .await?
      .ok_or_else(|| cue_core::Error::SessionNotFound(session_id).into())
  }

  async fn count_records(&self, session_id: Uuid) -> Result<u64> {
    let id_str = encode_uuid(session_id);
    let count: i64 = self
      .conn
      .call(move |conn| {
        Ok(conn.query_row(
          "SELECT COUNT(*) FROM attendance_records WHERE session_id = ?1",
          rusqlite::params![id_str],
          |r| r.get(0),
        )?)
      })
      .await?;
    Ok(count.max(0) as u64)
  }
}

// ─── AttendanceStore impl ────────────────────────────────────────────────────

impl AttendanceStore for SqliteStore {
  type Error = Error;

  // ── Users & profiles ──────────────────────────────────────────────────────

  async fn add_user(&self, input: NewUser) -> Result<User> {
    let user = User {
      user_id:       Uuid::new_v4(),
      email:         input.email.trim().to_owned(),
      role:          input.role,
      created_at:    self.now(),
      password_hash: input.password_hash,
    };

    let id_str   = encode_uuid(user.user_id);
    let email    = user.email.clone();
    let role_str = user.role.as_ref().to_owned();
    let hash     = user.password_hash.clone();
    let at_str   = encode_dt(user.created_at);

    let inserted = self
      .conn
      .call(move |conn| {
        let n = conn.execute(
          "INSERT INTO users (user_id, email, role, password_hash, created_at)
           VALUES (?1, ?2, ?3, ?4, ?5)
           ON CONFLICT (email) DO NOTHING",
          rusqlite::params![id_str, email, role_str, hash, at_str],
        )?;
        Ok(n == 1)
      })
      .await?;

    if !inserted {
      return Err(cue_core::Error::DuplicateEmail(user.email).into());
    }
    Ok(user)
  }

  async fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
    let email = email.trim().to_owned();

    let raw: Option<RawUser> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!("SELECT {} FROM users WHERE email = ?1", RawUser::COLUMNS),
              rusqlite::params![email],
              RawUser::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawUser::into_user).transpose()
  }

  async fn get_user(&self, user_id: Uuid) -> Result<Option<User>> {
    let id_str = encode_uuid(user_id);

    let raw: Option<RawUser> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!("SELECT {} FROM users WHERE user_id = ?1", RawUser::COLUMNS),
              rusqlite::params![id_str],
              RawUser::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawUser::into_user).transpose()
  }

  async fn add_student_profile(&self, profile: StudentProfile) -> Result<StudentProfile> {
    if self.get_user(profile.user_id).await?.is_none() {
      return Err(cue_core::Error::UserNotFound(profile.user_id).into());
    }

    let id_str     = encode_uuid(profile.user_id);
    let enrollment = profile.enrollment_number.clone();
    let full_name  = profile.full_name.clone();
    let department = profile.department.clone();
    let semester   = i64::from(profile.semester);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO student_profiles
             (user_id, enrollment_number, full_name, department, semester)
           VALUES (?1, ?2, ?3, ?4, ?5)",
          rusqlite::params![id_str, enrollment, full_name, department, semester],
        )?;
        Ok(())
      })
      .await?;

    Ok(profile)
  }

  async fn get_student_profile(&self, user_id: Uuid) -> Result<Option<StudentProfile>> {
    let id_str = encode_uuid(user_id);

    let raw: Option<RawProfile> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!(
                "SELECT {} FROM student_profiles WHERE user_id = ?1",
                RawProfile::COLUMNS
              ),
              rusqlite::params![id_str],
              RawProfile::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawProfile::into_profile).transpose()
  }

  // ── Subjects ──────────────────────────────────────────────────────────────

  async fn add_subject(&self, input: NewSubject) -> Result<Subject> {
    let subject = Subject {
      subject_id:   Uuid::new_v4(),
      subject_code: input.subject_code,
      name:         input.name,
      semester:     input.semester,
    };

    let id_str   = encode_uuid(subject.subject_id);
    let code     = subject.subject_code.clone();
    let name     = subject.name.clone();
    let semester = i64::from(subject.semester);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO subjects (subject_id, subject_code, name, semester)
           VALUES (?1, ?2, ?3, ?4)",
          rusqlite::params![id_str, code, name, semester],
        )?;
        Ok(())
      })
      .await?;

    Ok(subject)
  }

  async fn list_subjects(&self) -> Result<Vec<Subject>> {
    let raws: Vec<RawSubject> = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {} FROM subjects ORDER BY semester, subject_code",
          RawSubject::COLUMNS
        ))?;
        let rows = stmt
          .query_map([], RawSubject::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawSubject::into_subject).collect()
  }

  async fn get_subject(&self, subject_id: Uuid) -> Result<Option<Subject>> {
    let id_str = encode_uuid(subject_id);

    let raw: Option<RawSubject> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!("SELECT {} FROM subjects WHERE subject_id = ?1", RawSubject::COLUMNS),
              rusqlite::params![id_str],
              RawSubject::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawSubject::into_subject).transpose()
  }

  // ── Sessions ──────────────────────────────────────────────────────────────

  async fn create_session(&self, input: NewSession) -> Result<AttendanceSession> {
    let subject = self
      .get_subject(input.subject_id)
      .await?
      .ok_or(cue_core::Error::SubjectNotFound(input.subject_id))?;

    let session = AttendanceSession {
      session_id:   Uuid::new_v4(),
      name:         input.name,
      subject_id:   subject.subject_id,
      subject_name: subject.name,
      owner_id:     input.owner_id,
      start_time:   self.now(),
      end_time:     None,
      state:        SessionState::Active,
    };

    let id_str      = encode_uuid(session.session_id);
    let name        = session.name.clone();
    let subject_str = encode_uuid(session.subject_id);
    let owner_str   = encode_uuid(session.owner_id);
    let start_str   = encode_dt(session.start_time);
    let first_code  =
      RawCode::from_code(&RotatingCode::issue(session.session_id, session.start_time, &mut OsRng));

    // The session and its first code appear together.
    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        tx.execute(
          "INSERT INTO attendance_sessions
             (session_id, name, subject_id, owner_id, start_time, state)
           VALUES (?1, ?2, ?3, ?4, ?5, 'active')",
          rusqlite::params![id_str, name, subject_str, owner_str, start_str],
        )?;
        insert_code(&tx, &first_code)?;
        tx.commit()?;
        Ok(())
      })
      .await?;

    tracing::debug!(session_id = %session.session_id, "attendance session created");
    Ok(session)
  }

  async fn get_session(&self, session_id: Uuid) -> Result<Option<AttendanceSession>> {
    let id_str = encode_uuid(session_id);

    let raw: Option<RawSession> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!("{} WHERE s.session_id = ?1", RawSession::SELECT),
              rusqlite::params![id_str],
              RawSession::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawSession::into_session).transpose()
  }

  async fn list_sessions_for_owner(&self, owner_id: Uuid) -> Result<Vec<AttendanceSession>> {
    let owner_str = encode_uuid(owner_id);

    let raws: Vec<RawSession> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "{} WHERE s.owner_id = ?1 ORDER BY s.start_time DESC, s.rowid DESC",
          RawSession::SELECT
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![owner_str], RawSession::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawSession::into_session).collect()
  }

  async fn end_session(&self, session_id: Uuid) -> Result<EndedSession> {
    let mut session = self.session_or_not_found(session_id).await?;
    let end_time = self.now();
    // Validates the transition before touching the database.
    session.end(end_time)?;

    let id_str  = encode_uuid(session_id);
    let end_str = encode_dt(end_time);

    let changed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE attendance_sessions SET state = 'ended', end_time = ?2
           WHERE session_id = ?1 AND state = 'active'",
          rusqlite::params![id_str, end_str],
        )?)
      })
      .await?;

    // Lost a race with a concurrent end.
    if changed == 0 {
      return Err(cue_core::Error::SessionEnded(session_id).into());
    }

    let total_count = self.count_records(session_id).await?;
    tracing::info!(%session_id, total_count, "attendance session ended");
    Ok(EndedSession { session, total_count })
  }

  // ── Codes ─────────────────────────────────────────────────────────────────

  async fn current_code(&self, session_id: Uuid) -> Result<RotatingCode> {
    let now       = self.now();
    let candidate = RawCode::from_code(&RotatingCode::issue(session_id, now, &mut OsRng));
    let id_str    = encode_uuid(session_id);
    let now_str   = encode_dt(now);

    // Lookup and mint run in one immediate transaction so two concurrent
    // callers can never both mint.
    let outcome: Option<(String, RawCode)> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let state: Option<String> = tx
          .query_row(
            "SELECT state FROM attendance_sessions WHERE session_id = ?1",
            rusqlite::params![id_str],
            |r| r.get(0),
          )
          .optional()?;
        let Some(state) = state else {
          return Ok(None);
        };
        if state != SessionState::Active.as_ref() {
          return Ok(Some((state, candidate)));
        }

        let latest: Option<RawCode> = tx
          .query_row(
            &format!(
              "SELECT {} FROM rotating_codes
               WHERE session_id = ?1 AND expires_at > ?2
               ORDER BY issued_at DESC LIMIT 1",
              RawCode::COLUMNS
            ),
            rusqlite::params![id_str, now_str],
            RawCode::from_row,
          )
          .optional()?;

        let code = match latest {
          Some(existing) => existing,
          None => {
            insert_code(&tx, &candidate)?;
            candidate
          }
        };
        tx.commit()?;
        Ok(Some((state, code)))
      })
      .await?;

    let (state, raw) = outcome.ok_or(cue_core::Error::SessionNotFound(session_id))?;
    if state != SessionState::Active.as_ref() {
      return Err(cue_core::Error::SessionEnded(session_id).into());
    }
    raw.into_code()
  }

  // ── Attendance ────────────────────────────────────────────────────────────

  async fn mark_attendance(&self, user_id: Uuid, code: String) -> Result<MarkReceipt> {
    let now         = self.now();
    let user_str    = encode_uuid(user_id);
    let code_lookup = code.trim().to_owned();

    // Gather every fact the rules need in one round trip.
    let (raw_code, raw_session, raw_profile, already_marked) = self
      .conn
      .call(move |conn| {
        let raw_code: Option<RawCode> = conn
          .query_row(
            &format!("SELECT {} FROM rotating_codes WHERE code = ?1", RawCode::COLUMNS),
            rusqlite::params![code_lookup],
            RawCode::from_row,
          )
          .optional()?;

        let raw_session: Option<RawSession> = match &raw_code {
          Some(c) => conn
            .query_row(
              &format!("{} WHERE s.session_id = ?1", RawSession::SELECT),
              rusqlite::params![c.session_id],
              RawSession::from_row,
            )
            .optional()?,
          None => None,
        };

        let raw_profile: Option<RawProfile> = conn
          .query_row(
            &format!(
              "SELECT {} FROM student_profiles WHERE user_id = ?1",
              RawProfile::COLUMNS
            ),
            rusqlite::params![user_str],
            RawProfile::from_row,
          )
          .optional()?;

        let already_marked = match &raw_code {
          Some(c) => conn
            .query_row(
              "SELECT 1 FROM attendance_records WHERE session_id = ?1 AND student_id = ?2",
              rusqlite::params![c.session_id, user_str],
              |_| Ok(true),
            )
            .optional()?
            .unwrap_or(false),
          None => false,
        };

        Ok((raw_code, raw_session, raw_profile, already_marked))
      })
      .await?;

    let issued  = raw_code.map(RawCode::into_code).transpose()?;
    let session = raw_session.map(RawSession::into_session).transpose()?;
    let profile = raw_profile.map(RawProfile::into_profile).transpose()?;

    MarkCheck {
      code: issued.as_ref(),
      session_state: session.as_ref().map_or(SessionState::Ended, |s| s.state),
      now,
      profile: profile.as_ref(),
      already_marked,
    }
    .evaluate()?;

    let (Some(issued), Some(session)) = (issued, session) else {
      return Err(MarkError::InvalidCode.into());
    };

    let record = AttendanceRecord {
      session_id: session.session_id,
      student_id: user_id,
      marked_at:  now,
    };
    let row       = record.clone();
    let code_used = issued.code;

    // The UNIQUE (session_id, student_id) constraint settles concurrent
    // scans by the same student.
    let inserted = self
      .conn
      .call(move |conn| Ok(insert_record(conn, &row, &code_used)?))
      .await?;

    if !inserted {
      return Err(MarkError::AlreadyMarked.into());
    }

    tracing::debug!(session_id = %session.session_id, student_id = %user_id, "attendance marked");
    Ok(MarkReceipt::for_record(&record, &session))
  }

  async fn roster(&self, session_id: Uuid) -> Result<Roster> {
    self.session_or_not_found(session_id).await?;
    let id_str = encode_uuid(session_id);

    let raws: Vec<RawRosterEntry> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT r.student_id, p.full_name, p.enrollment_number, r.marked_at
           FROM attendance_records r
           JOIN student_profiles p ON p.user_id = r.student_id
           WHERE r.session_id = ?1
           ORDER BY r.marked_at, r.rowid",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![id_str], |row| {
            Ok(RawRosterEntry {
              student_id:        row.get(0)?,
              student_name:      row.get(1)?,
              enrollment_number: row.get(2)?,
              marked_at:         row.get(3)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    let records = raws
      .into_iter()
      .map(RawRosterEntry::into_entry)
      .collect::<Result<Vec<_>>>()?;

    Ok(Roster { total_count: records.len() as u64, records })
  }
}

// ─── Row writers ─────────────────────────────────────────────────────────────

fn insert_code(conn: &rusqlite::Connection, code: &RawCode) -> rusqlite::Result<()> {
  conn.execute(
    "INSERT INTO rotating_codes (code, session_id, issued_at, expires_at)
     VALUES (?1, ?2, ?3, ?4)",
    rusqlite::params![code.code, code.session_id, code.issued_at, code.expires_at],
  )?;
  Ok(())
}

/// Insert one attendance record. Returns `false` when the student already
/// has a record for the session; any other constraint failure is an error.
pub(crate) fn insert_record(
  conn: &rusqlite::Connection,
  record: &AttendanceRecord,
  code_used: &str,
) -> rusqlite::Result<bool> {
  let outcome = conn.execute(
    "INSERT INTO attendance_records (session_id, student_id, code_used, marked_at)
     VALUES (?1, ?2, ?3, ?4)",
    rusqlite::params![
      encode_uuid(record.session_id),
      encode_uuid(record.student_id),
      code_used,
      encode_dt(record.marked_at),
    ],
  );
  match outcome {
    Ok(_) => Ok(true),
    Err(rusqlite::Error::SqliteFailure(e, _))
      if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE =>
    {
      Ok(false)
    }
    Err(e) => Err(e),
  }
}
