//! SQL schema for the ClassCue SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS users (
    user_id       TEXT PRIMARY KEY,
    email         TEXT NOT NULL UNIQUE COLLATE NOCASE,
    role          TEXT NOT NULL,   -- 'student' | 'teacher' | 'admin'
    password_hash TEXT NOT NULL,
    created_at    TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS student_profiles (
    user_id           TEXT PRIMARY KEY REFERENCES users(user_id),
    enrollment_number TEXT NOT NULL UNIQUE,
    full_name         TEXT NOT NULL,
    department        TEXT NOT NULL,
    semester          INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS subjects (
    subject_id   TEXT PRIMARY KEY,
    subject_code TEXT NOT NULL UNIQUE,
    name         TEXT NOT NULL,
    semester     INTEGER NOT NULL
);

-- The only UPDATE ever issued is the single active -> ended transition.
CREATE TABLE IF NOT EXISTS attendance_sessions (
    session_id TEXT PRIMARY KEY,
    name       TEXT NOT NULL,
    subject_id TEXT NOT NULL REFERENCES subjects(subject_id),
    owner_id   TEXT NOT NULL REFERENCES users(user_id),
    start_time TEXT NOT NULL,   -- RFC 3339 UTC, fixed width; server-assigned
    end_time   TEXT,
    state      TEXT NOT NULL DEFAULT 'active',
    CHECK ((state = 'active') = (end_time IS NULL))
);

-- Codes are append-only; a newer row supersedes an expired one.
CREATE TABLE IF NOT EXISTS rotating_codes (
    code       TEXT PRIMARY KEY,
    session_id TEXT NOT NULL REFERENCES attendance_sessions(session_id),
    issued_at  TEXT NOT NULL,
    expires_at TEXT NOT NULL
);

-- Append-only; the composite key is the only concurrency guard for marking.
CREATE TABLE IF NOT EXISTS attendance_records (
    session_id TEXT NOT NULL REFERENCES attendance_sessions(session_id),
    student_id TEXT NOT NULL REFERENCES users(user_id),
    code_used  TEXT NOT NULL REFERENCES rotating_codes(code),
    marked_at  TEXT NOT NULL,
    UNIQUE (session_id, student_id)
);

CREATE INDEX IF NOT EXISTS codes_session_idx    ON rotating_codes(session_id, issued_at);
CREATE INDEX IF NOT EXISTS records_session_idx  ON attendance_records(session_id, marked_at);
CREATE INDEX IF NOT EXISTS sessions_owner_idx   ON attendance_sessions(owner_id, start_time);

PRAGMA user_version = 1;
";
