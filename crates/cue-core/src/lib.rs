//! Core types and trait definitions for the ClassCue attendance system.
//!
//! This crate is deliberately free of HTTP and database dependencies. It holds
//! the session / rotating-code / attendance-record model, the protocol
//! constants shared by server and client, the mark-attendance validation
//! rules, and the [`store::AttendanceStore`] abstraction.

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod clock;
pub mod code;
pub mod error;
pub mod identity;
pub mod mark;
pub mod record;
pub mod session;
pub mod store;

use std::time::Duration;

pub use error::{Error, Result};

// ─── Protocol constants ──────────────────────────────────────────────────────

/// Validity window of every issued code.
pub const ROTATION_PERIOD: Duration = Duration::from_secs(10);

/// Cadence of the faculty-side roster poll.
pub const POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Cadence of the purely cosmetic local countdown.
pub const COUNTDOWN_TICK: Duration = Duration::from_secs(1);

/// How many trailing roster entries the "recent" display shows.
pub const RECENT_LIMIT: usize = 5;
