//! Attendance poller: re-fetch the roster every poll interval and replace
//! the displayed one wholesale.
//!
//! Polls are awaited inline, so a slow response delays the next tick instead
//! of overlapping it, and responses always apply in the order they were
//! requested. Failures are logged and the next tick simply tries again.

use std::sync::Arc;

use cue_core::POLL_INTERVAL;
use tokio::time::Instant;
use uuid::Uuid;

use crate::{api::AttendanceApi, rotation, view::ViewHandle};

/// Run the poller until the session's token is cancelled. The first poll
/// happens one interval after start.
pub async fn run<A>(api: Arc<A>, session_id: Uuid, view: ViewHandle)
where
  A: AttendanceApi,
{
  let cancel    = view.cancel_token().clone();
  let mut ticks = rotation::ticker(Instant::now() + POLL_INTERVAL, POLL_INTERVAL);

  loop {
    tokio::select! {
      _ = cancel.cancelled() => break,
      _ = ticks.tick() => {}
    }

    let fetched = tokio::select! {
      _ = cancel.cancelled() => break,
      fetched = api.attendance(session_id) => fetched,
    };

    match fetched {
      Ok(roster) => {
        view.update(|v| {
          let changed = v.roster != roster;
          v.roster = roster;
          changed
        });
      }
      Err(e) => tracing::warn!(%session_id, error = %e, "attendance poll failed"),
    }
  }
}
