//! Rotation timer: a cosmetic one-second countdown plus a network refresh
//! every rotation period.
//!
//! The countdown never waits on the network. When it runs out the code is
//! flagged expired at once, a refresh is kicked off, and the countdown
//! restarts. Every successful refresh then re-derives the countdown from the
//! server's `expires_at`, which always wins over the local count.
//!
//! Refreshes run concurrently, so each one takes a sequence number when it is
//! issued; a response older than the newest one applied is dropped.

use std::{
  sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
  },
  time::Duration,
};

use chrono::{DateTime, Utc};
use cue_core::{
  COUNTDOWN_TICK, ROTATION_PERIOD,
  clock::Clock,
  code::{CodeView, remaining_secs},
};
use tokio::{
  task::JoinSet,
  time::{Instant, Interval, MissedTickBehavior, interval_at},
};
use uuid::Uuid;

use crate::{api::AttendanceApi, error::ClientError, view::{LiveView, ViewHandle}};

/// Run the timer until the session's token is cancelled.
///
/// The first refresh is issued immediately; countdown ticks start one
/// second in and refresh ticks one rotation period in.
pub async fn run<A>(api: Arc<A>, clock: Arc<dyn Clock>, session_id: Uuid, view: ViewHandle)
where
  A: AttendanceApi + 'static,
{
  let issued       = AtomicU64::new(0);
  let mut inflight = JoinSet::new();
  let refresh      = |inflight: &mut JoinSet<()>| {
    let seq = issued.fetch_add(1, Ordering::Relaxed) + 1;
    inflight.spawn(refresh_once(api.clone(), clock.clone(), session_id, view.clone(), seq));
  };

  refresh(&mut inflight);

  let start         = Instant::now();
  let mut countdown = ticker(start + COUNTDOWN_TICK, COUNTDOWN_TICK);
  let mut rotation  = ticker(start + ROTATION_PERIOD, ROTATION_PERIOD);
  let cancel        = view.cancel_token().clone();

  loop {
    tokio::select! {
      _ = cancel.cancelled() => break,
      _ = countdown.tick() => {
        if tick_countdown(&view) {
          tracing::debug!(%session_id, "countdown reached zero, refreshing");
          refresh(&mut inflight);
        }
      }
      _ = rotation.tick() => refresh(&mut inflight),
      Some(_) = inflight.join_next(), if !inflight.is_empty() => {}
    }
  }
  inflight.abort_all();
}

/// An interval that, after a stall, fires once and then resumes a full
/// period later instead of replaying the missed ticks.
pub(crate) fn ticker(first: Instant, period: Duration) -> Interval {
  let mut ticks = interval_at(first, period);
  ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
  ticks
}

/// Advance the countdown by one tick. Returns `true` when it ran out, in
/// which case the view has been flagged expired and the countdown restarted.
fn tick_countdown(view: &ViewHandle) -> bool {
  let mut ran_out = false;
  view.update(|v| {
    if v.remaining_secs <= 1 {
      v.expired        = true;
      v.remaining_secs = ROTATION_PERIOD.as_secs();
      ran_out          = true;
    } else {
      v.remaining_secs -= 1;
    }
    true
  });
  ran_out
}

async fn refresh_once<A>(
  api: Arc<A>,
  clock: Arc<dyn Clock>,
  session_id: Uuid,
  view: ViewHandle,
  seq: u64,
) where
  A: AttendanceApi,
{
  let outcome = api.current_code(session_id).await;
  if let Err(e) = &outcome {
    tracing::warn!(%session_id, error = %e, "code refresh failed");
  }
  let now = clock.now();
  view.update(|v| apply_refresh(v, seq, outcome, now));
}

/// Fold one refresh response into the view. Stale responses (issued before
/// the newest one already applied) are ignored.
pub fn apply_refresh(
  view: &mut LiveView,
  seq: u64,
  outcome: Result<CodeView, ClientError>,
  now: DateTime<Utc>,
) -> bool {
  if seq <= view.refresh_seq {
    return false;
  }
  view.refresh_seq = seq;
  match outcome {
    Ok(code) => {
      view.remaining_secs = remaining_secs(code.expires_at, now);
      view.expired        = view.remaining_secs == 0;
      view.code           = Some(code);
    }
    Err(_) => view.expired = true,
  }
  true
}
