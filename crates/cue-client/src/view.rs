//! The faculty display's state, and the cancellation-aware handle the
//! periodic tasks write it through.

use std::sync::Arc;

use cue_core::{ROTATION_PERIOD, code::CodeView, record::Roster};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

/// Everything the live session screen shows.
#[derive(Debug, Clone, Default)]
pub struct LiveView {
  /// The most recently applied code. Kept while `expired` so the display can
  /// grey it out rather than blank it.
  pub code:           Option<CodeView>,
  /// Cosmetic countdown, reconciled from the server on every refresh.
  pub remaining_secs: u64,
  /// Set whenever the code on screen may no longer be valid.
  pub expired:        bool,
  /// Last roster the server returned, replaced wholesale.
  pub roster:         Roster,
  /// Sequence number of the newest refresh applied so far.
  pub refresh_seq:    u64,
}

impl LiveView {
  /// The view at session start: no code yet, a full countdown.
  pub fn initial() -> Self {
    Self {
      remaining_secs: ROTATION_PERIOD.as_secs(),
      ..Self::default()
    }
  }
}

/// Write access to a session's [`LiveView`], fenced by the session's
/// cancellation token.
#[derive(Clone)]
pub struct ViewHandle {
  tx:     Arc<watch::Sender<LiveView>>,
  cancel: CancellationToken,
}

impl ViewHandle {
  pub fn new(tx: Arc<watch::Sender<LiveView>>, cancel: CancellationToken) -> Self {
    Self { tx, cancel }
  }

  pub fn cancel_token(&self) -> &CancellationToken { &self.cancel }

  /// Apply `f` unless the session has been cancelled. `f` returns whether it
  /// changed anything; watchers are only woken if it did.
  ///
  /// The cancellation check happens under the view's write lock, so once
  /// [`ViewHandle::fence`] returns after a cancel, no update can land.
  pub fn update(&self, f: impl FnOnce(&mut LiveView) -> bool) -> bool {
    self.tx.send_if_modified(|view| {
      if self.cancel.is_cancelled() {
        return false;
      }
      f(view)
    })
  }

  /// Wait out any writer that passed its cancellation check.
  pub fn fence(&self) { drop(self.tx.borrow()); }
}
