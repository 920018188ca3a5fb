//! Faculty-side session state machine: `Idle → Active → Terminated`.
//!
//! Starting a session spawns the rotation timer and the attendance poller as
//! two tasks tied to a per-session [`CancellationToken`]. Stopping ends the
//! session on the server first; only once that succeeds (or the server says
//! the session is already over) are both tasks cancelled, aborted and
//! awaited, so nothing fires after [`SessionController::stop`] returns.

use std::sync::Arc;

use cue_core::{
  clock::Clock,
  session::{AttendanceSession, session_duration_secs},
};
use tokio::{sync::watch, task::JoinHandle};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::{
  api::AttendanceApi,
  error::{ClientError, ControllerError},
  poller, rotation,
  view::{LiveView, ViewHandle},
};

/// Which state the controller is in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
  Idle,
  Active,
  Terminated,
}

/// What [`SessionController::stop`] reports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSummary {
  pub session_id:     Uuid,
  pub duration_secs:  u64,
  pub attended_count: u64,
}

/// A running session and the tasks scoped to it.
struct Running {
  session:  AttendanceSession,
  view:     ViewHandle,
  rotation: JoinHandle<()>,
  poller:   JoinHandle<()>,
}

impl Running {
  async fn shut_down(&mut self) {
    self.view.cancel_token().cancel();
    self.rotation.abort();
    self.poller.abort();
    // Both end in cancellation; the JoinErrors carry nothing.
    let _ = (&mut self.rotation).await;
    let _ = (&mut self.poller).await;
    self.view.fence();
  }
}

impl Drop for Running {
  fn drop(&mut self) {
    self.view.cancel_token().cancel();
    self.rotation.abort();
    self.poller.abort();
  }
}

enum State {
  Idle,
  Active(Running),
  Terminated(SessionSummary),
}

/// Drives one attendance session at a time against an [`AttendanceApi`].
pub struct SessionController<A> {
  api:   Arc<A>,
  clock: Arc<dyn Clock>,
  view:  Arc<watch::Sender<LiveView>>,
  state: State,
}

impl<A> SessionController<A>
where
  A: AttendanceApi + 'static,
{
  pub fn new(api: Arc<A>, clock: Arc<dyn Clock>) -> Self {
    let (tx, _rx) = watch::channel(LiveView::initial());
    Self { api, clock, view: Arc::new(tx), state: State::Idle }
  }

  pub fn state(&self) -> Phase {
    match self.state {
      State::Idle => Phase::Idle,
      State::Active(_) => Phase::Active,
      State::Terminated(_) => Phase::Terminated,
    }
  }

  /// Subscribe to the live display state.
  pub fn view(&self) -> watch::Receiver<LiveView> { self.view.subscribe() }

  /// The running session, if any.
  pub fn session(&self) -> Option<&AttendanceSession> {
    match &self.state {
      State::Active(running) => Some(&running.session),
      _ => None,
    }
  }

  /// The summary of the last session stopped by this controller.
  pub fn summary(&self) -> Option<&SessionSummary> {
    match &self.state {
      State::Terminated(summary) => Some(summary),
      _ => None,
    }
  }

  /// Create a session on the server and start rotating codes and polling.
  ///
  /// A blank name is rejected before any request is made. If the server
  /// call fails the controller stays where it was.
  pub async fn start(
    &mut self,
    name: &str,
    subject_id: Uuid,
  ) -> Result<AttendanceSession, ControllerError> {
    if matches!(self.state, State::Active(_)) {
      return Err(ControllerError::AlreadyActive);
    }
    let name = name.trim();
    if name.is_empty() {
      return Err(ControllerError::EmptyName);
    }

    let session = self.api.create_session(name, subject_id).await?;
    tracing::info!(session_id = %session.session_id, name, "session started");

    self.view.send_replace(LiveView::initial());
    let view = ViewHandle::new(self.view.clone(), CancellationToken::new());

    let rotation = tokio::spawn(rotation::run(
      self.api.clone(),
      self.clock.clone(),
      session.session_id,
      view.clone(),
    ));
    let poller = tokio::spawn(poller::run(self.api.clone(), session.session_id, view.clone()));

    self.state = State::Active(Running { session: session.clone(), view, rotation, poller });
    Ok(session)
  }

  /// End the running session on the server, then tear its tasks down.
  ///
  /// A 409 `session_ended` means an earlier end already went through, so
  /// the controller terminates anyway. On any other failure the session
  /// keeps running and the error is returned.
  pub async fn stop(&mut self) -> Result<SessionSummary, ControllerError> {
    let mut running = match std::mem::replace(&mut self.state, State::Idle) {
      State::Active(running) => running,
      other => {
        self.state = other;
        return Err(ControllerError::NotActive);
      }
    };

    let session_id = running.session.session_id;
    let attended_count = match self.api.end_session(session_id).await {
      Ok(ack) => {
        running.shut_down().await;
        ack.total_count
      }
      Err(e) if is_already_ended(&e) => {
        tracing::info!(%session_id, "session was already ended on the server");
        running.shut_down().await;
        self.final_count(session_id).await
      }
      Err(e) => {
        tracing::warn!(%session_id, error = %e, "failed to end session");
        self.state = State::Active(running);
        return Err(e.into());
      }
    };

    let summary = SessionSummary {
      session_id,
      duration_secs: session_duration_secs(running.session.start_time, self.clock.now()),
      attended_count,
    };
    tracing::info!(
      %session_id,
      duration_secs = summary.duration_secs,
      attended = summary.attended_count,
      "session ended"
    );
    self.state = State::Terminated(summary.clone());
    Ok(summary)
  }

  /// Count for a session that ended without an acknowledgement: a fresh
  /// roster if the server answers, otherwise the last polled one.
  async fn final_count(&self, session_id: Uuid) -> u64 {
    match self.api.attendance(session_id).await {
      Ok(roster) => roster.total_count,
      Err(e) => {
        tracing::warn!(%session_id, error = %e, "falling back to last polled roster");
        self.view.borrow().roster.total_count
      }
    }
  }
}

fn is_already_ended(e: &ClientError) -> bool {
  matches!(e, ClientError::Server { code, .. } if code == "session_ended")
}
