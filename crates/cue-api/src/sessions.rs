//! Handlers for `/attendance/sessions` endpoints (faculty side).
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/attendance/sessions` | Body: [`CreateBody`]; returns 201 + session |
//! | `GET`  | `/attendance/sessions` | Caller's sessions, newest first |
//! | `GET`  | `/attendance/sessions/:id/code` | Current rotating code |
//! | `GET`  | `/attendance/sessions/:id/attendance` | Roster in arrival order |
//! | `POST` | `/attendance/sessions/:id/end` | Ends the session; returns final count |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, State, rejection::JsonRejection},
  http::StatusCode,
  response::IntoResponse,
};
use cue_core::{
  code::CodeView,
  identity::User,
  record::Roster,
  session::{AttendanceSession, EndedSession, NewSession},
  store::AttendanceStore,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{auth::CurrentUser, error::ApiError};

/// Load a session the caller is allowed to manage.
async fn managed_session<S: AttendanceStore>(
  store: &S,
  user: &User,
  session_id: Uuid,
) -> Result<AttendanceSession, ApiError> {
  let session = store
    .get_session(session_id)
    .await
    .map_err(ApiError::from_store)?
    .ok_or_else(|| ApiError::NotFound(format!("session {session_id} not found")))?;
  if !user.may_manage(session.owner_id) {
    return Err(ApiError::Forbidden(format!("session {session_id} belongs to someone else")));
  }
  Ok(session)
}

// ─── Create ───────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CreateBody {
  pub session_name: String,
  pub subject_id:   Uuid,
}

/// `POST /attendance/sessions` body: `{"session_name":"...","subject_id":"..."}`
pub async fn create<S>(
  State(store): State<Arc<S>>,
  caller: CurrentUser,
  body: Result<Json<CreateBody>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError>
where
  S: AttendanceStore + 'static,
{
  let owner = caller.require_session_runner()?;
  let Json(body) = body?;
  let input = NewSession::new(&body.session_name, body.subject_id, owner.user_id)
    .map_err(|e| ApiError::BadRequest(e.to_string()))?;

  let session = store
    .create_session(input)
    .await
    .map_err(ApiError::from_store)?;

  tracing::info!(
    session_id = %session.session_id,
    owner = %owner.email,
    "attendance session started"
  );
  Ok((StatusCode::CREATED, Json(session)))
}

// ─── List ─────────────────────────────────────────────────────────────────────

/// `GET /attendance/sessions`
pub async fn list<S>(
  State(store): State<Arc<S>>,
  caller: CurrentUser,
) -> Result<Json<Vec<AttendanceSession>>, ApiError>
where
  S: AttendanceStore + 'static,
{
  let owner = caller.require_session_runner()?;
  let sessions = store
    .list_sessions_for_owner(owner.user_id)
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(sessions))
}

// ─── Current code ─────────────────────────────────────────────────────────────

/// `GET /attendance/sessions/:id/code`
pub async fn current_code<S>(
  State(store): State<Arc<S>>,
  caller: CurrentUser,
  Path(session_id): Path<Uuid>,
) -> Result<Json<CodeView>, ApiError>
where
  S: AttendanceStore + 'static,
{
  managed_session(store.as_ref(), &caller.0, session_id).await?;
  let code = store
    .current_code(session_id)
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(CodeView::from(code)))
}

// ─── Roster ───────────────────────────────────────────────────────────────────

/// `GET /attendance/sessions/:id/attendance`
pub async fn roster<S>(
  State(store): State<Arc<S>>,
  caller: CurrentUser,
  Path(session_id): Path<Uuid>,
) -> Result<Json<Roster>, ApiError>
where
  S: AttendanceStore + 'static,
{
  managed_session(store.as_ref(), &caller.0, session_id).await?;
  let roster = store
    .roster(session_id)
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(roster))
}

// ─── End ──────────────────────────────────────────────────────────────────────

/// `POST /attendance/sessions/:id/end`
pub async fn end<S>(
  State(store): State<Arc<S>>,
  caller: CurrentUser,
  Path(session_id): Path<Uuid>,
) -> Result<Json<EndedSession>, ApiError>
where
  S: AttendanceStore + 'static,
{
  managed_session(store.as_ref(), &caller.0, session_id).await?;
  let ended = store
    .end_session(session_id)
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(ended))
}
