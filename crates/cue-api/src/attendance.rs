//! Handler for `POST /attendance/mark` (student side).

use std::sync::Arc;

use axum::{
  Json,
  extract::{State, rejection::JsonRejection},
  http::StatusCode,
  response::IntoResponse,
};
use cue_core::store::AttendanceStore;
use serde::Deserialize;

use crate::{auth::CurrentUser, error::ApiError};

#[derive(Debug, Deserialize)]
pub struct MarkBody {
  /// The decoded text of the scanned code.
  pub code: String,
}

/// `POST /attendance/mark` body: `{"code":"..."}`, returns 201 + receipt.
pub async fn mark<S>(
  State(store): State<Arc<S>>,
  CurrentUser(user): CurrentUser,
  body: Result<Json<MarkBody>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError>
where
  S: AttendanceStore + 'static,
{
  let Json(body) = body?;
  match store.mark_attendance(user.user_id, body.code).await {
    Ok(receipt) => {
      tracing::info!(session_id = %receipt.session_id, student = %user.email, "attendance marked");
      Ok((StatusCode::CREATED, Json(receipt)))
    }
    Err(e) => {
      let err = ApiError::from_store(e);
      if let ApiError::Mark(reason) = &err {
        let code: &str = reason.as_ref();
        tracing::info!(student = %user.email, reason = code, "scan rejected");
      }
      Err(err)
    }
  }
}
