//! Read-only lookups: the subject catalogue and the caller's own profile.

use std::sync::Arc;

use axum::{Json, extract::State};
use cue_core::{
  identity::{Profile, Subject},
  store::AttendanceStore,
};

use crate::{auth::CurrentUser, error::ApiError};

/// `GET /subjects`
pub async fn subjects<S>(
  State(store): State<Arc<S>>,
  _caller: CurrentUser,
) -> Result<Json<Vec<Subject>>, ApiError>
where
  S: AttendanceStore + 'static,
{
  let subjects = store.list_subjects().await.map_err(ApiError::from_store)?;
  Ok(Json(subjects))
}

/// `GET /profile`
pub async fn profile<S>(
  State(store): State<Arc<S>>,
  CurrentUser(user): CurrentUser,
) -> Result<Json<Profile>, ApiError>
where
  S: AttendanceStore + 'static,
{
  let student_profile = store
    .get_student_profile(user.user_id)
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(Profile { user, student_profile }))
}
