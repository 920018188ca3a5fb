//! API error type and [`axum::response::IntoResponse`] implementation.
//!
//! Every error body has the shape `{"error": "<message>", "code": "<code>"}`
//! so clients can branch on `code` without parsing prose.

use axum::{
  Json,
  extract::rejection::JsonRejection,
  http::{HeaderValue, StatusCode, header},
  response::{IntoResponse, Response},
};
use cue_core::{mark::MarkError, store::StoreError};
use serde_json::json;
use thiserror::Error;

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error("unauthorized")]
  Unauthorized,

  #[error("forbidden: {0}")]
  Forbidden(String),

  #[error("not found: {0}")]
  NotFound(String),

  #[error("bad request: {0}")]
  BadRequest(String),

  #[error("session has already ended")]
  SessionEnded,

  #[error("conflict: {0}")]
  Conflict(String),

  #[error(transparent)]
  Mark(MarkError),

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl ApiError {
  /// Classify a backend error by the domain failure it carries, if any.
  pub fn from_store<E: StoreError>(e: E) -> Self {
    use cue_core::Error as D;
    let classified = e.domain().map(|d| match d {
      D::SessionNotFound(id) => Self::NotFound(format!("session {id} not found")),
      D::SubjectNotFound(id) => Self::NotFound(format!("subject {id} not found")),
      D::UserNotFound(id) => Self::NotFound(format!("user {id} not found")),
      D::SessionEnded(_) => Self::SessionEnded,
      D::DuplicateEmail(email) => Self::Conflict(format!("email {email:?} is taken")),
      D::EmptySessionName => Self::BadRequest(d.to_string()),
      D::Mark(m) => Self::Mark(*m),
    });
    classified.unwrap_or_else(|| Self::Store(Box::new(e)))
  }

  fn status_and_code(&self) -> (StatusCode, &'static str) {
    match self {
      Self::Unauthorized => (StatusCode::UNAUTHORIZED, "unauthorized"),
      Self::Forbidden(_) => (StatusCode::FORBIDDEN, "forbidden"),
      Self::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
      Self::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad_request"),
      Self::SessionEnded => (StatusCode::CONFLICT, "session_ended"),
      Self::Conflict(_) => (StatusCode::CONFLICT, "conflict"),
      Self::Mark(m) => {
        let status = match m {
          MarkError::InvalidCode => StatusCode::BAD_REQUEST,
          MarkError::ExpiredCode => StatusCode::GONE,
          MarkError::AlreadyMarked => StatusCode::CONFLICT,
          MarkError::ProfileNotFound => StatusCode::NOT_FOUND,
        };
        (status, m.into())
      }
      Self::Store(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
    }
  }
}

impl From<JsonRejection> for ApiError {
  fn from(rejection: JsonRejection) -> Self { Self::BadRequest(rejection.body_text()) }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let (status, code) = self.status_and_code();
    if let Self::Store(e) = &self {
      tracing::error!(error = %e, "store failure");
    }
    let mut res = (status, Json(json!({ "error": self.to_string(), "code": code })))
      .into_response();
    if status == StatusCode::UNAUTHORIZED {
      res.headers_mut().insert(
        header::WWW_AUTHENTICATE,
        HeaderValue::from_static("Basic realm=\"classcue\""),
      );
    }
    res
  }
}
