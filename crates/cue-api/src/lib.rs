//! JSON REST API for ClassCue.
//!
//! Exposes an axum [`Router`] backed by any [`cue_core::store::AttendanceStore`].
//! Every route requires HTTP Basic credentials; TLS and transport concerns
//! are the caller's responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", cue_api::api_router(store.clone()))
//! ```

pub mod attendance;
pub mod auth;
pub mod catalog;
pub mod error;
pub mod sessions;


use std::sync::Arc;

use axum::{
  Router,
  routing::{get, post},
};
use cue_core::store::AttendanceStore;

pub use error::ApiError;

/// Build a fully-materialised API router for `store`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S>(store: Arc<S>) -> Router<()>
where
  S: AttendanceStore + 'static,
{
  Router::new()
    // Identity & catalogue
    .route("/profile", get(catalog::profile::<S>))
    .route("/subjects", get(catalog::subjects::<S>))
    // Faculty
    .route(
      "/attendance/sessions",
      get(sessions::list::<S>).post(sessions::create::<S>),
    )
    .route("/attendance/sessions/{id}/code", get(sessions::current_code::<S>))
    .route("/attendance/sessions/{id}/attendance", get(sessions::roster::<S>))
    .route("/attendance/sessions/{id}/end", post(sessions::end::<S>))
    // Students
    .route("/attendance/mark", post(attendance::mark::<S>))
    .with_state(store)
}
