//! Client side of the ClassCue attendance protocol.
//!
//! - [`api`]: the [`api::AttendanceApi`] collaborator trait and its
//!   `reqwest`-backed implementation.
//! - [`controller`]: the faculty-side session state machine, which owns the
//!   rotation and poll tasks for the lifetime of one session.
//! - [`scanner`]: the student-side camera adapter.

#![allow(async_fn_in_trait)]

pub mod api;
pub mod controller;
pub mod error;
pub mod poller;
pub mod rotation;
pub mod scanner;
pub mod view;

#[cfg(test)]
mod testing;

pub use api::{ApiConfig, AttendanceApi, HttpApi};
pub use controller::{Phase, SessionController, SessionSummary};
pub use error::{ClientError, ControllerError, ScanError};
pub use view::LiveView;
