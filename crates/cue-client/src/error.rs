//! Client error types.

use cue_core::mark::MarkError;
use thiserror::Error;

/// A failed call to the attendance API.
#[derive(Debug, Error)]
pub enum ClientError {
  #[error("request failed: {0}")]
  Http(#[from] reqwest::Error),

  #[error("server returned {status}: {message}")]
  Server {
    status:  u16,
    code:    String,
    message: String,
  },

  /// The server refused a scan for one of the protocol reasons.
  #[error("{}", .0.user_message())]
  Rejected(MarkError),
}

/// Why a [`crate::SessionController`] call was refused or failed.
#[derive(Debug, Error)]
pub enum ControllerError {
  #[error("session name must not be empty")]
  EmptyName,

  #[error("a session is already running")]
  AlreadyActive,

  #[error("no session is running")]
  NotActive,

  #[error(transparent)]
  Api(#[from] ClientError),
}

/// Camera capability failures. These end the current scan attempt.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum CameraError {
  #[error("no camera available")]
  NotFound,

  #[error("camera access denied")]
  AccessDenied,

  #[error("camera stream ended")]
  Disconnected,
}

/// The outcome of a scan attempt that did not produce a receipt.
#[derive(Debug, Error)]
pub enum ScanError {
  #[error(transparent)]
  Camera(#[from] CameraError),

  #[error("scan cancelled")]
  Cancelled,

  #[error("{}", .0.user_message())]
  Rejected(MarkError),

  #[error(transparent)]
  Api(ClientError),
}

impl From<ClientError> for ScanError {
  fn from(e: ClientError) -> Self {
    match e {
      ClientError::Rejected(reason) => Self::Rejected(reason),
      other => Self::Api(other),
    }
  }
}
