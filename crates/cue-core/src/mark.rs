//! Mark-attendance validation rules.
//!
//! The rules are evaluated in a fixed order and each failure is distinct:
//!
//! 1. the code matches no issued code → [`MarkError::InvalidCode`]
//! 2. the code has expired, or its session has ended → [`MarkError::ExpiredCode`]
//! 3. the student already has a record for the session → [`MarkError::AlreadyMarked`]
//! 4. the caller has no student profile → [`MarkError::ProfileNotFound`]
//!
//! Storage backends look the facts up and hand them to [`MarkCheck`]; the
//! decision itself is pure.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumString, IntoStaticStr};
use thiserror::Error;

use crate::{code::RotatingCode, identity::StudentProfile, session::SessionState};

/// Why a scan was not credited.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Error, Serialize, Deserialize, AsRefStr, EnumString, IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum MarkError {
  #[error("invalid code")]
  InvalidCode,
  #[error("code has expired")]
  ExpiredCode,
  #[error("attendance already marked for this session")]
  AlreadyMarked,
  #[error("student profile not found")]
  ProfileNotFound,
}

impl MarkError {
  /// Message shown to the student who scanned.
  pub fn user_message(self) -> &'static str {
    match self {
      Self::InvalidCode => {
        "Invalid QR code. Please scan the correct QR code from your instructor."
      }
      Self::ExpiredCode => {
        "QR code has expired. Please ask your instructor for a new QR code."
      }
      Self::AlreadyMarked => "You have already marked attendance for this session.",
      Self::ProfileNotFound => "Student profile not found. Please contact support.",
    }
  }
}

/// Everything the validator needs, already looked up by the caller.
#[derive(Debug)]
pub struct MarkCheck<'a> {
  /// The issued code matching the scanned text, if any.
  pub code:           Option<&'a RotatingCode>,
  /// State of the session that issued `code`.
  pub session_state:  SessionState,
  pub now:            DateTime<Utc>,
  /// The scanning user's student profile, if one exists.
  pub profile:        Option<&'a StudentProfile>,
  /// Whether that profile already has a record for the session.
  pub already_marked: bool,
}

impl MarkCheck<'_> {
  /// Return the first rule that fails, in the documented order.
  pub fn evaluate(&self) -> Result<(), MarkError> {
    let code = self.code.ok_or(MarkError::InvalidCode)?;
    if !code.is_current(self.now) || self.session_state != SessionState::Active {
      return Err(MarkError::ExpiredCode);
    }
    if self.already_marked {
      return Err(MarkError::AlreadyMarked);
    }
    if self.profile.is_none() {
      return Err(MarkError::ProfileNotFound);
    }
    Ok(())
  }
}
