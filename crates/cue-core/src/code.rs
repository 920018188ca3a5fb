//! Rotating codes: the short-lived tokens students scan.
//!
//! Each code is valid for exactly [`ROTATION_PERIOD`](crate::ROTATION_PERIOD)
//! from issuance. Codes are never mutated; a newer code supersedes an expired
//! one, and at most one code per session is current at any instant.

use chrono::{DateTime, Utc};
use rand_core::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::ROTATION_PERIOD;

/// Bytes of entropy per code.
const CODE_BYTES: usize = 32;

/// An issued code and its validity window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RotatingCode {
  pub session_id: Uuid,
  pub code:       String,
  pub issued_at:  DateTime<Utc>,
  pub expires_at: DateTime<Utc>,
}

impl RotatingCode {
  /// Mint a fresh code for `session_id`, valid from `now` for one rotation
  /// period.
  pub fn issue<R: RngCore + CryptoRng>(
    session_id: Uuid,
    now: DateTime<Utc>,
    rng: &mut R,
  ) -> Self {
    Self {
      session_id,
      code: mint_code(rng),
      issued_at: now,
      expires_at: now + rotation_period(),
    }
  }

  /// A code stops being current at exactly `expires_at`.
  pub fn is_current(&self, now: DateTime<Utc>) -> bool { now < self.expires_at }
}

/// The shape the issuer hands to the faculty display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeView {
  pub code:       String,
  /// Rendered image of the code, when the issuer provides one.
  pub code_image: Option<String>,
  pub issued_at:  DateTime<Utc>,
  pub expires_at: DateTime<Utc>,
}

impl From<RotatingCode> for CodeView {
  fn from(c: RotatingCode) -> Self {
    Self {
      code:       c.code,
      code_image: None,
      issued_at:  c.issued_at,
      expires_at: c.expires_at,
    }
  }
}

/// Produce an unguessable hex token from `rng`.
pub fn mint_code<R: RngCore + CryptoRng>(rng: &mut R) -> String {
  let mut buf = [0u8; CODE_BYTES];
  rng.fill_bytes(&mut buf);
  hex::encode(buf)
}

/// Whole seconds until `expires_at`, rounded up and floored at zero.
pub fn remaining_secs(expires_at: DateTime<Utc>, now: DateTime<Utc>) -> u64 {
  let millis = (expires_at - now).num_milliseconds();
  if millis <= 0 {
    return 0;
  }
  (millis as u64).div_ceil(1000)
}

/// [`ROTATION_PERIOD`] as a chrono duration.
pub fn rotation_period() -> chrono::Duration {
  chrono::Duration::from_std(ROTATION_PERIOD).unwrap_or(chrono::Duration::seconds(10))
}
