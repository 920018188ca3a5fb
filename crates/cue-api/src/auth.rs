//! HTTP Basic-auth extractor.
//!
//! The username is the account email; the password is checked against the
//! stored argon2 PHC hash.

use std::sync::Arc;

use argon2::{Argon2, PasswordHash, PasswordVerifier};
use axum::{
  extract::FromRequestParts,
  http::{HeaderMap, header, request::Parts},
};
use base64::{Engine as _, engine::general_purpose::STANDARD as B64};
use cue_core::{identity::User, store::AttendanceStore};

use crate::error::ApiError;

/// The authenticated caller. Present in a handler means the request carried
/// valid credentials.
pub struct CurrentUser(pub User);

impl CurrentUser {
  /// Reject callers who may not run attendance sessions.
  pub fn require_session_runner(&self) -> Result<&User, ApiError> {
    if self.0.role.can_run_sessions() {
      Ok(&self.0)
    } else {
      Err(ApiError::Forbidden("only faculty may run attendance sessions".into()))
    }
  }
}

/// Split a `Basic` authorization header into `(username, password)`.
pub fn basic_credentials(headers: &HeaderMap) -> Result<(String, String), ApiError> {
  let header_val = headers
    .get(header::AUTHORIZATION)
    .and_then(|v| v.to_str().ok())
    .ok_or(ApiError::Unauthorized)?;

  let encoded = header_val
    .strip_prefix("Basic ")
    .ok_or(ApiError::Unauthorized)?;

  let decoded = B64.decode(encoded).map_err(|_| ApiError::Unauthorized)?;
  let creds   = String::from_utf8(decoded).map_err(|_| ApiError::Unauthorized)?;

  let (username, password) = creds.split_once(':').ok_or(ApiError::Unauthorized)?;
  Ok((username.to_owned(), password.to_owned()))
}

/// Check `password` against an argon2 PHC string.
pub fn verify_password(password: &str, phc: &str) -> bool {
  PasswordHash::new(phc)
    .map(|parsed| {
      Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
    })
    .unwrap_or(false)
}

impl<S> FromRequestParts<Arc<S>> for CurrentUser
where
  S: AttendanceStore + 'static,
{
  type Rejection = ApiError;

  async fn from_request_parts(
    parts: &mut Parts,
    store: &Arc<S>,
  ) -> Result<Self, Self::Rejection> {
    let (email, password) = basic_credentials(&parts.headers)?;

    let user = store
      .find_user_by_email(&email)
      .await
      .map_err(ApiError::from_store)?
      .ok_or(ApiError::Unauthorized)?;

    if !verify_password(&password, &user.password_hash) {
      tracing::debug!(%email, "rejected credentials");
      return Err(ApiError::Unauthorized);
    }
    Ok(CurrentUser(user))
  }
}

#[cfg(test)]
mod tests {
  use argon2::{PasswordHasher, password_hash::SaltString};
  use axum::http::HeaderValue;
  use rand_core::OsRng;

  use super::*;

  fn headers(value: &str) -> HeaderMap {
    let mut h = HeaderMap::new();
    h.insert(header::AUTHORIZATION, HeaderValue::from_str(value).unwrap());
    h
  }

  #[test]
  fn parses_basic_credentials() {
    let encoded = B64.encode("ada@example.edu:pa:ss");
    let (user, pass) = basic_credentials(&headers(&format!("Basic {encoded}"))).unwrap();
    assert_eq!(user, "ada@example.edu");
    assert_eq!(pass, "pa:ss");
  }

  #[test]
  fn rejects_malformed_headers() {
    assert!(basic_credentials(&HeaderMap::new()).is_err());
    assert!(basic_credentials(&headers("Bearer abc")).is_err());
    assert!(basic_credentials(&headers("Basic !!!not-base64!!!")).is_err());
    let no_colon = B64.encode("justauser");
    assert!(basic_credentials(&headers(&format!("Basic {no_colon}"))).is_err());
  }

  #[test]
  fn verifies_argon2_hashes() {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
      .hash_password(b"secret", &salt)
      .unwrap()
      .to_string();
    assert!(verify_password("secret", &hash));
    assert!(!verify_password("wrong", &hash));
    assert!(!verify_password("secret", "not-a-phc-string"));
  }
}
