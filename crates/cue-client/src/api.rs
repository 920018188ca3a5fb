//! The server collaborators the client depends on, and an HTTP implementation.

use std::{future::Future, str::FromStr, time::Duration};

use cue_core::{
  code::CodeView,
  identity::{Profile, Subject},
  mark::MarkError,
  record::{MarkReceipt, Roster},
  session::{AttendanceSession, EndedSession},
};
use reqwest::{Client, RequestBuilder};
use serde::{Deserialize, de::DeserializeOwned};
use serde_json::json;
use uuid::Uuid;

use crate::error::ClientError;

/// Everything the controller and the scanner need from the server.
///
/// All methods return `Send` futures so implementations can be driven from
/// spawned tasks.
pub trait AttendanceApi: Send + Sync {
  fn create_session<'a>(
    &'a self,
    name: &'a str,
    subject_id: Uuid,
  ) -> impl Future<Output = Result<AttendanceSession, ClientError>> + Send + 'a;

  fn current_code(
    &self,
    session_id: Uuid,
  ) -> impl Future<Output = Result<CodeView, ClientError>> + Send + '_;

  fn attendance(
    &self,
    session_id: Uuid,
  ) -> impl Future<Output = Result<Roster, ClientError>> + Send + '_;

  /// The acknowledgement carries the final attendance count.
  fn end_session(
    &self,
    session_id: Uuid,
  ) -> impl Future<Output = Result<EndedSession, ClientError>> + Send + '_;

  /// Protocol rejections come back as [`ClientError::Rejected`].
  fn mark_attendance<'a>(
    &'a self,
    code: &'a str,
  ) -> impl Future<Output = Result<MarkReceipt, ClientError>> + Send + 'a;

  fn list_subjects(&self) -> impl Future<Output = Result<Vec<Subject>, ClientError>> + Send + '_;

  fn profile(&self) -> impl Future<Output = Result<Profile, ClientError>> + Send + '_;
}

// ─── HTTP implementation ──────────────────────────────────────────────────────

/// Connection settings for the ClassCue API.
#[derive(Debug, Clone)]
pub struct ApiConfig {
  pub base_url: String,
  pub username: String,
  pub password: String,
}

/// Async HTTP client for the ClassCue JSON REST API.
///
/// Cheap to clone: the inner [`reqwest::Client`] is `Arc`-based.
#[derive(Clone)]
pub struct HttpApi {
  client: Client,
  config: ApiConfig,
}

/// Error body shape shared by every failing endpoint.
#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
  #[serde(default)]
  error: String,
  #[serde(default)]
  code:  String,
}

impl HttpApi {
  pub fn new(config: ApiConfig) -> Result<Self, ClientError> {
    let client = Client::builder().timeout(Duration::from_secs(30)).build()?;
    Ok(Self { client, config })
  }

  fn url(&self, path: &str) -> String {
    format!("{}/api{}", self.config.base_url.trim_end_matches('/'), path)
  }

  fn auth(&self, req: RequestBuilder) -> RequestBuilder {
    if self.config.username.is_empty() {
      req
    } else {
      req.basic_auth(&self.config.username, Some(&self.config.password))
    }
  }

  async fn send<T: DeserializeOwned>(&self, req: RequestBuilder) -> Result<T, ClientError> {
    let resp   = self.auth(req).send().await?;
    let status = resp.status();
    if status.is_success() {
      return Ok(resp.json().await?);
    }

    let body: ErrorBody = resp.json().await.unwrap_or_default();
    if let Ok(reason) = MarkError::from_str(&body.code) {
      return Err(ClientError::Rejected(reason));
    }
    Err(ClientError::Server {
      status:  status.as_u16(),
      code:    body.code,
      message: if body.error.is_empty() { status.to_string() } else { body.error },
    })
  }
}

impl AttendanceApi for HttpApi {
  /// `POST /api/attendance/sessions`
  async fn create_session(
    &self,
    name: &str,
    subject_id: Uuid,
  ) -> Result<AttendanceSession, ClientError> {
    let req = self
      .client
      .post(self.url("/attendance/sessions"))
      .json(&json!({ "session_name": name, "subject_id": subject_id }));
    self.send(req).await
  }

  /// `GET /api/attendance/sessions/{id}/code`
  async fn current_code(&self, session_id: Uuid) -> Result<CodeView, ClientError> {
    let req = self
      .client
      .get(self.url(&format!("/attendance/sessions/{session_id}/code")));
    self.send(req).await
  }

  /// `GET /api/attendance/sessions/{id}/attendance`
  async fn attendance(&self, session_id: Uuid) -> Result<Roster, ClientError> {
    let req = self
      .client
      .get(self.url(&format!("/attendance/sessions/{session_id}/attendance")));
    self.send(req).await
  }

  /// `POST /api/attendance/sessions/{id}/end`
  async fn end_session(&self, session_id: Uuid) -> Result<EndedSession, ClientError> {
    let req = self
      .client
      .post(self.url(&format!("/attendance/sessions/{session_id}/end")));
    self.send(req).await
  }

  /// `POST /api/attendance/mark`
  async fn mark_attendance(&self, code: &str) -> Result<MarkReceipt, ClientError> {
    let req = self
      .client
      .post(self.url("/attendance/mark"))
      .json(&json!({ "code": code }));
    self.send(req).await
  }

  /// `GET /api/subjects`
  async fn list_subjects(&self) -> Result<Vec<Subject>, ClientError> {
    self.send(self.client.get(self.url("/subjects"))).await
  }

  /// `GET /api/profile`
  async fn profile(&self) -> Result<Profile, ClientError> {
    self.send(self.client.get(self.url("/profile"))).await
  }
}
