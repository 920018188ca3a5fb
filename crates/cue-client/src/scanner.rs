//! Student-side scanner adapter.
//!
//! A [`Camera`] yields decode attempts, one per frame. A [`ScanAttempt`]
//! owns the running camera for one scan and stops it on every exit path.
//! [`scan_and_mark`] keeps pulling frames until the first code decodes (or
//! the scan is cancelled), stops the camera, then submits the code once.
//!
//! Frames without a code are routine and never surface as errors; only
//! capability failures do.

use std::path::Path;

use cue_core::record::MarkReceipt;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines};
use tokio_util::sync::CancellationToken;

use crate::{
  api::AttendanceApi,
  error::{CameraError, ScanError},
};

/// A source of decoded frames.
pub trait Camera: Send {
  /// Begin capture. Fails if no camera exists or access is refused.
  fn start(&mut self) -> impl Future<Output = Result<(), CameraError>> + Send + '_;

  /// Attempt to decode the next frame. `Ok(None)` means the frame held no
  /// readable code.
  fn decode_frame(&mut self)
  -> impl Future<Output = Result<Option<String>, CameraError>> + Send + '_;

  /// Release the capture device.
  fn stop(&mut self);
}

// ─── ScanAttempt ──────────────────────────────────────────────────────────────

/// Exclusive use of a started camera for one scan. Capture stops when this
/// is dropped.
pub struct ScanAttempt<'c, C: Camera> {
  camera: &'c mut C,
}

impl<'c, C: Camera> ScanAttempt<'c, C> {
  pub async fn start(camera: &'c mut C) -> Result<Self, CameraError> {
    camera.start().await?;
    Ok(Self { camera })
  }

  /// The next decode attempt.
  pub async fn next_frame(&mut self) -> Result<Option<String>, CameraError> {
    self.camera.decode_frame().await
  }

  /// Pull frames until one decodes, then stop capture and hand back the text.
  pub async fn first_code(mut self, cancel: &CancellationToken) -> Result<String, ScanError> {
    loop {
      let frame = tokio::select! {
        biased;
        _ = cancel.cancelled() => return Err(ScanError::Cancelled),
        frame = self.next_frame() => frame?,
      };
      if let Some(text) = frame {
        return Ok(text);
      }
    }
  }
}

impl<C: Camera> Drop for ScanAttempt<'_, C> {
  fn drop(&mut self) { self.camera.stop(); }
}

/// Scan one code with `camera` and submit it to the attendance recorder.
pub async fn scan_and_mark<C, A>(
  camera: &mut C,
  api: &A,
  cancel: &CancellationToken,
) -> Result<MarkReceipt, ScanError>
where
  C: Camera,
  A: AttendanceApi,
{
  let code = ScanAttempt::start(camera).await?.first_code(cancel).await?;
  tracing::debug!("code decoded, submitting");

  let receipt = api.mark_attendance(&code).await?;
  tracing::info!(session_id = %receipt.session_id, "attendance marked");
  Ok(receipt)
}

// ─── LineCamera ───────────────────────────────────────────────────────────────

/// A [`Camera`] whose "frames" are lines of already-decoded text, for use
/// with an external decoder piping into the CLI. A blank line is a frame
/// with no code; end of input is a lost stream.
pub struct LineCamera<R> {
  lines:     Lines<R>,
  capturing: bool,
}

impl<R: AsyncBufRead + Unpin + Send> LineCamera<R> {
  pub fn new(reader: R) -> Self {
    Self { lines: reader.lines(), capturing: false }
  }

  pub fn is_capturing(&self) -> bool { self.capturing }
}

impl LineCamera<BufReader<tokio::io::Stdin>> {
  pub fn stdin() -> Self { Self::new(BufReader::new(tokio::io::stdin())) }
}

impl LineCamera<BufReader<tokio::fs::File>> {
  /// A missing file reads as a missing camera.
  pub async fn open(path: &Path) -> Result<Self, CameraError> {
    match tokio::fs::File::open(path).await {
      Ok(file) => Ok(Self::new(BufReader::new(file))),
      Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => Err(CameraError::AccessDenied),
      Err(_) => Err(CameraError::NotFound),
    }
  }
}

impl<R: AsyncBufRead + Unpin + Send> Camera for LineCamera<R> {
  async fn start(&mut self) -> Result<(), CameraError> {
    self.capturing = true;
    Ok(())
  }

  async fn decode_frame(&mut self) -> Result<Option<String>, CameraError> {
    match self.lines.next_line().await {
      Ok(Some(line)) => {
        let text = line.trim();
        Ok((!text.is_empty()).then(|| text.to_owned()))
      }
      Ok(None) | Err(_) => Err(CameraError::Disconnected),
    }
  }

  fn stop(&mut self) { self.capturing = false; }
}

#[cfg(test)]
mod tests {
  use std::{collections::VecDeque, sync::Arc};

  use cue_core::mark::MarkError;

  use super::*;
  use crate::testing::FakeApi;

  /// Scripted frames; an exhausted script yields empty frames forever.
  #[derive(Default)]
  struct FakeCamera {
    start_error: Option<CameraError>,
    frames:      VecDeque<Result<Option<String>, CameraError>>,
    starts:      usize,
    stops:       usize,
    decodes:     usize,
  }

  impl FakeCamera {
    fn with_frames(frames: &[Option<&str>]) -> Self {
      Self {
        frames: frames.iter().map(|f| Ok(f.map(str::to_owned))).collect(),
        ..Self::default()
      }
    }
  }

  impl Camera for FakeCamera {
    async fn start(&mut self) -> Result<(), CameraError> {
      self.starts += 1;
      match self.start_error {
        Some(e) => Err(e),
        None => Ok(()),
      }
    }

    async fn decode_frame(&mut self) -> Result<Option<String>, CameraError> {
      self.decodes += 1;
      tokio::task::yield_now().await;
      self.frames.pop_front().unwrap_or(Ok(None))
    }

    fn stop(&mut self) { self.stops += 1; }
  }

  #[tokio::test]
  async fn first_decode_stops_capture_and_marks_once() {
    let api    = FakeApi::new();
    let mut cam = FakeCamera::with_frames(&[None, None, Some("abc123"), Some("abc123")]);

    let receipt = scan_and_mark(&mut cam, &api, &CancellationToken::new()).await.unwrap();
    assert_eq!(receipt.session_name, "Lecture 1");
    assert_eq!(cam.decodes, 3);
    assert_eq!(cam.stops, 1);
    assert_eq!(*api.marked.lock().unwrap(), vec!["abc123".to_string()]);
  }

  #[tokio::test]
  async fn missing_camera_is_reported_without_marking() {
    let api = FakeApi::new();
    let mut cam = FakeCamera { start_error: Some(CameraError::NotFound), ..FakeCamera::default() };

    let err = scan_and_mark(&mut cam, &api, &CancellationToken::new()).await.unwrap_err();
    assert!(matches!(err, ScanError::Camera(CameraError::NotFound)));
    assert_eq!(err.to_string(), "no camera available");
    assert_eq!(cam.decodes, 0);
    assert!(api.marked.lock().unwrap().is_empty());
  }

  #[tokio::test]
  async fn lost_stream_still_stops_capture() {
    let api = FakeApi::new();
    let mut cam = FakeCamera::with_frames(&[None]);
    cam.frames.push_back(Err(CameraError::Disconnected));

    let err = scan_and_mark(&mut cam, &api, &CancellationToken::new()).await.unwrap_err();
    assert!(matches!(err, ScanError::Camera(CameraError::Disconnected)));
    assert_eq!(cam.stops, 1);
    assert!(api.marked.lock().unwrap().is_empty());
  }

  #[tokio::test]
  async fn cancellation_ends_an_empty_scan() {
    let api    = Arc::new(FakeApi::new());
    let cancel = CancellationToken::new();
    let mut cam = FakeCamera::default();

    let trigger = cancel.clone();
    tokio::spawn(async move {
      tokio::time::sleep(std::time::Duration::from_millis(20)).await;
      trigger.cancel();
    });

    let err = scan_and_mark(&mut cam, api.as_ref(), &cancel).await.unwrap_err();
    assert!(matches!(err, ScanError::Cancelled));
    assert_eq!(cam.stops, 1);
    assert!(api.marked.lock().unwrap().is_empty());
  }

  #[tokio::test]
  async fn rejection_carries_the_user_message() {
    let api = FakeApi::new().rejecting_marks(MarkError::ExpiredCode);
    let mut cam = FakeCamera::with_frames(&[Some("stale")]);

    let err = scan_and_mark(&mut cam, &api, &CancellationToken::new()).await.unwrap_err();
    assert!(matches!(err, ScanError::Rejected(MarkError::ExpiredCode)));
    assert_eq!(err.to_string(), MarkError::ExpiredCode.user_message());
    assert_eq!(cam.stops, 1);
  }

  #[tokio::test]
  async fn line_camera_skips_blank_frames() {
    let input   = b"\n   \n  c0ffee  \nnext\n";
    let mut cam = LineCamera::new(&input[..]);

    let code = ScanAttempt::start(&mut cam)
      .await
      .unwrap()
      .first_code(&CancellationToken::new())
      .await
      .unwrap();
    assert_eq!(code, "c0ffee");
    assert!(!cam.is_capturing());
  }

  #[tokio::test]
  async fn line_camera_end_of_input_is_disconnect() {
    let mut cam = LineCamera::new(&b"\n"[..]);
    let err = ScanAttempt::start(&mut cam)
      .await
      .unwrap()
      .first_code(&CancellationToken::new())
      .await
      .unwrap_err();
    assert!(matches!(err, ScanError::Camera(CameraError::Disconnected)));
  }
}
