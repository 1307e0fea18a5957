use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{watch, Mutex};
use tracing::{debug, info, warn};

use crate::alert::AlertPresenter;
use crate::capture::{CameraPermission, ImageSource, PermissionStatus};
use crate::error::{Result, SnapError};
use crate::models::{
    Acquisition, Action, ImageHandle, RecognitionResult, Screen, UiState, TEXT_PLACEHOLDER,
};
use crate::navigation::Navigator;
use crate::ocr::{ImagePreprocessor, TextRecognizer};

/// How a capture action ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The result is now displayed.
    Recognized(RecognitionResult),
    /// The user backed out of the picker or camera.
    Cancelled,
    /// A newer capture or a logout superseded this one; nothing changed.
    Discarded,
}

/// Point-in-time view of the controller for rendering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ControllerSnapshot {
    pub state: UiState,
    pub session_active: bool,
    pub image: Option<ImageHandle>,
    pub processing: Option<ImageHandle>,
    pub text: Option<String>,
    pub displayed_text: String,
}

struct Pending {
    seq: u64,
    image: ImageHandle,
}

struct Shown {
    image: ImageHandle,
    result: RecognitionResult,
}

struct ControllerState {
    mode: UiState,
    /// Latest issued recognition sequence number.
    seq: u64,
    pending: Option<Pending>,
    shown: Option<Shown>,
    camera_permission: Option<PermissionStatus>,
    session_active: bool,
    notify: watch::Sender<UiState>,
}

impl ControllerState {
    fn set_mode(&mut self, mode: UiState) {
        if self.mode != mode {
            debug!(from = %self.mode, to = %mode, "UI state transition");
        }
        self.mode = mode;
        self.notify.send_replace(mode);
    }

    /// Where the controller settles once nothing transient is on screen.
    fn resting_mode(&self) -> UiState {
        if self.pending.is_some() {
            UiState::Processing
        } else if self.shown.is_some() {
            UiState::ResultReady
        } else {
            UiState::Idle
        }
    }

    fn ensure(&self, action: Action) -> Result<()> {
        if self.session_active && self.mode.accepts(action) {
            return Ok(());
        }
        warn!(?action, state = %self.mode, session_active = self.session_active, "Rejected action");
        Err(SnapError::InvalidTransition {
            action,
            state: self.mode,
        })
    }

    fn is_current(&self, seq: u64) -> bool {
        self.session_active && self.seq == seq
    }

    fn reset(&mut self) {
        self.pending = None;
        self.shown = None;
        self.camera_permission = None;
        self.set_mode(UiState::Idle);
    }

    fn display_text(&self) -> String {
        self.shown
            .as_ref()
            .filter(|s| !s.result.is_empty())
            .map(|s| s.result.text.clone())
            .unwrap_or_else(|| TEXT_PLACEHOLDER.to_string())
    }
}

struct Inner {
    images: Arc<dyn ImageSource>,
    permission: Arc<dyn CameraPermission>,
    recognizer: Arc<dyn TextRecognizer>,
    preprocessor: Option<ImagePreprocessor>,
    alerts: Arc<dyn AlertPresenter>,
    navigator: Arc<dyn Navigator>,
    state: Mutex<ControllerState>,
    state_rx: watch::Receiver<UiState>,
}

/// Coordinates image acquisition, recognition and what the home screen shows.
///
/// Every recognition is tagged with a sequence number when it starts. Only a
/// result whose number is still the latest one issued is applied, so a slow
/// recognition that finishes after a newer capture is dropped. Logging out
/// bumps the number as well.
///
/// The handle is cheap to clone; actions can run concurrently and the state
/// lock is never held while a collaborator is awaited.
#[derive(Clone)]
pub struct CaptureController {
    inner: Arc<Inner>,
}

impl CaptureController {
    pub fn new(
        images: Arc<dyn ImageSource>,
        permission: Arc<dyn CameraPermission>,
        recognizer: Arc<dyn TextRecognizer>,
        preprocessor: Option<ImagePreprocessor>,
        alerts: Arc<dyn AlertPresenter>,
        navigator: Arc<dyn Navigator>,
    ) -> Self {
        let (notify, state_rx) = watch::channel(UiState::Idle);

        Self {
            inner: Arc::new(Inner {
                images,
                permission,
                recognizer,
                preprocessor,
                alerts,
                navigator,
                state: Mutex::new(ControllerState {
                    mode: UiState::Idle,
                    seq: 0,
                    pending: None,
                    shown: None,
                    camera_permission: None,
                    session_active: false,
                    notify,
                }),
                state_rx,
            }),
        }
    }

    /// Enter a fresh logged-in context.
    pub async fn begin_session(&self) {
        let mut st = self.inner.state.lock().await;
        st.seq += 1;
        st.session_active = true;
        st.reset();
        info!("Session started");
    }

    /// Select an image from the gallery and recognize it.
    pub async fn pick_image(&self) -> Result<Outcome> {
        self.inner.state.lock().await.ensure(Action::PickImage)?;

        match self.inner.images.request_from_gallery().await {
            Ok(Acquisition::Image(image)) => self.process(image, false).await,
            Ok(Acquisition::Cancelled) | Err(SnapError::Cancelled) => {
                debug!("Gallery pick cancelled");
                Ok(Outcome::Cancelled)
            }
            Err(e) => Err(self.report(e)),
        }
    }

    /// Open the camera, wait for the shutter, then normalize and recognize
    /// the capture.
    pub async fn open_camera(&self) -> Result<Outcome> {
        self.ensure_camera_permission().await?;

        {
            let mut st = self.inner.state.lock().await;
            st.ensure(Action::OpenCamera)?;
            st.set_mode(UiState::CameraActive);
        }
        info!("Camera opened");

        let acquired = self.inner.images.request_from_camera().await;

        let mut st = self.inner.state.lock().await;
        match acquired {
            Ok(Acquisition::Image(image)) => {
                if st.ensure(Action::Shutter).is_err() {
                    return Ok(Outcome::Discarded);
                }
                drop(st);
                self.process(image, true).await
            }
            Ok(Acquisition::Cancelled) | Err(SnapError::Cancelled) => {
                if st.mode == UiState::CameraActive {
                    let resting = st.resting_mode();
                    st.set_mode(resting);
                }
                debug!("Camera closed without a capture");
                Ok(Outcome::Cancelled)
            }
            Err(e) => {
                if st.mode == UiState::CameraActive {
                    let resting = st.resting_mode();
                    st.set_mode(resting);
                }
                drop(st);
                Err(self.report(e))
            }
        }
    }

    /// Leave the home screen. Any recognition still in flight is invalidated.
    pub async fn logout(&self) -> Result<()> {
        self.inner.state.lock().await.ensure(Action::Logout)?;

        if let Err(e) = self.inner.navigator.replace(Screen::Login) {
            return Err(self.report(SnapError::LogoutFailure(e.to_string())));
        }

        let mut st = self.inner.state.lock().await;
        st.seq += 1;
        st.session_active = false;
        st.reset();
        info!("Logged out");
        Ok(())
    }

    /// Dismiss the visible alert. Returns `false` when there was none.
    pub async fn dismiss_alert(&self) -> bool {
        if !self.inner.alerts.is_visible() {
            return false;
        }
        self.inner.alerts.dismiss();

        let mut st = self.inner.state.lock().await;
        if st.mode == UiState::Failed {
            let resting = st.resting_mode();
            st.set_mode(resting);
        }
        true
    }

    pub async fn ui_state(&self) -> UiState {
        self.inner.state.lock().await.mode
    }

    pub async fn is_session_active(&self) -> bool {
        self.inner.state.lock().await.session_active
    }

    /// The extracted text, or a placeholder when there is none to show.
    pub async fn display_text(&self) -> String {
        self.inner.state.lock().await.display_text()
    }

    pub async fn current_result(&self) -> Option<RecognitionResult> {
        let st = self.inner.state.lock().await;
        st.shown.as_ref().map(|s| s.result.clone())
    }

    pub async fn current_image(&self) -> Option<ImageHandle> {
        let st = self.inner.state.lock().await;
        st.shown.as_ref().map(|s| s.image.clone())
    }

    pub async fn snapshot(&self) -> ControllerSnapshot {
        let st = self.inner.state.lock().await;
        ControllerSnapshot {
            state: st.mode,
            session_active: st.session_active,
            image: st.shown.as_ref().map(|s| s.image.clone()),
            processing: st.pending.as_ref().map(|p| p.image.clone()),
            text: st.shown.as_ref().map(|s| s.result.text.clone()),
            displayed_text: st.display_text(),
        }
    }

    /// Observe UI state transitions.
    pub fn watch_state(&self) -> watch::Receiver<UiState> {
        self.inner.state_rx.clone()
    }

    /// The permission prompt runs once per session. A denial is alerted the
    /// first time only; later attempts fail silently.
    async fn ensure_camera_permission(&self) -> Result<()> {
        let cached = {
            let st = self.inner.state.lock().await;
            st.ensure(Action::OpenCamera)?;
            st.camera_permission
        };

        match cached {
            Some(PermissionStatus::Granted) => Ok(()),
            Some(PermissionStatus::Denied) => {
                debug!("Camera permission was denied earlier in this session");
                Err(SnapError::PermissionDenied)
            }
            None => {
                let status = self.inner.permission.request_camera_permission().await;
                self.inner.state.lock().await.camera_permission = Some(status);
                info!(?status, "Camera permission checked");

                match status {
                    PermissionStatus::Granted => Ok(()),
                    PermissionStatus::Denied => Err(self.report(SnapError::PermissionDenied)),
                }
            }
        }
    }

    async fn process(&self, image: ImageHandle, preprocess: bool) -> Result<Outcome> {
        let seq = {
            let mut st = self.inner.state.lock().await;
            if !st.session_active {
                return Ok(Outcome::Discarded);
            }
            st.seq += 1;
            let seq = st.seq;
            st.pending = Some(Pending {
                seq,
                image: image.clone(),
            });
            st.set_mode(UiState::Processing);
            seq
        };
        info!(seq, %image, backend = self.inner.recognizer.name(), "Recognition started");

        let normalized = match (&self.inner.preprocessor, preprocess) {
            (Some(preprocessor), true) => {
                match preprocessor.normalize_blocking(image.clone()).await {
                    Ok(normalized) => Some(normalized),
                    Err(e) => return self.settle(seq, image, Err(e)).await,
                }
            }
            _ => None,
        };

        let input = normalized.as_ref().unwrap_or(&image);
        let result = self.run_engine(seq, input).await;
        if let Some(normalized) = normalized {
            remove_scratch(&normalized).await;
        }

        match result {
            Some(result) => self.settle(seq, image, result).await,
            None => Ok(Outcome::Discarded),
        }
    }

    /// Run the engine unless `seq` was superseded while preprocessing.
    async fn run_engine(&self, seq: u64, input: &ImageHandle) -> Option<Result<RecognitionResult>> {
        if !self.inner.state.lock().await.is_current(seq) {
            debug!(seq, "Superseded before recognition, skipping engine call");
            return None;
        }

        Some(match self.inner.recognizer.recognize(input).await {
            Ok(result) if result.succeeded => Ok(result),
            Ok(_) => Err(SnapError::Recognition(format!(
                "{} could not read {input}",
                self.inner.recognizer.name()
            ))),
            Err(e) => Err(e),
        })
    }

    /// Apply a finished recognition if it is still the latest one.
    async fn settle(
        &self,
        seq: u64,
        image: ImageHandle,
        result: Result<RecognitionResult>,
    ) -> Result<Outcome> {
        let mut st = self.inner.state.lock().await;
        if !st.is_current(seq) {
            debug!(seq, latest = st.seq, "Dropping superseded recognition result");
            return Ok(Outcome::Discarded);
        }

        st.pending = None;
        let keep_camera = st.mode == UiState::CameraActive;

        match result {
            Ok(result) => {
                info!(seq, %image, chars = result.text.len(), "Recognition applied");
                st.shown = Some(Shown {
                    image,
                    result: result.clone(),
                });
                if !keep_camera {
                    st.set_mode(UiState::ResultReady);
                }
                Ok(Outcome::Recognized(result))
            }
            Err(e) => {
                if !keep_camera {
                    st.set_mode(UiState::Failed);
                }
                drop(st);
                Err(self.report(e))
            }
        }
    }

    fn report(&self, err: SnapError) -> SnapError {
        if let Some(payload) = err.alert_payload() {
            self.inner.alerts.show(payload);
        }
        err
    }
}

async fn remove_scratch(image: &ImageHandle) {
    if let Err(e) = tokio::fs::remove_file(image.path()).await {
        warn!(%image, error = %e, "Failed to remove normalized image");
    }
}
