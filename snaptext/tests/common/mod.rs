// Common test utilities for integration tests
#![allow(dead_code)]

use std::collections::VecDeque;
use std::future::Future;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Once};

use async_trait::async_trait;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use tempfile::TempDir;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use snaptext::alert::{AlertModal, AlertPresenter};
use snaptext::capture::{picker_channel, CameraPermission, PermissionStatus, PickerHandle};
use snaptext::config::PreprocessConfig;
use snaptext::error::{Result, SnapError};
use snaptext::models::{AlertPayload, ImageHandle, RecognitionResult, Screen};
use snaptext::navigation::{Navigator, ScreenStack};
use snaptext::ocr::{ImagePreprocessor, TextRecognizer};
use snaptext::services::{CaptureController, Outcome};

static INIT: Once = Once::new();

/// Initialize tracing subscriber once for tests
pub fn init_test_logger() {
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// Write a striped RGB PNG so the preprocessor has real content to stretch.
pub fn write_png(dir: &Path, name: &str, width: u32, height: u32) -> ImageHandle {
    let img = RgbImage::from_fn(width, height, |x, _| {
        if (x / 8) % 2 == 0 {
            Rgb([20, 20, 20])
        } else {
            Rgb([230, 230, 230])
        }
    });
    let path = dir.join(name);
    DynamicImage::ImageRgb8(img)
        .save_with_format(&path, ImageFormat::Png)
        .unwrap_or_else(|e| panic!("Failed to write fixture '{name}': {e}"));
    ImageHandle::new(path)
}

pub fn write_corrupt(dir: &Path, name: &str) -> ImageHandle {
    let path = dir.join(name);
    std::fs::write(&path, b"definitely not an image").expect("Failed to write corrupt fixture");
    ImageHandle::new(path)
}

/// Recognizer whose calls block until the test releases them, in call order.
pub struct GatedRecognizer {
    gates: Mutex<VecDeque<oneshot::Receiver<Result<RecognitionResult>>>>,
    started: mpsc::UnboundedSender<ImageHandle>,
}

impl GatedRecognizer {
    /// The receiver reports each image as its recognition starts.
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<ImageHandle>) {
        let (started, rx) = mpsc::unbounded_channel();
        let recognizer = Arc::new(Self {
            gates: Mutex::new(VecDeque::new()),
            started,
        });
        (recognizer, rx)
    }

    /// Queue the gate for the next recognition call.
    pub fn gate(&self) -> oneshot::Sender<Result<RecognitionResult>> {
        let (tx, rx) = oneshot::channel();
        self.gates.lock().unwrap().push_back(rx);
        tx
    }
}

#[async_trait]
impl TextRecognizer for GatedRecognizer {
    async fn recognize(&self, image: &ImageHandle) -> Result<RecognitionResult> {
        let gate = self.gates.lock().unwrap().pop_front();
        let _ = self.started.send(image.clone());

        match gate {
            Some(gate) => gate
                .await
                .unwrap_or_else(|_| Err(SnapError::Recognition("gate dropped".to_string()))),
            None => Err(SnapError::Recognition("no gate queued".to_string())),
        }
    }

    fn name(&self) -> &str {
        "gated"
    }
}

/// Recognizer that answers every call the same way.
pub enum FixedRecognizer {
    Text(String),
    Unsuccessful,
    Failing,
}

impl FixedRecognizer {
    pub fn text(text: &str) -> Arc<Self> {
        Arc::new(Self::Text(text.to_string()))
    }
}

#[async_trait]
impl TextRecognizer for FixedRecognizer {
    async fn recognize(&self, _image: &ImageHandle) -> Result<RecognitionResult> {
        match self {
            Self::Text(text) => Ok(RecognitionResult::success(text.clone())),
            Self::Unsuccessful => Ok(RecognitionResult::failure()),
            Self::Failing => Err(SnapError::Recognition("engine exploded".to_string())),
        }
    }

    fn name(&self) -> &str {
        "fixed"
    }
}

pub struct CountingPermission {
    status: PermissionStatus,
    calls: AtomicUsize,
}

impl CountingPermission {
    pub fn new(status: PermissionStatus) -> Arc<Self> {
        Arc::new(Self {
            status,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CameraPermission for CountingPermission {
    async fn request_camera_permission(&self) -> PermissionStatus {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.status
    }
}

/// Alert modal that also remembers every alert it was asked to show.
#[derive(Default)]
pub struct RecordingAlerts {
    modal: AlertModal,
    history: Mutex<Vec<AlertPayload>>,
}

impl RecordingAlerts {
    pub fn history(&self) -> Vec<AlertPayload> {
        self.history.lock().unwrap().clone()
    }
}

impl AlertPresenter for RecordingAlerts {
    fn show(&self, payload: AlertPayload) {
        self.history.lock().unwrap().push(payload.clone());
        self.modal.show(payload);
    }

    fn dismiss(&self) {
        self.modal.dismiss();
    }

    fn current(&self) -> Option<AlertPayload> {
        self.modal.current()
    }
}

/// Navigator whose `replace` always fails.
#[derive(Default)]
pub struct FailingNavigator;

impl Navigator for FailingNavigator {
    fn navigate_to(&self, _screen: Screen) -> Result<()> {
        Ok(())
    }

    fn replace(&self, screen: Screen) -> Result<()> {
        Err(SnapError::Navigation(format!("cannot replace with {screen}")))
    }
}

pub struct Harness {
    pub controller: CaptureController,
    pub picker: PickerHandle,
    pub alerts: Arc<RecordingAlerts>,
    pub permission: Arc<CountingPermission>,
    pub dir: TempDir,
}

impl Harness {
    /// Pick `image` from the gallery once the picker is open.
    pub async fn pick(&self, image: impl Into<ImageHandle>) -> Result<Outcome> {
        let image = image.into();
        answer_when_open(
            self.controller.pick_image(),
            self.picker.gallery_requested(),
            || self.picker.pick(image),
        )
        .await
    }

    pub async fn cancel_pick(&self) -> Result<Outcome> {
        answer_when_open(
            self.controller.pick_image(),
            self.picker.gallery_requested(),
            || self.picker.cancel_gallery(),
        )
        .await
    }

    /// Open the camera and press the shutter on `image`.
    pub async fn capture(&self, image: impl Into<ImageHandle>) -> Result<Outcome> {
        let image = image.into();
        answer_when_open(
            self.controller.open_camera(),
            self.picker.camera_requested(),
            || self.picker.shutter(image),
        )
        .await
    }

    pub async fn cancel_capture(&self) -> Result<Outcome> {
        answer_when_open(
            self.controller.open_camera(),
            self.picker.camera_requested(),
            || self.picker.cancel_camera(),
        )
        .await
    }

    /// Spawn a gallery pick and answer it; the task is left to finish.
    pub async fn spawn_pick(&self, image: impl Into<ImageHandle>) -> JoinHandle<Result<Outcome>> {
        let controller = self.controller.clone();
        let task = tokio::spawn(async move { controller.pick_image().await });
        self.picker.gallery_requested().await;
        self.picker.pick(image).expect("gallery request should be open");
        task
    }

    pub fn scratch_files(&self) -> usize {
        match std::fs::read_dir(self.dir.path().join("scratch")) {
            Ok(entries) => entries.count(),
            Err(_) => 0,
        }
    }
}

/// Drive `action` and answer its picker request, unless the action finishes
/// without opening one.
async fn answer_when_open<F, R, A>(action: F, requested: R, answer: A) -> Result<Outcome>
where
    F: Future<Output = Result<Outcome>>,
    R: Future<Output = ()>,
    A: FnOnce() -> Result<()>,
{
    tokio::pin!(action);
    tokio::select! {
        outcome = &mut action => return outcome,
        _ = requested => answer().expect("picker request should be open"),
    }
    action.await
}

pub fn create_preprocess_config(scratch: &Path) -> PreprocessConfig {
    PreprocessConfig {
        target_width: 256,
        min_image_dimension: 32,
        grayscale: true,
        scratch_dir: scratch.to_path_buf(),
    }
}

pub fn harness(recognizer: Arc<dyn TextRecognizer>, status: PermissionStatus) -> Harness {
    harness_with_navigator(recognizer, status, Arc::new(ScreenStack::new()))
}

pub fn harness_with_navigator(
    recognizer: Arc<dyn TextRecognizer>,
    status: PermissionStatus,
    navigator: Arc<dyn Navigator>,
) -> Harness {
    init_test_logger();

    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let (picker, source) = picker_channel();
    let alerts = Arc::new(RecordingAlerts::default());
    let permission = CountingPermission::new(status);
    let preprocessor = ImagePreprocessor::new(&create_preprocess_config(&dir.path().join("scratch")));

    let controller = CaptureController::new(
        Arc::new(source),
        permission.clone(),
        recognizer,
        Some(preprocessor),
        alerts.clone(),
        navigator,
    );

    Harness {
        controller,
        picker,
        alerts,
        permission,
        dir,
    }
}
