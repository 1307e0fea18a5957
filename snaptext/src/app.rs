use std::sync::Arc;

use crate::alert::{AlertModal, AlertPresenter};
use crate::capture::{CameraPermission, ImageSource, StaticPermission};
use crate::config::Config;
use crate::error::Result;
use crate::models::{AlertPayload, Screen};
use crate::navigation::ScreenStack;
use crate::ocr::{ImagePreprocessor, OcrProvider, TextRecognizer};
use crate::services::{CaptureController, LoginOutcome, SessionGate};

/// Wires the login gate and the capture controller to one alert modal and
/// one navigator.
#[derive(Clone)]
pub struct App {
    pub config: Arc<Config>,
    pub alerts: Arc<AlertModal>,
    pub navigator: Arc<ScreenStack>,
    pub gate: Arc<SessionGate>,
    pub controller: CaptureController,
}

impl App {
    pub fn new(
        config: Config,
        images: Arc<dyn ImageSource>,
        permission: Arc<dyn CameraPermission>,
        recognizer: Arc<dyn TextRecognizer>,
    ) -> Self {
        let config = Arc::new(config);
        let alerts = Arc::new(AlertModal::new());
        let navigator = Arc::new(ScreenStack::new());

        let gate = Arc::new(SessionGate::new(
            &config.session,
            navigator.clone(),
            alerts.clone(),
        ));
        let controller = CaptureController::new(
            images,
            permission,
            recognizer,
            Some(ImagePreprocessor::new(&config.preprocess)),
            alerts.clone(),
            navigator.clone(),
        );

        Self {
            config,
            alerts,
            navigator,
            gate,
            controller,
        }
    }

    /// Build with the configured OCR backend and camera permission.
    pub fn from_config(config: Config, images: Arc<dyn ImageSource>) -> Result<Self> {
        let ocr = OcrProvider::new(&config.ocr)?;
        let permission = Arc::new(StaticPermission::new(config.camera.permission_granted));
        Ok(Self::new(config, images, permission, Arc::new(ocr)))
    }

    /// Submit the login form; acceptance starts a fresh capture session.
    pub async fn login(&self, username: &str, password: &str) -> Result<LoginOutcome> {
        let outcome = self.gate.submit(username, password)?;
        if outcome == LoginOutcome::Accepted {
            self.controller.begin_session().await;
        }
        Ok(outcome)
    }

    pub fn screen(&self) -> Screen {
        self.navigator.current()
    }

    pub fn alert(&self) -> Option<AlertPayload> {
        self.alerts.current()
    }

    pub async fn dismiss_alert(&self) -> bool {
        self.controller.dismiss_alert().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::picker_channel;
    use crate::models::{ImageHandle, RecognitionResult, UiState};
    use async_trait::async_trait;

    struct FixedRecognizer;

    #[async_trait]
    impl TextRecognizer for FixedRecognizer {
        async fn recognize(&self, _image: &ImageHandle) -> Result<RecognitionResult> {
            Ok(RecognitionResult::success("fixed"))
        }

        fn name(&self) -> &str {
            "fixed"
        }
    }

    fn create_test_app() -> App {
        let (_picker, source) = picker_channel();
        App::new(
            Config::default(),
            Arc::new(source),
            Arc::new(StaticPermission::new(true)),
            Arc::new(FixedRecognizer),
        )
    }

    #[tokio::test]
    async fn test_login_starts_session() {
        let app = create_test_app();
        assert_eq!(app.screen(), Screen::Login);

        let outcome = app.login("User", "Password").await.unwrap();
        assert_eq!(outcome, LoginOutcome::Accepted);
        assert_eq!(app.screen(), Screen::Home);
        assert!(app.controller.is_session_active().await);
        assert_eq!(app.controller.ui_state().await, UiState::Idle);
    }

    #[tokio::test]
    async fn test_rejected_login_keeps_controller_inactive() {
        let app = create_test_app();

        let outcome = app.login("User", "nope").await.unwrap();
        assert_eq!(outcome, LoginOutcome::Rejected);
        assert!(!app.controller.is_session_active().await);
        assert!(app.alert().is_some());

        assert!(app.dismiss_alert().await);
        assert!(app.alert().is_none());
        assert!(!app.dismiss_alert().await);
    }

    #[tokio::test]
    async fn test_logout_returns_to_login() {
        let app = create_test_app();
        app.login("User", "Password").await.unwrap();

        app.controller.logout().await.unwrap();
        assert_eq!(app.screen(), Screen::Login);
        assert!(!app.controller.is_session_active().await);
    }
}
