use thiserror::Error;

use crate::models::{Action, AlertPayload, UiState};

#[derive(Error, Debug)]
pub enum SnapError {
    #[error("Cancelled by user")]
    Cancelled,

    #[error("No {0} request is waiting for an answer")]
    NotRequested(&'static str),

    #[error("Camera permission denied")]
    PermissionDenied,

    #[error("Preprocessing error: {0}")]
    Preprocess(String),

    #[error("Recognition error: {0}")]
    Recognition(String),

    #[error("Recognition unavailable: {0}")]
    RecognitionUnavailable(String),

    #[error("Login rejected")]
    LoginRejected,

    #[error("Logout failed: {0}")]
    LogoutFailure(String),

    #[error("Navigation error: {0}")]
    Navigation(String),

    #[error("Action {action:?} is not accepted while {state:?}")]
    InvalidTransition { action: Action, state: UiState },

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl SnapError {
    /// The dialog shown for this failure, or `None` when it stays silent.
    pub fn alert_payload(&self) -> Option<AlertPayload> {
        let (title, message) = match self {
            SnapError::Cancelled => return None,
            SnapError::InvalidTransition { .. } | SnapError::NotRequested(_) => return None,
            SnapError::PermissionDenied => (
                "Camera Permission",
                "Camera access was denied. Allow it in your settings to take photos.",
            ),
            SnapError::Preprocess(_) => (
                "Error",
                "Could not prepare the photo for reading. Try another image.",
            ),
            SnapError::Recognition(_)
            | SnapError::RecognitionUnavailable(_)
            | SnapError::Http(_)
            | SnapError::Json(_)
            | SnapError::Io(_) => ("Error", "Failed to process image. Try again."),
            SnapError::LoginRejected => (
                "Invalid Credentials",
                "The username or password is incorrect. Please try again.",
            ),
            SnapError::LogoutFailure(_) => ("Error", "Failed to log out. Please try again."),
            SnapError::Navigation(_) => ("Error", "Something went wrong. Please try again."),
        };

        Some(AlertPayload::new(title, message))
    }
}

pub type Result<T> = std::result::Result<T, SnapError>;
