use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum UiState {
    #[default]
    Idle,
    CameraActive,
    Processing,
    ResultReady,
    Failed,
}

/// Inputs of the controller's transition table.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    OpenCamera,
    PickImage,
    Shutter,
    CancelCamera,
    Logout,
}

impl UiState {
    /// Transition table. Anything not listed here is rejected.
    pub fn accepts(self, action: Action) -> bool {
        use Action::*;

        match self {
            UiState::CameraActive => matches!(action, Shutter | CancelCamera),
            UiState::Idle | UiState::Processing | UiState::ResultReady | UiState::Failed => {
                matches!(action, OpenCamera | PickImage | Logout)
            }
        }
    }
}

impl std::fmt::Display for UiState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::CameraActive => write!(f, "camera_active"),
            Self::Processing => write!(f, "processing"),
            Self::ResultReady => write!(f, "result_ready"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Fixed navigator destinations.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Screen {
    Login,
    Home,
}

impl std::fmt::Display for Screen {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Login => write!(f, "Login"),
            Self::Home => write!(f, "Home"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertPayload {
    pub title: String,
    pub message: String,
}

impl AlertPayload {
    pub fn new(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            message: message.into(),
        }
    }
}
