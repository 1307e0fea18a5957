use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use crate::alert::AlertPresenter;
use crate::config::SessionConfig;
use crate::error::{Result, SnapError};
use crate::models::Screen;
use crate::navigation::Navigator;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LoginOutcome {
    Accepted,
    Rejected,
}

/// Credential check in front of the home screen.
///
/// Holds no session state of its own; acceptance only navigates.
pub struct SessionGate {
    credentials: SessionConfig,
    navigator: Arc<dyn Navigator>,
    alerts: Arc<dyn AlertPresenter>,
}

impl SessionGate {
    pub fn new(
        credentials: &SessionConfig,
        navigator: Arc<dyn Navigator>,
        alerts: Arc<dyn AlertPresenter>,
    ) -> Self {
        Self {
            credentials: credentials.clone(),
            navigator,
            alerts,
        }
    }

    /// Whether the login form may be submitted at all.
    pub fn can_submit(username: &str, password: &str) -> bool {
        !username.trim().is_empty() && !password.trim().is_empty()
    }

    /// Compare trimmed credentials against the configured pair.
    ///
    /// Rejection shows the invalid-credentials alert and stays on the login
    /// screen. Errors only come from the navigator.
    pub fn submit(&self, username: &str, password: &str) -> Result<LoginOutcome> {
        let username = username.trim();
        let password = password.trim();

        if username == self.credentials.username && password == self.credentials.password {
            if let Err(e) = self.navigator.navigate_to(Screen::Home) {
                if let Some(payload) = e.alert_payload() {
                    self.alerts.show(payload);
                }
                return Err(e);
            }
            info!(username, "Login accepted");
            return Ok(LoginOutcome::Accepted);
        }

        warn!(username, "Login rejected");
        if let Some(payload) = SnapError::LoginRejected.alert_payload() {
            self.alerts.show(payload);
        }
        Ok(LoginOutcome::Rejected)
    }
}
