//! Alert dialog contract and the in-memory single-slot modal.

use std::sync::{Mutex, PoisonError};

use tracing::{debug, error};

use crate::models::AlertPayload;

/// Dismissible title/message dialog. Only one alert is visible at a time.
pub trait AlertPresenter: Send + Sync {
    /// Show `payload`, replacing whatever alert is currently visible.
    fn show(&self, payload: AlertPayload);

    /// Hide the visible alert. No-op when nothing is visible.
    fn dismiss(&self);

    fn current(&self) -> Option<AlertPayload>;

    fn is_visible(&self) -> bool {
        self.current().is_some()
    }
}

#[derive(Debug, Default)]
pub struct AlertModal {
    slot: Mutex<Option<AlertPayload>>,
}

impl AlertModal {
    pub fn new() -> Self {
        Self::default()
    }
}

impl AlertPresenter for AlertModal {
    fn show(&self, payload: AlertPayload) {
        error!(title = %payload.title, "{}", payload.message);
        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        *slot = Some(payload);
    }

    fn dismiss(&self) {
        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(payload) = slot.take() {
            debug!(title = %payload.title, "Alert dismissed");
        }
    }

    fn current(&self) -> Option<AlertPayload> {
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}
