use std::sync::{Mutex, PoisonError};

use tracing::info;

use crate::error::Result;
use crate::models::Screen;

/// Screen navigation collaborator.
pub trait Navigator: Send + Sync {
    /// Push `screen` on top of the current one.
    fn navigate_to(&self, screen: Screen) -> Result<()>;

    /// Swap the current screen for `screen` so "back" cannot return to it.
    /// A stack that already holds `screen` below the top unwinds to it.
    fn replace(&self, screen: Screen) -> Result<()>;
}

/// In-memory navigation stack. Starts on the login screen.
#[derive(Debug)]
pub struct ScreenStack {
    stack: Mutex<Vec<Screen>>,
}

impl Default for ScreenStack {
    fn default() -> Self {
        Self {
            stack: Mutex::new(vec![Screen::Login]),
        }
    }
}

impl ScreenStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Screen {
        self.stack
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .last()
            .copied()
            .unwrap_or(Screen::Login)
    }

    pub fn depth(&self) -> usize {
        self.stack.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

impl Navigator for ScreenStack {
    fn navigate_to(&self, screen: Screen) -> Result<()> {
        info!(%screen, "Navigating");
        self.stack
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(screen);
        Ok(())
    }

    fn replace(&self, screen: Screen) -> Result<()> {
        info!(%screen, "Replacing current screen");
        let mut stack = self.stack.lock().unwrap_or_else(PoisonError::into_inner);
        stack.pop();
        match stack.iter().position(|s| *s == screen) {
            Some(at) => stack.truncate(at + 1),
            None => stack.push(screen),
        }
        Ok(())
    }
}
