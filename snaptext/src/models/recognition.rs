use serde::{Deserialize, Serialize};

/// Text shown when no result exists or the recognized text is empty.
pub const TEXT_PLACEHOLDER: &str = "No text yet";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecognitionResult {
    pub text: String,
    pub succeeded: bool,
}

impl RecognitionResult {
    pub fn success(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            succeeded: true,
        }
    }

    pub fn failure() -> Self {
        Self {
            text: String::new(),
            succeeded: false,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty()
    }
}
