use async_trait::async_trait;

use crate::error::Result;
use crate::models::{ImageHandle, RecognitionResult};

/// A text-recognition backend.
///
/// Implementations are interchangeable and chosen when the app is composed.
/// Empty text is a successful result; engine failures are
/// [`SnapError::Recognition`](crate::error::SnapError::Recognition).
#[async_trait]
pub trait TextRecognizer: Send + Sync {
    async fn recognize(&self, image: &ImageHandle) -> Result<RecognitionResult>;

    /// Short backend label for logs.
    fn name(&self) -> &str;
}
