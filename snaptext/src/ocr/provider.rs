use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use leptess::LepTess;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::config::{parse_ocr_provider_model, OcrConfig};
use crate::error::{Result, SnapError};
use crate::models::{ImageHandle, RecognitionResult};

use super::api::{VisionApiClient, VisionVendor};
use super::recognizer::TextRecognizer;

enum OcrBackend {
    Local { tesseract: Arc<Mutex<LepTess>> },
    Api { client: VisionApiClient },
    Unavailable { reason: String },
}

/// Recognizer that picks its engine from [`OcrConfig::model`].
///
/// `local/...` (or any unknown prefix) runs Tesseract in-process; `openai/`,
/// `mistral/` and `deepseek/` go to the hosted vision endpoint. A backend
/// that fails to initialise leaves the provider unavailable instead of
/// failing startup.
pub struct OcrProvider {
    backend: OcrBackend,
    config: OcrConfig,
}

/// Printed English is the only supported script.
const TESSERACT_LANGUAGE: &str = "eng";

fn create_tesseract() -> std::result::Result<LepTess, String> {
    LepTess::new(None, TESSERACT_LANGUAGE).map_err(|e| e.to_string())
}

impl OcrProvider {
    pub fn new(config: &OcrConfig) -> Result<Self> {
        let (prefix, _) = parse_ocr_provider_model(&config.model);

        let backend = match VisionVendor::from_prefix(prefix) {
            Some(vendor) => match VisionApiClient::new(config) {
                Ok(client) => {
                    info!(model = %client.model(), "{} backend initialized", vendor.label());
                    OcrBackend::Api { client }
                }
                Err(e) => {
                    let reason = format!("{} backend unavailable: {e}", vendor.label());
                    warn!("{}", reason);
                    OcrBackend::Unavailable { reason }
                }
            },
            None => match create_tesseract() {
                Ok(lt) => {
                    info!(language = TESSERACT_LANGUAGE, "Tesseract OCR initialized");
                    OcrBackend::Local {
                        tesseract: Arc::new(Mutex::new(lt)),
                    }
                }
                Err(e) => {
                    let reason = format!("Tesseract not available: {e}");
                    warn!("{}", reason);
                    OcrBackend::Unavailable { reason }
                }
            },
        };

        Ok(Self {
            backend,
            config: config.clone(),
        })
    }

    pub fn is_available(&self) -> bool {
        !matches!(self.backend, OcrBackend::Unavailable { .. })
    }

    async fn ocr(&self, image_bytes: &[u8]) -> Result<String> {
        let timeout_duration = Duration::from_secs(self.config.timeout_secs);

        match tokio::time::timeout(timeout_duration, self.ocr_internal(image_bytes)).await {
            Ok(inner_result) => inner_result,
            Err(_) => Err(SnapError::Recognition(format!(
                "OCR operation timed out after {} seconds",
                self.config.timeout_secs
            ))),
        }
    }

    async fn ocr_internal(&self, image_bytes: &[u8]) -> Result<String> {
        match &self.backend {
            OcrBackend::Local { tesseract } => {
                let bytes = image_bytes.to_vec();
                let tesseract = Arc::clone(tesseract);

                let text = tokio::task::spawn_blocking(move || {
                    let mut lt = tesseract.blocking_lock();
                    lt.set_image_from_mem(&bytes)
                        .map_err(|e| SnapError::Recognition(format!("Failed to set image: {e}")))?;
                    lt.get_utf8_text().map_err(|e| {
                        SnapError::Recognition(format!("Failed to extract text: {e}"))
                    })
                })
                .await
                .map_err(|e| SnapError::Recognition(format!("OCR task panicked: {e}")))??;

                Ok(text)
            }
            OcrBackend::Api { client } => client.ocr(image_bytes).await,
            OcrBackend::Unavailable { reason } => {
                Err(SnapError::RecognitionUnavailable(reason.clone()))
            }
        }
    }
}

#[async_trait]
impl TextRecognizer for OcrProvider {
    async fn recognize(&self, image: &ImageHandle) -> Result<RecognitionResult> {
        if let OcrBackend::Unavailable { reason } = &self.backend {
            return Err(SnapError::RecognitionUnavailable(reason.clone()));
        }

        let bytes = tokio::fs::read(image.path())
            .await
            .map_err(|e| SnapError::Recognition(format!("Failed to read image {image}: {e}")))?;

        let text = self.ocr(&bytes).await?;
        let text = text.trim();
        debug!(backend = self.name(), chars = text.len(), %image, "Recognition finished");

        Ok(RecognitionResult::success(text))
    }

    fn name(&self) -> &str {
        match &self.backend {
            OcrBackend::Local { .. } => "tesseract",
            OcrBackend::Api { client } => client.vendor().label(),
            OcrBackend::Unavailable { .. } => "unavailable",
        }
    }
}

impl Clone for OcrProvider {
    fn clone(&self) -> Self {
        let backend = match &self.backend {
            OcrBackend::Local { tesseract } => OcrBackend::Local {
                tesseract: Arc::clone(tesseract),
            },
            OcrBackend::Api { client } => OcrBackend::Api {
                client: client.clone(),
            },
            OcrBackend::Unavailable { reason } => OcrBackend::Unavailable {
                reason: reason.clone(),
            },
        };

        Self {
            backend,
            config: self.config.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_config(model: &str, api_key: Option<&str>) -> OcrConfig {
        OcrConfig {
            model: model.to_string(),
            api_key: api_key.map(String::from),
            base_url: None,
            timeout_secs: 60,
        }
    }

    fn unavailable(reason: &str) -> OcrProvider {
        OcrProvider {
            backend: OcrBackend::Unavailable {
                reason: reason.to_string(),
            },
            config: make_config("local/tesseract", None),
        }
    }

    #[test]
    fn test_ocr_provider_graceful_degradation() {
        let result = OcrProvider::new(&make_config("local/tesseract", None));
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_unavailable_backend_fails_recognition() {
        let provider = unavailable("Test unavailable");

        let result = provider.recognize(&ImageHandle::from("/nope.png")).await;
        assert!(matches!(result, Err(SnapError::RecognitionUnavailable(_))));
    }

    #[test]
    fn test_hosted_model_without_api_key_falls_back_to_unavailable() {
        for model in ["openai/gpt-4o", "mistral/pixtral-12b-2409", "deepseek/deepseek-vl"] {
            let provider = OcrProvider::new(&make_config(model, None)).unwrap();
            assert!(!provider.is_available(), "{model}");
            assert_eq!(provider.name(), "unavailable");
        }
    }

    #[test]
    fn test_hosted_model_with_api_key_is_available() {
        let provider = OcrProvider::new(&make_config("openai/gpt-4o", Some("test-key"))).unwrap();
        assert!(provider.is_available());
        assert_eq!(provider.name(), "OpenAI Vision");
    }

    #[test]
    fn test_clone_keeps_backend() {
        let provider = OcrProvider::new(&make_config("mistral/pixtral-12b-2409", None)).unwrap();
        let cloned = provider.clone();
        assert_eq!(provider.is_available(), cloned.is_available());
        assert_eq!(provider.name(), cloned.name());
    }

    #[tokio::test]
    async fn test_missing_file_is_recognition_error() {
        let provider = OcrProvider::new(&make_config("openai/gpt-4o", Some("test-key"))).unwrap();

        let result = provider
            .recognize(&ImageHandle::from("/definitely/not/here.png"))
            .await;
        assert!(matches!(result, Err(SnapError::Recognition(_))));
    }
}
