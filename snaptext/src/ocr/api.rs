use base64::{engine::general_purpose::STANDARD, Engine};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::config::{parse_ocr_provider_model, OcrConfig};
use crate::error::{Result, SnapError};

const EXTRACTION_PROMPT: &str = "Extract all text from this image. Return only the extracted text without any explanations or formatting.";

/// Hosted vision APIs that accept the OpenAI chat-completions format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisionVendor {
    OpenAi,
    Mistral,
    DeepSeek,
}

impl VisionVendor {
    pub fn from_prefix(prefix: &str) -> Option<Self> {
        match prefix.to_lowercase().as_str() {
            "openai" => Some(Self::OpenAi),
            "mistral" => Some(Self::Mistral),
            "deepseek" => Some(Self::DeepSeek),
            _ => None,
        }
    }

    fn default_base_url(self) -> &'static str {
        match self {
            Self::OpenAi => "https://api.openai.com/v1",
            Self::Mistral => "https://api.mistral.ai/v1",
            Self::DeepSeek => "https://api.deepseek.com/v1",
        }
    }

    fn default_model(self) -> &'static str {
        match self {
            Self::OpenAi => "gpt-4o",
            Self::Mistral => "pixtral-12b-2409",
            Self::DeepSeek => "deepseek-vl",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::OpenAi => "OpenAI Vision",
            Self::Mistral => "Mistral OCR",
            Self::DeepSeek => "DeepSeek OCR",
        }
    }
}

#[derive(Clone, Debug)]
pub struct VisionApiClient {
    client: Client,
    vendor: VisionVendor,
    api_key: String,
    base_url: String,
    model: String,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: Vec<ContentPart>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type")]
enum ContentPart {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(rename = "image_url")]
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Serialize)]
struct ImageUrl {
    url: String,
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessageResponse,
}

#[derive(Debug, Deserialize)]
struct ChatMessageResponse {
    #[serde(default)]
    content: Option<String>,
}

impl VisionApiClient {
    pub fn new(config: &OcrConfig) -> Result<Self> {
        let (prefix, model) = parse_ocr_provider_model(&config.model);
        let vendor = VisionVendor::from_prefix(prefix).ok_or_else(|| {
            SnapError::RecognitionUnavailable(format!(
                "'{}' is not a hosted vision model",
                config.model
            ))
        })?;

        let api_key = config.api_key.clone().ok_or_else(|| {
            SnapError::RecognitionUnavailable(format!("API key required for {}", vendor.label()))
        })?;

        let base_url = config
            .base_url
            .clone()
            .unwrap_or_else(|| vendor.default_base_url().to_string());

        let model = if model.is_empty() {
            vendor.default_model().to_string()
        } else {
            model.to_string()
        };

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| {
                SnapError::RecognitionUnavailable(format!("Failed to create HTTP client: {e}"))
            })?;

        Ok(Self {
            client,
            vendor,
            api_key,
            base_url,
            model,
        })
    }

    pub fn vendor(&self) -> VisionVendor {
        self.vendor
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub async fn ocr(&self, image_bytes: &[u8]) -> Result<String> {
        let mime = infer::get(image_bytes)
            .map(|kind| kind.mime_type())
            .filter(|mime| mime.starts_with("image/"))
            .unwrap_or("image/png");
        let data_url = format!("data:{mime};base64,{}", STANDARD.encode(image_bytes));

        let request = ChatRequest {
            model: self.model.clone(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: vec![
                    ContentPart::Text {
                        text: EXTRACTION_PROMPT.to_string(),
                    },
                    ContentPart::ImageUrl {
                        image_url: ImageUrl { url: data_url },
                    },
                ],
            }],
            max_tokens: 4096,
        };

        self.make_request(&request).await
    }

    async fn make_request(&self, request: &ChatRequest) -> Result<String> {
        debug!(vendor = self.vendor.label(), model = %self.model, "Sending vision OCR request");

        let resp = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(request)
            .send()
            .await
            .map_err(|e| SnapError::Recognition(format!("API request failed: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(SnapError::Recognition(format!(
                "API request failed: {status} - {body}"
            )));
        }

        let chat_response: ChatResponse = resp
            .json()
            .await
            .map_err(|e| SnapError::Recognition(format!("Failed to parse response: {e}")))?;

        chat_response
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content.unwrap_or_default())
            .ok_or_else(|| SnapError::Recognition("No response from API".to_string()))
    }
}
