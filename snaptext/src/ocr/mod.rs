//! OCR (Optical Character Recognition) Module
//!
//! Turns an image handle into recognized text.
//!
//! # Architecture
//!
//! - `TextRecognizer` trait defines the contract the controller depends on
//! - `OcrProvider` implements it, selecting a backend from configuration:
//!   Tesseract via leptess, or a hosted vision model over HTTP
//! - `ImagePreprocessor` normalizes camera captures before recognition
//!
//! # Configuration
//!
//! Backend selection is controlled via `OcrConfig` (see `config.rs`):
//! - `model`: provider/model (e.g., "local/tesseract", "openai/gpt-4o")
//! - `api_key`: authentication for hosted providers
//! - `base_url`: custom endpoint for self-hosted or proxy setups
//! - `timeout_secs`: upper bound for a single recognition
//!
//! # Usage
//!
//! ```rust,ignore
//! let ocr = OcrProvider::new(&config.ocr)?;
//! let result = ocr.recognize(&ImageHandle::from("receipt.jpg")).await?;
//! ```

mod api;
mod preprocessing;
mod provider;
mod recognizer;

pub use api::{VisionApiClient, VisionVendor};
pub use preprocessing::{preprocess_image, ImagePreprocessor};
pub use provider::OcrProvider;
pub use recognizer::TextRecognizer;
