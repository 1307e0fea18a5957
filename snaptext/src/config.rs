use serde::Deserialize;
use std::env;
use std::path::PathBuf;

fn parse_env_or<T: std::str::FromStr>(var: &str, default: T) -> T
where
    T::Err: std::fmt::Display,
{
    match env::var(var) {
        Ok(val) => match val.parse() {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::warn!("Invalid value '{}' for {}: {}. Using default.", val, var, e);
                default
            }
        },
        Err(_) => default,
    }
}

fn parse_env_opt<T: std::str::FromStr>(var: &str) -> Option<T>
where
    T::Err: std::fmt::Display,
{
    match env::var(var) {
        Ok(val) => match val.parse() {
            Ok(parsed) => Some(parsed),
            Err(e) => {
                tracing::warn!("Invalid value '{}' for {}: {}. Ignoring.", val, var, e);
                None
            }
        },
        Err(_) => None,
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub ocr: OcrConfig,
    pub preprocess: PreprocessConfig,
    pub camera: CameraConfig,
    pub session: SessionConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OcrConfig {
    pub model: String,
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PreprocessConfig {
    pub target_width: u32,
    pub min_image_dimension: u32,
    pub grayscale: bool,
    pub scratch_dir: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CameraConfig {
    pub permission_granted: bool,
}

/// The single credential pair the login gate accepts.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    pub username: String,
    pub password: String,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            model: "local/tesseract".to_string(),
            api_key: None,
            base_url: None,
            timeout_secs: 60,
        }
    }
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            target_width: 1024,
            min_image_dimension: 32,
            grayscale: true,
            scratch_dir: env::temp_dir().join("snaptext"),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            username: "User".to_string(),
            password: "Password".to_string(),
        }
    }
}

/// Parse `CAMERA_PERMISSION`. Accepts `granted`/`denied` as well as booleans.
fn parse_camera_permission() -> bool {
    match env::var("CAMERA_PERMISSION") {
        Ok(val) => match val.trim().to_lowercase().as_str() {
            "granted" | "grant" | "allow" | "true" | "1" | "yes" => true,
            "denied" | "deny" | "false" | "0" | "no" => false,
            other => {
                tracing::warn!(
                    "Invalid value '{}' for CAMERA_PERMISSION. Using default (granted).",
                    other
                );
                true
            }
        },
        Err(_) => true,
    }
}

impl Default for Config {
    fn default() -> Self {
        let ocr_defaults = OcrConfig::default();
        let preprocess_defaults = PreprocessConfig::default();
        let session_defaults = SessionConfig::default();

        Self {
            ocr: OcrConfig {
                model: env::var("OCR_MODEL").unwrap_or(ocr_defaults.model),
                api_key: env::var("OCR_API_KEY").ok(),
                base_url: env::var("OCR_BASE_URL").ok(),
                timeout_secs: parse_env_or("OCR_TIMEOUT", ocr_defaults.timeout_secs),
            },
            preprocess: PreprocessConfig {
                target_width: parse_env_or(
                    "PREPROCESS_TARGET_WIDTH",
                    preprocess_defaults.target_width,
                ),
                min_image_dimension: parse_env_or(
                    "PREPROCESS_MIN_DIMENSION",
                    preprocess_defaults.min_image_dimension,
                ),
                grayscale: parse_env_or("PREPROCESS_GRAYSCALE", preprocess_defaults.grayscale),
                scratch_dir: parse_env_opt("SCRATCH_DIR")
                    .unwrap_or(preprocess_defaults.scratch_dir),
            },
            camera: CameraConfig {
                permission_granted: parse_camera_permission(),
            },
            session: SessionConfig {
                username: env::var("LOGIN_USERNAME").unwrap_or(session_defaults.username),
                password: env::var("LOGIN_PASSWORD").unwrap_or(session_defaults.password),
            },
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::default()
    }
}

/// Known hosted vision providers that speak the OpenAI chat-completions API.
pub const KNOWN_OCR_PROVIDERS: &[&str] = &["openai", "mistral", "deepseek"];

/// Parse an OCR model name into (provider, model) tuple.
pub fn parse_ocr_provider_model(model: &str) -> (&str, &str) {
    if let Some((prefix, rest)) = model.split_once('/') {
        let prefix_lower = prefix.to_lowercase();
        if KNOWN_OCR_PROVIDERS.contains(&prefix_lower.as_str()) || prefix_lower == "local" {
            return (prefix, rest);
        }
    }
    // Anything else runs on the local engine
    ("local", model)
}
