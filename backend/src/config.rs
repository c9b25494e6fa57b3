use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use url::Url;

use crate::chat::chat_service::ChatMode;
use crate::inference::preprocess::{PixelScaling, PreprocessConfig, ResizeMethod};

pub const DEFAULT_GEMINI_URL: &str =
    "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.0-flash:generateContent";
pub const DEFAULT_TTS_URL: &str = "https://texttospeech.googleapis.com/v1/text:synthesize";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {reason}")]
    InvalidValue { key: &'static str, reason: String },
    #[error("Failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse {path}: {source}")]
    Yaml {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("Model artifact not found at {0}")]
    MissingModel(String),
    #[error("Failed to load model from {path}: {reason}")]
    ModelLoad { path: String, reason: String },
    #[error("Label set has {labels} entries but the classifier produces {outputs} outputs")]
    LabelMismatch { labels: usize, outputs: usize },
    #[error("Classifier probe failed: {0}")]
    Probe(String),
    #[error("Classifier backend '{0}' is not compiled into this binary")]
    BackendUnavailable(String),
    #[error("Invalid label set: {0}")]
    InvalidLabels(String),
    #[error("Invalid treatment table: {0}")]
    InvalidTreatments(String),
    #[error("HTTP client error: {0}")]
    HttpClient(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassifierBackend {
    Torch,
    Mock,
}

impl ClassifierBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClassifierBackend::Torch => "torch",
            ClassifierBackend::Mock => "mock",
        }
    }
}

impl FromStr for ClassifierBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "torch" | "torchscript" => Ok(ClassifierBackend::Torch),
            "mock" => Ok(ClassifierBackend::Mock),
            other => Err(format!("unknown classifier backend '{}'", other)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ClassifierSettings {
    pub backend: ClassifierBackend,
    pub model_path: PathBuf,
    pub apply_softmax: bool,
    pub labels_path: Option<PathBuf>,
    pub treatments_path: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct ChatSettings {
    pub mode: ChatMode,
    pub api_key: Option<String>,
    pub endpoint: Url,
}

#[derive(Debug, Clone)]
pub struct SpeechSettings {
    pub api_key: Option<String>,
    pub endpoint: Url,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub port: u16,
    pub frontend_dir: PathBuf,
    pub max_payload_bytes: usize,
    pub upstream_timeout: Duration,
    pub classifier: ClassifierSettings,
    pub preprocess: PreprocessConfig,
    pub chat: ChatSettings,
    pub speech: SpeechSettings,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup. Blank values
    /// count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let port = parse_or(get("PORT"), "PORT", 5000u16)?;
        let frontend_dir = get("FRONTEND_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("vision-agri-care-main/dist"));
        let max_payload_bytes = parse_or(
            get("MAX_PAYLOAD_BYTES"),
            "MAX_PAYLOAD_BYTES",
            16 * 1024 * 1024usize,
        )?;
        let timeout_secs = parse_or(get("UPSTREAM_TIMEOUT_SECS"), "UPSTREAM_TIMEOUT_SECS", 30u64)?;

        let default_backend = if cfg!(feature = "torch") {
            ClassifierBackend::Torch
        } else {
            ClassifierBackend::Mock
        };
        let classifier = ClassifierSettings {
            backend: parse_or(get("CLASSIFIER_BACKEND"), "CLASSIFIER_BACKEND", default_backend)?,
            model_path: get("MODEL_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("plant_disease_model.pt")),
            apply_softmax: parse_bool(get("CLASSIFIER_SOFTMAX"), "CLASSIFIER_SOFTMAX", false)?,
            labels_path: get("LABELS_PATH").map(PathBuf::from),
            treatments_path: get("TREATMENTS_PATH").map(PathBuf::from),
        };

        let image_size = parse_or(get("IMAGE_SIZE"), "IMAGE_SIZE", 224u32)?;
        if image_size == 0 {
            return Err(ConfigError::InvalidValue {
                key: "IMAGE_SIZE",
                reason: "must be greater than zero".to_string(),
            });
        }
        let preprocess = PreprocessConfig {
            size: image_size,
            resize_method: parse_or(get("RESIZE_METHOD"), "RESIZE_METHOD", ResizeMethod::Bicubic)?,
            scaling: parse_or(
                get("PIXEL_SCALING"),
                "PIXEL_SCALING",
                PixelScaling::MinusOneToOne,
            )?,
        };

        let gemini_key = get("GEMINI_API_KEY");
        let default_mode = if gemini_key.is_some() {
            ChatMode::Gemini
        } else {
            ChatMode::Mock
        };
        let chat_mode = parse_or(get("CHAT_MODE"), "CHAT_MODE", default_mode)?;
        if chat_mode == ChatMode::Gemini && gemini_key.is_none() {
            return Err(ConfigError::InvalidValue {
                key: "CHAT_MODE",
                reason: "gemini mode requires GEMINI_API_KEY".to_string(),
            });
        }
        let chat = ChatSettings {
            mode: chat_mode,
            api_key: gemini_key,
            endpoint: parse_url(get("GEMINI_URL"), "GEMINI_URL", DEFAULT_GEMINI_URL)?,
        };

        let speech = SpeechSettings {
            api_key: get("TTS_API_KEY"),
            endpoint: parse_url(get("TTS_URL"), "TTS_URL", DEFAULT_TTS_URL)?,
        };

        Ok(Self {
            port,
            frontend_dir,
            max_payload_bytes,
            upstream_timeout: Duration::from_secs(timeout_secs),
            classifier,
            preprocess,
            chat,
            speech,
        })
    }

    pub fn bind_address(&self) -> String {
        format!("0.0.0.0:{}", self.port)
    }
}

fn parse_or<T>(value: Option<String>, key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match value {
        Some(raw) => raw.parse::<T>().map_err(|e| ConfigError::InvalidValue {
            key,
            reason: e.to_string(),
        }),
        None => Ok(default),
    }
}

fn parse_bool(value: Option<String>, key: &'static str, default: bool) -> Result<bool, ConfigError> {
    match value.map(|v| v.to_ascii_lowercase()) {
        None => Ok(default),
        Some(v) => match v.as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::InvalidValue {
                key,
                reason: format!("'{}' is not a boolean", v),
            }),
        },
    }
}

fn parse_url(value: Option<String>, key: &'static str, default: &str) -> Result<Url, ConfigError> {
    let raw = value.unwrap_or_else(|| default.to_string());
    Url::parse(&raw).map_err(|e| ConfigError::InvalidValue {
        key,
        reason: e.to_string(),
    })
}
