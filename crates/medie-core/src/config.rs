//! medie Configuration Management
//!
//! Handles configuration from environment variables and TOML files with
//! defaults matching the reference deployment (GLiNER span labeling on CPU,
//! 100 character proximity threshold).

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Entity recognition strategy
    pub ner: NerConfig,

    /// Relation extraction engine
    pub extraction: ExtractionConfig,

    /// Text normalization and tokenization
    pub preprocess: PreprocessConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::default().with_env_override()
    }

    /// Load from a TOML file
    pub fn from_file(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let content = std::fs::read_to_string(&path).map_err(|e| ConfigError::FileReadError {
            path: path.clone(),
            source: e,
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path,
            message: e.to_string(),
        })
    }

    /// Apply environment variables on top of this configuration
    pub fn with_env_override(mut self) -> Result<Self, ConfigError> {
        // NER
        if let Ok(method) = std::env::var("MEDIE_NER_METHOD") {
            self.ner.method = method.parse()?;
        }
        if let Ok(path) = std::env::var("MEDIE_MODEL_PATH") {
            self.ner.model_path = Some(path);
        }
        if let Ok(device) = std::env::var("MEDIE_DEVICE") {
            self.ner.device = device.parse()?;
        }

        // Extraction
        if let Ok(threshold) = std::env::var("MEDIE_CHAR_THRESHOLD") {
            self.extraction.char_threshold =
                threshold.parse().map_err(|_| ConfigError::InvalidValue {
                    key: "MEDIE_CHAR_THRESHOLD".to_string(),
                    value: threshold,
                })?;
        }
        if let Ok(path) = std::env::var("MEDIE_RULES_PATH") {
            self.extraction.rules_path = Some(PathBuf::from(path));
        }

        // Preprocessing
        if let Ok(segment) = std::env::var("MEDIE_SEGMENT") {
            self.preprocess.segment = parse_bool("MEDIE_SEGMENT", &segment)?;
        }

        // Logging
        if let Ok(level) = std::env::var("LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Ok(json) = std::env::var("LOG_JSON") {
            self.logging.json_format = parse_bool("LOG_JSON", &json)?;
        }

        Ok(self)
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
        }),
    }
}

/// Entity recognition configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NerConfig {
    /// Recognition strategy
    pub method: NerMethod,

    /// Model identifier; falls back to the method's default model
    pub model_path: Option<String>,

    /// Inference device
    pub device: Device,
}

impl NerConfig {
    /// Model identifier actually in use
    pub fn effective_model_path(&self) -> &str {
        self.model_path
            .as_deref()
            .unwrap_or_else(|| self.method.default_model_path())
    }
}

impl Default for NerConfig {
    fn default() -> Self {
        Self {
            method: NerMethod::Gliner,
            model_path: None,
            device: Device::Cpu,
        }
    }
}

/// Supported entity recognition strategies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NerMethod {
    /// General-purpose span labeler
    Gliner,
    /// Fine-tuned BIO sequence tagger
    Standard,
}

impl NerMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Gliner => "gliner",
            Self::Standard => "standard",
        }
    }

    pub fn default_model_path(&self) -> &'static str {
        match self {
            Self::Gliner => "nqdhocai/med-gliner-v1",
            Self::Standard => "nqdhocai/vihealthbert-ner-v1",
        }
    }
}

impl std::fmt::Display for NerMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for NerMethod {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "gliner" => Ok(Self::Gliner),
            "standard" => Ok(Self::Standard),
            _ => Err(ConfigError::InvalidValue {
                key: "ner.method".to_string(),
                value: s.to_string(),
            }),
        }
    }
}

/// Inference device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Device {
    Cpu,
    Cuda,
}

impl std::fmt::Display for Device {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cpu => write!(f, "cpu"),
            Self::Cuda => write!(f, "cuda"),
        }
    }
}

impl std::str::FromStr for Device {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "cpu" => Ok(Self::Cpu),
            "cuda" => Ok(Self::Cuda),
            _ => Err(ConfigError::InvalidValue {
                key: "ner.device".to_string(),
                value: s.to_string(),
            }),
        }
    }
}

/// Relation extraction configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Maximum proximity distance between subject end and object start
    pub char_threshold: usize,

    /// Optional TOML rule table replacing the built-in rules
    pub rules_path: Option<PathBuf>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            char_threshold: 100,
            rules_path: None,
        }
    }
}

/// Preprocessing configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PreprocessConfig {
    /// Join multi-syllable words with '_' before recognition
    pub segment: bool,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// JSON format for logs
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    FileReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.extraction.char_threshold, 100);
        assert_eq!(config.ner.method, NerMethod::Gliner);
        assert_eq!(config.ner.effective_model_path(), "nqdhocai/med-gliner-v1");
        assert!(!config.preprocess.segment);
    }

    #[test]
    fn test_ner_method_parse() {
        assert_eq!("gliner".parse::<NerMethod>().unwrap(), NerMethod::Gliner);
        assert_eq!(
            "STANDARD".parse::<NerMethod>().unwrap(),
            NerMethod::Standard
        );
        assert!("spacy".parse::<NerMethod>().is_err());
        assert!("gpu".parse::<Device>().is_err());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: AppConfig = toml::from_str(
            r#"
            [ner]
            method = "standard"

            [extraction]
            char_threshold = 40
            "#,
        )
        .unwrap();

        assert_eq!(config.ner.method, NerMethod::Standard);
        assert_eq!(
            config.ner.effective_model_path(),
            "nqdhocai/vihealthbert-ner-v1"
        );
        assert_eq!(config.extraction.char_threshold, 40);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_unknown_method_in_toml_is_rejected() {
        let parsed: Result<AppConfig, _> = toml::from_str("[ner]\nmethod = \"bert\"\n");
        assert!(parsed.is_err());
    }

    #[test]
    fn test_parse_bool() {
        assert!(parse_bool("X", "yes").unwrap());
        assert!(!parse_bool("X", "0").unwrap());
        assert!(parse_bool("X", "maybe").is_err());
    }
}
