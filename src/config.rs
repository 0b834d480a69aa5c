use secrecy::{ExposeSecret, SecretBox};
use serde::Serialize;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;
use url::Url;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {reason}")]
    InvalidValue { key: String, reason: String },
}

/// Sampling parameters forwarded verbatim as the `options` object of a
/// generate request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerationOptions {
    pub temperature: f32,
    pub top_p: f32,
    pub max_tokens: u32,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            top_p: 0.9,
            max_tokens: 2000,
        }
    }
}

#[derive(Debug, Clone)]
pub struct InferenceConfig {
    pub base_url: String,
    pub model: String,
    pub options: GenerationOptions,
    pub timeout: Duration,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            model: "deepseek-r1:8b".to_string(),
            options: GenerationOptions::default(),
            timeout: Duration::from_secs(60), // reasoning models are slow
        }
    }
}

impl InferenceConfig {
    pub fn generate_url(&self) -> String {
        format!("{}/api/generate", self.base_url.trim_end_matches('/'))
    }

    pub fn tags_url(&self) -> String {
        format!("{}/api/tags", self.base_url.trim_end_matches('/'))
    }
}

#[derive(Debug)]
pub struct SpeechConfig {
    pub url: String,
    pub model: String,
    pub voice: String,
    pub response_format: String,
    pub api_key: Option<SecretBox<String>>,
    pub timeout: Duration,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:8000/v1/audio/speech".to_string(),
            model: "tts-1".to_string(),
            voice: "echo".to_string(),
            response_format: "mp3".to_string(),
            api_key: None,
            timeout: Duration::from_secs(30),
        }
    }
}

impl SpeechConfig {
    /// Get the speech API key (use only when making API calls)
    pub fn api_key(&self) -> Option<&str> {
        self.api_key.as_ref().map(|key| key.expose_secret().as_str())
    }
}

#[derive(Debug, Clone)]
pub struct AudioStoreConfig {
    pub dir: PathBuf,
    pub keep: usize,
}

impl Default for AudioStoreConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("audio_output"),
            keep: 10,
        }
    }
}

/// Everything the orchestrator needs, built once at startup.
#[derive(Debug, Default)]
pub struct AppConfig {
    pub inference: InferenceConfig,
    pub speech: SpeechConfig,
    pub audio: AudioStoreConfig,
}

impl AppConfig {
    /// Load configuration from environment variables on top of the defaults
    pub fn load() -> Result<Self, ConfigError> {
        // Load .env file if it exists (for development)
        dotenvy::dotenv().ok();

        let mut config = Self::default();

        if let Some(url) = optional_var("OLLAMA_URL") {
            config.inference.base_url = validate_url("OLLAMA_URL", &url)?;
        }
        if let Some(model) = optional_var("OLLAMA_MODEL") {
            config.inference.model = model;
        }
        if let Some(value) = parse_var("LLM_TEMPERATURE")? {
            config.inference.options.temperature = value;
        }
        if let Some(value) = parse_var("LLM_TOP_P")? {
            config.inference.options.top_p = value;
        }
        if let Some(value) = parse_var("LLM_MAX_TOKENS")? {
            config.inference.options.max_tokens = value;
        }

        if let Some(url) = optional_var("TTS_URL") {
            config.speech.url = validate_url("TTS_URL", &url)?;
        }
        if let Some(model) = optional_var("TTS_MODEL") {
            config.speech.model = model;
        }
        if let Some(voice) = optional_var("TTS_VOICE") {
            config.speech.voice = voice;
        }
        if let Some(format) = optional_var("TTS_FORMAT") {
            config.speech.response_format = format;
        }
        if let Some(key) = optional_var("TTS_API_KEY") {
            config.speech.api_key = Some(SecretBox::new(Box::new(key)));
        }

        if let Some(dir) = optional_var("AUDIO_OUTPUT_DIR") {
            config.audio.dir = PathBuf::from(dir);
        }
        if let Some(keep) = parse_var("AUDIO_KEEP")? {
            config.audio.keep = keep;
        }

        config.validate()?;
        Ok(config)
    }

    /// Check invariants that hold no matter where values came from
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_url("OLLAMA_URL", &self.inference.base_url)?;
        validate_url("TTS_URL", &self.speech.url)?;

        if self.audio.keep == 0 {
            return Err(ConfigError::InvalidValue {
                key: "AUDIO_KEEP".to_string(),
                reason: "at least one audio file must be kept".to_string(),
            });
        }

        let format = self.speech.response_format.trim();
        if format.is_empty() || format.contains(['/', '\\', '.']) {
            return Err(ConfigError::InvalidValue {
                key: "TTS_FORMAT".to_string(),
                reason: format!("'{}' is not a usable file extension", format),
            });
        }

        Ok(())
    }
}

/// Load configuration with helpful error messages for development
pub fn load_config() -> Result<AppConfig, ConfigError> {
    match AppConfig::load() {
        Ok(config) => {
            log::info!(
                "Loaded configuration (model: {}, voice: {})",
                config.inference.model,
                config.speech.voice
            );
            Ok(config)
        }
        Err(e) => {
            log::error!("Configuration error: {}", e);
            log::error!("Fix the value in your environment or .env file");
            Err(e)
        }
    }
}

fn optional_var(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn parse_var<T>(key: &str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    optional_var(key)
        .map(|raw| {
            raw.parse::<T>().map_err(|e| ConfigError::InvalidValue {
                key: key.to_string(),
                reason: format!("'{}': {}", raw, e),
            })
        })
        .transpose()
}

fn validate_url(key: &str, raw: &str) -> Result<String, ConfigError> {
    Url::parse(raw).map_err(|e| ConfigError::InvalidValue {
        key: key.to_string(),
        reason: format!("'{}': {}", raw, e),
    })?;
    Ok(raw.to_string())
}
