use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use thiserror::Error;

use crate::config::SpeechConfig;

#[derive(Error, Debug)]
pub enum TTSError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("API error: {status} - {message}")]
    ApiError { status: u16, message: String },
    #[error("Nothing to synthesize")]
    EmptyInput,
}

/// Turns answer text into encoded audio bytes.
#[async_trait]
pub trait SpeechClient: Send + Sync {
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>, TTSError>;

    /// File extension of the audio this client produces
    fn format(&self) -> &str;
}

#[derive(Debug, Serialize)]
struct SpeechRequest<'a> {
    model: &'a str,
    voice: &'a str,
    response_format: &'a str,
    input: &'a str,
}

/// Client for an OpenAI-compatible `/v1/audio/speech` endpoint.
pub struct OpenAiSpeechClient {
    client: Client,
    config: SpeechConfig,
}

impl OpenAiSpeechClient {
    pub fn new(config: SpeechConfig) -> Result<Self, TTSError> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &SpeechConfig {
        &self.config
    }
}

#[async_trait]
impl SpeechClient for OpenAiSpeechClient {
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>, TTSError> {
        if text.trim().is_empty() {
            return Err(TTSError::EmptyInput);
        }

        let payload = SpeechRequest {
            model: &self.config.model,
            voice: &self.config.voice,
            response_format: &self.config.response_format,
            input: text,
        };

        let mut request = self
            .client
            .post(&self.config.url)
            .header("Content-Type", "application/json")
            .json(&payload);

        if let Some(key) = self.config.api_key() {
            request = request.header("Authorization", format!("Bearer {}", key));
        }

        let response = request.send().await?;
        let status = response.status();

        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(TTSError::ApiError {
                status: status.as_u16(),
                message: error_text,
            });
        }

        let audio_data = response.bytes().await?.to_vec();
        log::debug!("🔊 Received {} bytes of audio", audio_data.len());

        Ok(audio_data)
    }

    fn format(&self) -> &str {
        &self.config.response_format
    }
}
