use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::{GenerationOptions, InferenceConfig};

/// Returned when the server answers 200 but leaves out the `response` field.
pub const EMPTY_RESPONSE_FALLBACK: &str = "Sorry, I did not receive a valid response.";

#[derive(Error, Debug)]
pub enum LLMError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("API error: {status} - {message}")]
    ApiError { status: u16, message: String },
    #[error("Response parsing error: {0}")]
    ParseError(String),
}

/// A text-generation backend that takes a fully rendered prompt.
///
/// The backend is treated as stateless: every call carries the whole
/// conversation, see [`crate::llm::prompts::build_prompt`].
#[async_trait]
pub trait InferenceClient: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, LLMError>;
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: &'a GenerationOptions,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<ModelTag>,
}

#[derive(Debug, Deserialize)]
struct ModelTag {
    name: String,
}

pub struct OllamaClient {
    client: Client,
    config: InferenceConfig,
}

impl OllamaClient {
    pub fn new(config: InferenceConfig) -> Result<Self, LLMError> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &InferenceConfig {
        &self.config
    }

    /// List the model names installed on the server
    pub async fn list_models(&self) -> Result<Vec<String>, LLMError> {
        let response = self.client.get(self.config.tags_url()).send().await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(LLMError::ApiError {
                status: status.as_u16(),
                message: error_text,
            });
        }

        let response_text = response.text().await?;
        let tags: TagsResponse = serde_json::from_str(&response_text)
            .map_err(|e| LLMError::ParseError(format!("Invalid JSON: {}", e)))?;

        Ok(tags.models.into_iter().map(|m| m.name).collect())
    }
}

#[async_trait]
impl InferenceClient for OllamaClient {
    async fn generate(&self, prompt: &str) -> Result<String, LLMError> {
        let payload = GenerateRequest {
            model: &self.config.model,
            prompt,
            stream: false,
            options: &self.config.options,
        };

        log::debug!(
            "Sending {} prompt chars to {} ({})",
            prompt.chars().count(),
            self.config.generate_url(),
            self.config.model
        );

        let response = self
            .client
            .post(self.config.generate_url())
            .json(&payload)
            .send()
            .await?;

        let status = response.status();

        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(LLMError::ApiError {
                status: status.as_u16(),
                message: error_text,
            });
        }

        let response_text = response.text().await?;
        parse_generate_response(&response_text)
    }
}

fn parse_generate_response(body: &str) -> Result<String, LLMError> {
    let parsed: GenerateResponse = serde_json::from_str(body)
        .map_err(|e| LLMError::ParseError(format!("Invalid JSON: {}", e)))?;

    Ok(parsed
        .response
        .map(|text| text.trim().to_string())
        .unwrap_or_else(|| EMPTY_RESPONSE_FALLBACK.to_string()))
}
