use thiserror::Error;

use crate::config::ConfigError;
use crate::llm::LLMError;
use crate::tts::TTSError;

pub type Result<T> = std::result::Result<T, ChatError>;

#[derive(Error, Debug)]
pub enum ChatError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Inference error: {0}")]
    Inference(#[from] LLMError),

    #[error("Speech error: {0}")]
    Speech(#[from] TTSError),
}
