//! Chat relay for a locally hosted reasoning model with spoken answers.
//!
//! Each turn sends the whole conversation to an Ollama-style generate
//! endpoint, splits the model's `<think>` reasoning away from its answer,
//! voices only the answer through an OpenAI-compatible speech endpoint and
//! keeps a bounded set of audio files on disk.

pub mod audio_store;
pub mod config;
pub mod conversation;
pub mod error;
pub mod llm;
pub mod reply;
pub mod tts;

pub use conversation::{Conversation, Turn, TurnOrchestrator, TurnReport};
pub use error::{ChatError, Result};
pub use reply::{split_reply, SplitReply};
