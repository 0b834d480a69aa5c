use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

use crate::audio_store::AudioStore;
use crate::config::AppConfig;
use crate::llm::{build_prompt, InferenceClient, LLMError, OllamaClient};
use crate::reply::{split_reply, SplitReply};
use crate::tts::{OpenAiSpeechClient, SpeechClient};

/// One exchange: what the user typed and what was shown back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    user: String,
    reply: String,
}

impl Turn {
    pub fn new(user: impl Into<String>, reply: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            reply: reply.into(),
        }
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    /// The display text, reasoning section included
    pub fn reply(&self) -> &str {
        &self.reply
    }
}

/// Ordered turn history owned by a front-end.
#[derive(Debug, Clone, Default)]
pub struct Conversation {
    turns: Vec<Turn>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn push(&mut self, turn: Turn) {
        self.turns.push(turn);
    }

    /// Replace the history with the one returned by a finished turn
    pub fn replace(&mut self, turns: Vec<Turn>) {
        self.turns = turns;
    }

    pub fn clear(&mut self) {
        self.turns.clear();
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn last(&self) -> Option<&Turn> {
        self.turns.last()
    }

    pub fn summary(&self) -> String {
        format!(
            "Conversation: {} turns, {} chars of context",
            self.len(),
            self.turns
                .iter()
                .map(|t| t.user.chars().count() + t.reply.chars().count())
                .sum::<usize>()
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Connection refused, DNS, timeout and other transport problems
    Network,
    /// The server answered with a non-success status
    Status(u16),
    /// The server answered but the body made no sense
    Malformed,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::Network => write!(f, "network"),
            FailureKind::Status(code) => write!(f, "status {}", code),
            FailureKind::Malformed => write!(f, "malformed response"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InferenceOutcome {
    Reply(String),
    Failed { kind: FailureKind, message: String },
}

impl InferenceOutcome {
    fn from_result(result: Result<String, LLMError>) -> Self {
        match result {
            Ok(text) => InferenceOutcome::Reply(text),
            Err(LLMError::ApiError { status, .. }) => InferenceOutcome::Failed {
                kind: FailureKind::Status(status),
                message: format!(
                    "Error: could not get a reply from the inference service (status code: {})",
                    status
                ),
            },
            Err(LLMError::Request(e)) => InferenceOutcome::Failed {
                kind: FailureKind::Network,
                message: format!("Connection error: {}", e),
            },
            Err(LLMError::ParseError(e)) => InferenceOutcome::Failed {
                kind: FailureKind::Malformed,
                message: format!("An error occurred: {}", e),
            },
        }
    }

    /// The text that goes through the splitter: the reply, or the
    /// user-facing error message.
    pub fn text(&self) -> &str {
        match self {
            InferenceOutcome::Reply(text) => text,
            InferenceOutcome::Failed { message, .. } => message,
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, InferenceOutcome::Failed { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpeechOutcome {
    Saved(PathBuf),
    /// Nothing speakable, or the reply was an error message
    Skipped,
    Failed(String),
}

/// Everything that happened during one turn.
#[derive(Debug, Clone)]
pub struct TurnReport {
    pub history: Vec<Turn>,
    pub split: Option<SplitReply>,
    pub inference: Option<InferenceOutcome>,
    pub speech: SpeechOutcome,
}

impl TurnReport {
    fn unchanged(history: &[Turn]) -> Self {
        Self {
            history: history.to_vec(),
            split: None,
            inference: None,
            speech: SpeechOutcome::Skipped,
        }
    }

    pub fn audio_path(&self) -> Option<&Path> {
        match &self.speech {
            SpeechOutcome::Saved(path) => Some(path),
            _ => None,
        }
    }

    pub fn display(&self) -> Option<&str> {
        self.split.as_ref().map(|s| s.display.as_str())
    }

    pub fn into_parts(self) -> (Vec<Turn>, Option<PathBuf>) {
        let audio = match self.speech {
            SpeechOutcome::Saved(path) => Some(path),
            _ => None,
        };
        (self.history, audio)
    }
}

/// Runs one chat turn end to end: prompt, inference, split, speech,
/// history append and audio cleanup.
///
/// Holds no per-conversation state and takes no locks. Callers must not
/// run two turns against the same history at once.
pub struct TurnOrchestrator<I, S> {
    inference: I,
    speech: S,
    store: AudioStore,
}

impl TurnOrchestrator<OllamaClient, OpenAiSpeechClient> {
    /// Build the HTTP clients and audio store from a validated config
    pub fn from_config(config: AppConfig) -> crate::Result<Self> {
        config.validate()?;

        let llm = OllamaClient::new(config.inference)?;
        let tts = OpenAiSpeechClient::new(config.speech)?;
        let store = AudioStore::from_config(&config.audio, tts.format());

        Ok(Self::new(llm, tts, store))
    }
}

impl<I, S> TurnOrchestrator<I, S>
where
    I: InferenceClient,
    S: SpeechClient,
{
    pub fn new(inference: I, speech: S, store: AudioStore) -> Self {
        Self {
            inference,
            speech,
            store,
        }
    }

    pub fn inference(&self) -> &I {
        &self.inference
    }

    pub fn store(&self) -> &AudioStore {
        &self.store
    }

    /// Returns the new history and the audio artifact, if one was made
    pub async fn handle_turn(
        &self,
        message: &str,
        history: &[Turn],
    ) -> (Vec<Turn>, Option<PathBuf>) {
        self.run_turn(message, history).await.into_parts()
    }

    /// Same as [`Self::handle_turn`] but keeps every intermediate result
    pub async fn run_turn(&self, message: &str, history: &[Turn]) -> TurnReport {
        if message.trim().is_empty() {
            log::debug!("Empty message, nothing to do");
            return TurnReport::unchanged(history);
        }

        let prompt = build_prompt(history, message);
        log::info!("🤖 Sending turn {} to the model", history.len() + 1);

        let inference = InferenceOutcome::from_result(self.inference.generate(&prompt).await);
        if let InferenceOutcome::Failed { kind, message: reason } = &inference {
            log::warn!("Inference failed ({}): {}", kind, reason);
        }

        let split = split_reply(inference.text());
        if split.has_reasoning() {
            log::debug!("Reply carried a reasoning section, speaking the answer only");
        }

        let speech = if inference.is_failure() || split.is_silent() {
            SpeechOutcome::Skipped
        } else {
            self.speak(&split.speech).await
        };

        let mut new_history = history.to_vec();
        new_history.push(Turn::new(message, split.display.clone()));

        let removed = self.store.prune().await;
        if removed > 0 {
            log::debug!("🗑️ Pruned {} old audio files", removed);
        }

        TurnReport {
            history: new_history,
            split: Some(split),
            inference: Some(inference),
            speech,
        }
    }

    async fn speak(&self, text: &str) -> SpeechOutcome {
        log::info!("🔊 Starting TTS synthesis...");

        let audio = match self.speech.synthesize(text).await {
            Ok(audio) => audio,
            Err(e) => {
                log::warn!("TTS synthesis failed: {}", e);
                return SpeechOutcome::Failed(e.to_string());
            }
        };

        match self.store.save(&audio).await {
            Ok(path) => SpeechOutcome::Saved(path),
            Err(e) => {
                log::warn!("Could not save synthesized audio: {}", e);
                SpeechOutcome::Failed(format!("Failed to save audio: {}", e))
            }
        }
    }
}
