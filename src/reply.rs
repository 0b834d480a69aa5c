//! Splitting a raw model reply into what is shown and what is spoken.
//!
//! Reasoning models wrap their chain of thought in `<think>...</think>`.
//! The reasoning is useful on screen but must never reach the speech
//! synthesiser, so every reply is split into a display form and a speech
//! form before anything else happens to it.

use once_cell::sync::Lazy;
use regex::Regex;

pub const THINKING_HEADING: &str = "**🤔 Thinking:**";
pub const ANSWER_HEADING: &str = "**💡 Answer:**";
pub const SECTION_SEPARATOR: &str = "---";

static THINK_BLOCK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<think>(.*?)</think>").expect("think pattern is valid"));

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitReply {
    /// Text for the chat transcript. Equal to the raw reply when no
    /// reasoning region was found.
    pub display: String,
    /// Text for speech synthesis, never containing the reasoning region.
    pub speech: String,
    /// Trimmed inner text of the reasoning region, if there was one.
    pub reasoning: Option<String>,
}

impl SplitReply {
    fn passthrough(raw: &str) -> Self {
        Self {
            display: raw.to_string(),
            speech: raw.to_string(),
            reasoning: None,
        }
    }

    pub fn has_reasoning(&self) -> bool {
        self.reasoning.is_some()
    }

    /// True when there is nothing worth sending to the speech endpoint
    pub fn is_silent(&self) -> bool {
        self.speech.trim().is_empty()
    }
}

/// Split `raw` on its first `<think>` region.
///
/// Only the first region counts as the reasoning; any later regions stay in
/// the answer text untouched. Unbalanced markers never match, so such
/// replies pass through unchanged.
pub fn split_reply(raw: &str) -> SplitReply {
    let Some(captures) = THINK_BLOCK.captures(raw) else {
        return SplitReply::passthrough(raw);
    };
    let (Some(whole), Some(inner)) = (captures.get(0), captures.get(1)) else {
        return SplitReply::passthrough(raw);
    };

    let reasoning = inner.as_str().trim().to_string();

    let mut answer = String::with_capacity(raw.len() - whole.len());
    answer.push_str(&raw[..whole.start()]);
    answer.push_str(&raw[whole.end()..]);
    let speech = answer.trim().to_string();

    let display = format!(
        "{}\n\n{}\n\n{}\n\n{}\n\n{}",
        THINKING_HEADING, reasoning, SECTION_SEPARATOR, ANSWER_HEADING, speech
    );

    SplitReply {
        display,
        speech,
        reasoning: Some(reasoning),
    }
}
