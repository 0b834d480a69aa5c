// Prompt rendering for a stateless completion endpoint

use crate::conversation::Turn;

pub const USER_LABEL: &str = "User";
pub const ASSISTANT_LABEL: &str = "Assistant";

/// Render the whole conversation, oldest turn first, followed by the new
/// message and an open assistant label for the model to complete.
pub fn build_prompt(history: &[Turn], message: &str) -> String {
    let mut prompt = String::new();

    for turn in history {
        prompt.push_str(&format!("{}: {}\n", USER_LABEL, turn.user()));
        prompt.push_str(&format!("{}: {}\n", ASSISTANT_LABEL, turn.reply()));
    }

    prompt.push_str(&format!("{}: {}\n{}: ", USER_LABEL, message, ASSISTANT_LABEL));
    prompt
}
