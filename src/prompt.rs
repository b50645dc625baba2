//! Stage prompt assembly.
//!
//! Builds the ordered message list for one stage: persona directive, stage
//! instruction, conversation context, the user's input, and - for every
//! stage after the first - the previous stage's output plus a handoff
//! directive. Pure; all reads happen before the chain starts.

use crate::chain::StageRole;
use crate::history::{HistoryTurn, TurnRole};
use crate::llm::Message;

const ANALYZER_INSTRUCTION: &str = "You are the analysis pass of a reply pipeline. Read the \
conversation and extract the tone, the speaker's persona, and the situational context as short \
bullet points.";

const IMITATOR_INSTRUCTION: &str = "You are the drafting pass of a reply pipeline. Write a reply \
in the speaker's established voice, consistent with the analysis and the conversation so far.";

const POST_EDITOR_INSTRUCTION: &str = "You are the editing pass of a reply pipeline. Polish the \
draft's cadence and rhythm. Preserve its meaning and voice.";

const MASKER_INSTRUCTION: &str = "You are the final pass of a reply pipeline. Soften anything \
that reads as machine-written and keep the speaker's voice intact.";

/// Everything a stage prompt is assembled from.
#[derive(Debug, Clone, Copy, Default)]
pub struct PromptInputs<'a> {
    /// Persona directive, injected as the first system message when present.
    pub persona: Option<&'a str>,
    /// Turns loaded from the history store (already trimmed).
    pub history: &'a [HistoryTurn],
    /// Free-text history block, used only when no stored turns exist.
    pub freeform_history: Option<&'a str>,
    /// The current user input.
    pub user_input: &'a str,
    /// Output of the preceding stage; None for the first stage.
    pub previous_output: Option<&'a str>,
    /// Requested reply length, folded into the drafting instruction.
    pub target_words: Option<u64>,
}

/// Static per-role instruction, second message of every stage prompt.
fn stage_instruction(role: StageRole, target_words: Option<u64>) -> String {
    match role {
        StageRole::Analyzer => ANALYZER_INSTRUCTION.to_string(),
        StageRole::Imitator => match target_words {
            Some(words) => format!("{} Aim for roughly {} words.", IMITATOR_INSTRUCTION, words),
            None => IMITATOR_INSTRUCTION.to_string(),
        },
        StageRole::PostEditor => POST_EDITOR_INSTRUCTION.to_string(),
        StageRole::Masker => MASKER_INSTRUCTION.to_string(),
    }
}

/// Fresh user directive that follows the previous stage's output.
fn handoff_directive(role: StageRole) -> &'static str {
    match role {
        StageRole::Analyzer => "Summarize the exchange above as bullets.",
        StageRole::Imitator => "Using the analysis above, draft the reply now.",
        StageRole::PostEditor => "Edit the draft above.",
        StageRole::Masker => "Rewrite the draft above so nothing gives it away.",
    }
}

/// Split a free-text history block into messages.
///
/// Lines prefixed `User:` / `Assistant:` open turns and unprefixed lines
/// continue the current one; a block with no prefixes at all is a single
/// user-side context message.
fn split_freeform_history(block: &str) -> Vec<Message> {
    let block = block.trim();
    if block.is_empty() {
        return Vec::new();
    }

    let has_prefixes = block
        .lines()
        .any(|line| line.starts_with("User:") || line.starts_with("Assistant:"));
    if !has_prefixes {
        return vec![Message::user(block)];
    }

    let mut messages: Vec<Message> = Vec::new();
    for line in block.lines() {
        if let Some(rest) = line.strip_prefix("User:") {
            messages.push(Message::user(rest.trim()));
        } else if let Some(rest) = line.strip_prefix("Assistant:") {
            messages.push(Message::assistant(rest.trim()));
        } else if let Some(last) = messages.last_mut() {
            last.content.push('\n');
            last.content.push_str(line);
        } else {
            messages.push(Message::user(line));
        }
    }
    messages
}

/// Build the full message list for one stage.
pub fn assemble_stage_messages(role: StageRole, inputs: &PromptInputs) -> Vec<Message> {
    let mut messages = Vec::new();

    if let Some(persona) = inputs.persona {
        messages.push(Message::system(persona));
    }

    messages.push(Message::system(stage_instruction(role, inputs.target_words)));

    if inputs.history.is_empty() {
        if let Some(block) = inputs.freeform_history {
            messages.extend(split_freeform_history(block));
        }
    } else {
        for turn in inputs.history {
            messages.push(match turn.role {
                TurnRole::User => Message::user(&turn.text),
                TurnRole::Assistant => Message::assistant(&turn.text),
            });
        }
    }

    messages.push(Message::user(inputs.user_input));

    if let Some(previous) = inputs.previous_output {
        messages.push(Message::assistant(previous));
        messages.push(Message::user(handoff_directive(role)));
    }

    messages
}
