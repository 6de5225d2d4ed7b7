use serde::{Deserialize, Serialize};

use crate::command::Command;

/// What the language-understanding collaborator decided.
///
/// The collaborator follows a two-outcome policy with a strict anti-guessing
/// rule: a command that is unambiguous, or resolvable from the snapshot alone,
/// comes back as an `Action` whose target text echoes the snapshot element
/// exactly (that exact-string contract is what makes the resolver's
/// exact-match tie-break work). When several snapshot elements remain
/// plausible, it must come back as a `Clarification` enumerating them rather
/// than a guess, and it must never name a target absent from the snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum InterpretationResult {
    Action { command: Command },
    Clarification { question: String },
}

/// Classified result from the audio-analysis collaborator.
#[derive(Debug, Clone, Deserialize)]
pub struct SpokenCommand {
    pub key: String,
    pub value: String,
}
