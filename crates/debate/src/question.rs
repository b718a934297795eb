use extract::{EntityKind, ParsedEntity};

/// Opening of an action-recognition question.
pub const ACTION_QUESTION_TRIGGER: &str = "What is the most likely ongoing action of the surgical instrument";
pub const INSTRUMENT_QUESTION_TRIGGER: &str = "What is the most likely surgical instrument";

/// Lettered instrument menu appended to the rewritten question.
pub fn instrument_menu() -> String {
    EntityKind::Instrument
        .labels()
        .iter()
        .map(|(letter, name)| format!("({}) {}", letter.to_ascii_lowercase(), name))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Rewrite an action question into an instrument-only question.
///
/// Swaps the trigger phrase, keeps the text before the first `?`, then appends
/// the instrument menu. Deterministic for a given input.
pub fn to_instrument_question(action_question: &str) -> String {
    let rewritten = action_question.replace(ACTION_QUESTION_TRIGGER, INSTRUMENT_QUESTION_TRIGGER);
    let stem = rewritten.split('?').next().unwrap_or_default();

    format!("{}?\n{}", stem.trim(), instrument_menu())
}

/// Action question for a refinement round, anchored on the instrument agent's latest answer.
pub fn refined_action_question(instrument: &ParsedEntity, question: &str) -> String {
    format!(
        "The Instrument Identification Agent has identified the instrument in question to be: {instrument}.
Validate and confirm whether you agree that the instrument in question is {instrument}.
If you agree with the Instrument Identification Agent on the identity of the instrument, determine the most appropriate ongoing surgical action using the Action Recognition chain-of-thought process.

{question}"
    )
}
