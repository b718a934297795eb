use consensus::Metrics;
use extract::ParsedEntity;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One full round: both raw answers, what was parsed from them, and their evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub instrument_answer: String,
    pub parsed_instrument: ParsedEntity,
    pub action_answer: String,
    pub parsed_action: ParsedEntity,
    pub metrics: Metrics,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DebateOutcome {
    /// The first round passed the acceptance test.
    AcceptedInitial,
    /// Refinement ran and the selector picked a valid candidate.
    Selected,
    /// Refinement ran and the selector's reply was unusable; the first round was used.
    SelectionFallback,
    /// The first round failed and no refinement rounds are configured.
    NoRefinement,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DebateTrace {
    pub session_id: Uuid,
    pub rounds: usize,
    pub refinements: usize,
    pub outcome: DebateOutcome,
    /// Zero-based round that passed the acceptance test, if any.
    pub accepted_round: Option<usize>,
    /// Zero-based index of the candidate whose answers were returned.
    pub selected_candidate: usize,
    pub duration_ms: u64,
}

/// Final answer of a debate session.
///
/// `metrics` always belongs to the first round, even when a later round's answers
/// were chosen.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DebateResult {
    pub instrument_agent_answer: String,
    pub action_agent_answer: String,
    pub metrics: Metrics,
    pub trace: DebateTrace,
}

impl DebateResult {
    pub fn accepted(&self) -> bool {
        self.trace.accepted_round.is_some()
    }
}
