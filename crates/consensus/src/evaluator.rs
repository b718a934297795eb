use extract::ParsedEntity;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

use crate::knowledge_graph::KnowledgeGraph;
use crate::scorer::QualityScorer;

pub const COHERENCE_METRIC: &str = "Coherence of both answers";
pub const SYNERGY_METRIC: &str = "Collaborative Synergy of both answers";

pub const COHERENCE_RUBRIC: &str = "Definition: Is the combined instrument-action prediction logically consistent and free from contradictions?
Considerations:
 - Does the instrument logically enable the predicted action?
 - Are the two final answers free of contradictions?
 - Does the reasoning align the instrument with the action?
Rating Guide:
 1 = Very Poor: Completely contradictory or implausible.
 2 = Below Average: Partially aligned, noticeable logical gaps.
 3 = Average: Not contradictory, but minimal coherence.
 4 = Good: Largely consistent, minor gaps.
 5 = Excellent: Perfectly consistent and logically robust.";

pub const SYNERGY_RUBRIC: &str = "Definition: How well do the instrument identification agent and the action recognition agent reinforce each other's predictions?
Considerations:
 - Do the two agents build on each other's reasoning?
 - Does having both agents lead to a stronger final conclusion than a single agent?
 - Is there clear information sharing or cross-referencing?
Rating Guide:
 1 = Very Poor: No evidence of collaboration; responses conflict or are uncoordinated.
 2 = Below Average: Minimal synergy; answers are weakly connected.
 3 = Average: Reasonable collaboration; some mutual reinforcement.
 4 = Good: Agents support each other effectively.
 5 = Excellent: Collaboration significantly elevates clarity and correctness.";

/// Evaluation of one instrument/action answer pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metrics {
    pub kg_consistency: bool,
    pub coherence: u8,
    pub synergy: u8,
}

impl Metrics {
    /// Consistent with the knowledge graph and both ratings strictly above `threshold`.
    pub fn is_acceptable(&self, threshold: u8) -> bool {
        self.kg_consistency && self.coherence > threshold && self.synergy > threshold
    }
}

#[derive(Clone)]
pub struct ConsensusEvaluator {
    knowledge_graph: Arc<KnowledgeGraph>,
    scorer: QualityScorer,
}

impl ConsensusEvaluator {
    pub fn new(knowledge_graph: Arc<KnowledgeGraph>, scorer: QualityScorer) -> Self {
        Self {
            knowledge_graph,
            scorer,
        }
    }

    pub fn knowledge_graph(&self) -> &KnowledgeGraph {
        &self.knowledge_graph
    }

    /// Knowledge-graph check plus coherence and synergy ratings, in that order.
    ///
    /// `question` is accepted for parity with the agents' inputs; the rubrics rate
    /// the two answers only.
    pub async fn evaluate(
        &self,
        instrument: &ParsedEntity,
        action: &ParsedEntity,
        instrument_answer: &str,
        action_answer: &str,
        _question: &str,
    ) -> Metrics {
        let kg_consistency = self.knowledge_graph.is_consistent_parsed(instrument, action);

        let coherence = self
            .scorer
            .score(COHERENCE_METRIC, instrument_answer, action_answer, COHERENCE_RUBRIC)
            .await;
        let synergy = self
            .scorer
            .score(SYNERGY_METRIC, instrument_answer, action_answer, SYNERGY_RUBRIC)
            .await;

        let metrics = Metrics {
            kg_consistency,
            coherence,
            synergy,
        };

        info!(
            instrument = %instrument,
            action = %action,
            kg_consistency,
            coherence,
            synergy,
            "Consensus evaluated"
        );

        metrics
    }
}
