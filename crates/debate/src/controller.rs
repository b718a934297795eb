use consensus::{ConsensusEvaluator, RetryPolicy};
use extract::{AnswerExtractor, EntityKind, ParsedEntity};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{Instrument, info, info_span, warn};
use uuid::Uuid;

use crate::agents::SurgicalAgent;
use crate::candidate::{Candidate, DebateOutcome, DebateResult, DebateTrace};
use crate::config::DebateSettings;
use crate::persistence::{CandidateSink, DiscardSink};
use crate::question::{refined_action_question, to_instrument_question};
use crate::selection::{CandidateSelector, Selection};

/// Result plus every candidate the session produced, in round order.
#[derive(Debug, Clone)]
pub struct DebateSession {
    pub result: DebateResult,
    pub candidates: Vec<Candidate>,
}

/// Runs instrument and action agents against each other until their answers agree
/// with the knowledge graph and rate well, or refinement rounds run out.
pub struct DebateController {
    instrument_agent: Arc<dyn SurgicalAgent>,
    action_agent: Arc<dyn SurgicalAgent>,
    extractor: AnswerExtractor,
    evaluator: ConsensusEvaluator,
    selector: CandidateSelector,
    sink: Arc<dyn CandidateSink>,
    settings: DebateSettings,
    agent_retry: RetryPolicy,
}

impl DebateController {
    pub fn new(
        instrument_agent: Arc<dyn SurgicalAgent>,
        action_agent: Arc<dyn SurgicalAgent>,
        extractor: AnswerExtractor,
        evaluator: ConsensusEvaluator,
        selector: CandidateSelector,
    ) -> Self {
        Self {
            instrument_agent,
            action_agent,
            extractor,
            evaluator,
            selector,
            sink: Arc::new(DiscardSink),
            settings: DebateSettings::default(),
            agent_retry: RetryPolicy::default(),
        }
    }

    pub fn with_settings(mut self, settings: DebateSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_sink(mut self, sink: Arc<dyn CandidateSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn with_agent_retry(mut self, policy: RetryPolicy) -> Self {
        self.agent_retry = policy;
        self
    }

    pub fn settings(&self) -> &DebateSettings {
        &self.settings
    }

    /// Answer one question about one frame. Never fails; degraded calls
    /// fall back to default values.
    pub async fn run_debate(&self, question: &str, image: &Path) -> DebateResult {
        self.run_session(question, image).await.result
    }

    pub async fn run_session(&self, question: &str, image: &Path) -> DebateSession {
        let session_id = Uuid::new_v4();
        let span = info_span!("debate", %session_id);
        self.run_session_inner(session_id, question, image)
            .instrument(span)
            .await
    }

    async fn run_session_inner(&self, session_id: Uuid, question: &str, image: &Path) -> DebateSession {
        let started = Instant::now();
        let threshold = self.settings.acceptance_threshold;
        let instrument_question = to_instrument_question(question);
        info!(image = %image.display(), "Debate started");

        let (instrument_answer, action_answer) = tokio::join!(
            self.ask(self.instrument_agent.as_ref(), &instrument_question, image),
            self.ask(self.action_agent.as_ref(), question, image),
        );
        let (parsed_instrument, parsed_action) = tokio::join!(
            self.parse(&instrument_answer, EntityKind::Instrument),
            self.parse(&action_answer, EntityKind::Action),
        );
        let initial = self
            .evaluate_round(instrument_answer, parsed_instrument, action_answer, parsed_action, question)
            .await;
        let initial_metrics = initial.metrics;
        let mut candidates = vec![initial];

        if initial_metrics.is_acceptable(threshold) {
            info!("Initial answers accepted, no refinement needed");
            let result = self.finish(session_id, &candidates, 0, DebateOutcome::AcceptedInitial, Some(0), started);
            return DebateSession { result, candidates };
        }

        info!(?initial_metrics, "Inconsistent or weak collaboration, refining");
        let mut accepted_round = None;

        for round in 1..=self.settings.max_refinements {
            info!(round, "Refinement round");

            let instrument_answer = self
                .ask(self.instrument_agent.as_ref(), &instrument_question, image)
                .await;
            let parsed_instrument = self.parse(&instrument_answer, EntityKind::Instrument).await;

            let refined_question = refined_action_question(&parsed_instrument, question);
            let action_answer = self
                .ask(self.action_agent.as_ref(), &refined_question, image)
                .await;
            let parsed_action = self.parse(&action_answer, EntityKind::Action).await;

            let candidate = self
                .evaluate_round(instrument_answer, parsed_instrument, action_answer, parsed_action, question)
                .await;
            let acceptable = candidate.metrics.is_acceptable(threshold);
            candidates.push(candidate);

            if acceptable {
                info!(round, "Refinement met thresholds, stopping early");
                accepted_round = Some(round);
                break;
            }
        }

        if candidates.len() == 1 {
            let result = self.finish(session_id, &candidates, 0, DebateOutcome::NoRefinement, None, started);
            return DebateSession { result, candidates };
        }

        if let Err(e) = self.sink.persist(session_id, question, &candidates).await {
            warn!(error = %e, "Failed to persist candidates");
        }

        let Selection { index, fallback } = self.selector.select(&candidates).await;
        let outcome = if fallback {
            DebateOutcome::SelectionFallback
        } else {
            DebateOutcome::Selected
        };

        let result = self.finish(session_id, &candidates, index, outcome, accepted_round, started);
        DebateSession { result, candidates }
    }

    /// Answers come from `candidates[selected]`; metrics always come from the first round.
    fn finish(
        &self,
        session_id: Uuid,
        candidates: &[Candidate],
        selected: usize,
        outcome: DebateOutcome,
        accepted_round: Option<usize>,
        started: Instant,
    ) -> DebateResult {
        let chosen = &candidates[selected];
        let trace = DebateTrace {
            session_id,
            rounds: candidates.len(),
            refinements: candidates.len() - 1,
            outcome,
            accepted_round,
            selected_candidate: selected,
            duration_ms: started.elapsed().as_millis() as u64,
        };

        info!(
            outcome = ?trace.outcome,
            refinements = trace.refinements,
            selected,
            duration_ms = trace.duration_ms,
            "Debate finished"
        );

        DebateResult {
            instrument_agent_answer: chosen.instrument_answer.clone(),
            action_agent_answer: chosen.action_answer.clone(),
            metrics: candidates[0].metrics,
            trace,
        }
    }

    /// Agent answer with retries; an agent that never answers yields an empty string.
    async fn ask(&self, agent: &dyn SurgicalAgent, question: &str, image: &Path) -> String {
        let role = agent.role().as_str();
        self.agent_retry
            .retry_or(role, String::new(), |_| agent.answer(question, image))
            .await
    }

    async fn parse(&self, answer: &str, kind: EntityKind) -> ParsedEntity {
        if answer.trim().is_empty() {
            return ParsedEntity::Unknown;
        }
        self.extractor.extract(answer, kind).await
    }

    async fn evaluate_round(
        &self,
        instrument_answer: String,
        parsed_instrument: ParsedEntity,
        action_answer: String,
        parsed_action: ParsedEntity,
        question: &str,
    ) -> Candidate {
        let metrics = self
            .evaluator
            .evaluate(&parsed_instrument, &parsed_action, &instrument_answer, &action_answer, question)
            .await;

        Candidate {
            instrument_answer,
            parsed_instrument,
            action_answer,
            parsed_action,
            metrics,
        }
    }
}
