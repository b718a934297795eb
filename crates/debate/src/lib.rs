pub mod agents;
pub mod candidate;
pub mod config;
pub mod controller;
pub mod persistence;
pub mod question;
pub mod selection;

pub use agents::{AgentRole, SurgicalAgent, VisionAgent};
pub use candidate::{Candidate, DebateOutcome, DebateResult, DebateTrace};
pub use config::{AppConfig, DebateSettings, LlmProvider};
pub use controller::{DebateController, DebateSession};
pub use persistence::{CandidateSink, DiscardSink, JsonFileSink};
pub use selection::CandidateSelector;

use anyhow::Result;
use consensus::{ConsensusEvaluator, KnowledgeGraph, QualityScorer, RetryPolicy};
use extract::{AnswerExtractor, CompletionService, OllamaClient, OpenAiClient};
use std::sync::Arc;
use tracing::info;

/// Build a completion client for `model` on the configured backend.
pub fn completion_service(config: &AppConfig, model: &str) -> Result<Arc<dyn CompletionService>> {
    let client = extract::llm::http_client(
        config.concurrency.request_timeout(),
        config.concurrency.connect_timeout(),
    )?;

    let service: Arc<dyn CompletionService> = match config.llm.provider {
        LlmProvider::Ollama => Arc::new(
            OllamaClient::new(config.llm.base_url.clone(), model.to_string()).with_client(client),
        ),
        LlmProvider::OpenAi => {
            let api_key = config.api_key()?.unwrap_or_default();
            Arc::new(
                OpenAiClient::new(config.llm.base_url.clone(), model.to_string(), api_key)
                    .with_client(client),
            )
        }
    };
    Ok(service)
}

/// Wire agents, extractor, evaluator, selector and candidate sink from configuration.
pub fn build_controller(config: &AppConfig) -> Result<DebateController> {
    let vision = completion_service(config, &config.llm.vision_model)?;
    let text = completion_service(config, &config.llm.text_model)?;

    let knowledge_graph = match &config.knowledge_graph_path {
        Some(path) => Arc::new(KnowledgeGraph::from_json_file(path)?),
        None => KnowledgeGraph::surgical(),
    };

    let retry = RetryPolicy::from_millis(config.retry.max_attempts, config.retry.delay_ms);
    let scorer = QualityScorer::new(text.clone(), retry);
    let evaluator = ConsensusEvaluator::new(knowledge_graph, scorer);

    let sink: Arc<dyn CandidateSink> = match &config.persistence.candidates_dir {
        Some(dir) => Arc::new(JsonFileSink::new(dir.clone())),
        None => Arc::new(DiscardSink),
    };

    info!(
        vision = %vision.describe(),
        text = %text.describe(),
        instruments = evaluator.knowledge_graph().len(),
        "Debate controller configured"
    );

    Ok(DebateController::new(
        Arc::new(VisionAgent::instrument(vision.clone())),
        Arc::new(VisionAgent::action(vision)),
        AnswerExtractor::new(text.clone()),
        evaluator,
        CandidateSelector::new(text),
    )
    .with_settings(config.debate)
    .with_sink(sink)
    .with_agent_retry(retry))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_controller_for_ollama() {
        let mut config = AppConfig::default();
        config.llm.provider = LlmProvider::Ollama;
        config.debate.max_refinements = 2;

        let controller = build_controller(&config).unwrap();
        assert_eq!(controller.settings().max_refinements, 2);
    }

    #[test]
    fn test_build_controller_rejects_bad_graph_path() {
        let mut config = AppConfig::default();
        config.llm.provider = LlmProvider::Ollama;
        config.knowledge_graph_path = Some("/nonexistent/graph.json".into());

        assert!(build_controller(&config).is_err());
    }
}
