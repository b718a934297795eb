use extract::CompletionService;
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;
use tracing::{info, warn};

use crate::candidate::Candidate;

static CANDIDATE_NUMBER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b([1-9]\d*)\b").expect("valid candidate regex"));

/// First standalone positive integer in a reply.
pub fn parse_candidate_number(reply: &str) -> Option<usize> {
    CANDIDATE_NUMBER
        .captures(reply)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// Outcome of a selection request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Selection {
    /// Zero-based candidate index.
    pub index: usize,
    pub fallback: bool,
}

impl Selection {
    fn fallback() -> Self {
        Self { index: 0, fallback: true }
    }
}

pub fn build_selection_prompt(candidates: &[Candidate]) -> String {
    let mut candidate_texts = String::new();
    for (idx, candidate) in candidates.iter().enumerate() {
        candidate_texts.push_str(&format!(
            "Candidate {}:\n- Parsed Instrument Name: {}\n- Raw Action Recognition Agent Output:\n{}\n- Evaluation Metrics: kg_consistency={}, coherence={}, synergy={}\n\n",
            idx + 1,
            candidate.parsed_instrument,
            candidate.action_answer,
            candidate.metrics.kg_consistency,
            candidate.metrics.coherence,
            candidate.metrics.synergy,
        ));
    }

    format!(
        r#"You are an expert surgical AI evaluator. Select the best reasoning among several candidate responses from an Action Recognition Agent in a robotic surgery context.

Each candidate includes the instrument name parsed from the Instrument Identification Agent, the full raw response of the Action Recognition Agent, and evaluation metrics (knowledge graph consistency, coherence, synergy).

Judge the candidates on:
1. Chain-of-thought coherence: does the reasoning flow logically from observation to conclusion?
2. Confidence and clarity: is the response well structured and unambiguous?
3. Instrument-action alignment: does the predicted action fit the identified instrument?
4. Overall reliability: which candidate gives the strongest evidence-based conclusion?

CANDIDATES:
{candidate_texts}
State ONLY the number of the best candidate."#
    )
}

/// Picks the best candidate with an external completion call.
#[derive(Clone)]
pub struct CandidateSelector {
    llm: Arc<dyn CompletionService>,
}

impl CandidateSelector {
    pub fn new(llm: Arc<dyn CompletionService>) -> Self {
        Self { llm }
    }

    /// Falls back to the first candidate when the reply is unusable or the call fails.
    pub async fn select(&self, candidates: &[Candidate]) -> Selection {
        if candidates.len() <= 1 {
            return Selection { index: 0, fallback: false };
        }

        let prompt = build_selection_prompt(candidates);
        let reply = match self.llm.complete(&prompt, None).await {
            Ok(reply) => reply,
            Err(e) => {
                warn!(error = %e, "Candidate selection call failed, using first candidate");
                return Selection::fallback();
            }
        };

        match parse_candidate_number(&reply) {
            Some(number) if (1..=candidates.len()).contains(&number) => {
                info!(candidate = number, total = candidates.len(), "Selected candidate");
                Selection { index: number - 1, fallback: false }
            }
            parsed => {
                warn!(reply = %reply.trim(), ?parsed, "Unusable selection reply, using first candidate");
                Selection::fallback()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use consensus::Metrics;
    use extract::ParsedEntity;
    use std::path::Path;

    struct FixedLlm(Result<&'static str, &'static str>);

    #[async_trait]
    impl CompletionService for FixedLlm {
        async fn complete(&self, _prompt: &str, _image: Option<&Path>) -> anyhow::Result<String> {
            self.0.map(str::to_string).map_err(|e| anyhow::anyhow!(e))
        }

        fn describe(&self) -> String {
            "fixed".to_string()
        }
    }

    fn candidates(n: usize) -> Vec<Candidate> {
        (0..n)
            .map(|i| Candidate {
                instrument_answer: format!("instrument {i}"),
                parsed_instrument: ParsedEntity::Known("Forceps".to_string()),
                action_answer: format!("action {i}"),
                parsed_action: ParsedEntity::Known("Grasping".to_string()),
                metrics: Metrics { kg_consistency: true, coherence: 3, synergy: 3 },
            })
            .collect()
    }

    async fn select_with(reply: Result<&'static str, &'static str>, n: usize) -> Selection {
        CandidateSelector::new(Arc::new(FixedLlm(reply))).select(&candidates(n)).await
    }

    #[test]
    fn test_parse_candidate_number() {
        assert_eq!(parse_candidate_number("3"), Some(3));
        assert_eq!(parse_candidate_number("Candidate 2 is best"), Some(2));
        assert_eq!(parse_candidate_number("0"), None);
        assert_eq!(parse_candidate_number("the second one"), None);
    }

    #[tokio::test]
    async fn test_valid_selection() {
        assert_eq!(select_with(Ok("Candidate 3"), 4).await, Selection { index: 2, fallback: false });
    }

    #[tokio::test]
    async fn test_non_numeric_reply_falls_back() {
        assert_eq!(select_with(Ok("the last one"), 4).await, Selection { index: 0, fallback: true });
    }

    #[tokio::test]
    async fn test_out_of_range_falls_back() {
        assert_eq!(select_with(Ok("7"), 4).await, Selection { index: 0, fallback: true });
    }

    #[tokio::test]
    async fn test_transport_error_falls_back() {
        assert_eq!(select_with(Err("503"), 4).await, Selection { index: 0, fallback: true });
    }

    #[test]
    fn test_prompt_lists_every_candidate() {
        let prompt = build_selection_prompt(&candidates(3));
        assert!(prompt.contains("Candidate 1:"));
        assert!(prompt.contains("Candidate 3:"));
        assert!(prompt.contains("action 2"));
        assert!(!prompt.contains("instrument 0"));
    }
}
