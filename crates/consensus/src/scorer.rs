use extract::CompletionService;
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;
use tracing::debug;

use crate::error::EvalError;
use crate::retry::RetryPolicy;

/// Rating used when no valid rating can be obtained.
pub const DEFAULT_RATING: u8 = 3;

static RATING: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b([1-5])\b").expect("valid rating regex"));

/// First standalone digit 1-5 in a reply. Digits inside longer numbers do not count.
pub fn parse_rating(reply: &str) -> Option<u8> {
    RATING
        .captures(reply)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

pub fn build_rating_prompt(
    metric_name: &str,
    rubric: &str,
    instrument_answer: &str,
    action_answer: &str,
) -> String {
    format!(
        r#"You are an expert evaluator of a multi-agent surgical reasoning system whose goal is to identify the ongoing surgical action in an image.
Two agents collaborate:
  1. The action recognition agent predicts the surgical action.
  2. The instrument identification agent identifies the surgical instrument, reinforcing the action prediction.

Evaluate the following responses on the metric "{metric_name}".
{rubric}

Response from the instrument identification agent:
{instrument_answer}

Response from the action recognition agent:
{action_answer}

Provide only an integer rating between 1 (Very Poor) and 5 (Excellent)."#
    )
}

/// Asks an external rater for a 1-5 quality rating.
#[derive(Clone)]
pub struct QualityScorer {
    llm: Arc<dyn CompletionService>,
    policy: RetryPolicy,
}

impl QualityScorer {
    pub fn new(llm: Arc<dyn CompletionService>, policy: RetryPolicy) -> Self {
        Self { llm, policy }
    }

    /// Rating in 1..=5. Falls back to [`DEFAULT_RATING`] after the policy's attempts are spent.
    pub async fn score(
        &self,
        metric_name: &str,
        instrument_answer: &str,
        action_answer: &str,
        rubric: &str,
    ) -> u8 {
        self.score_with_attempts(metric_name, instrument_answer, action_answer, rubric, self.policy.max_attempts())
            .await
    }

    pub async fn score_with_attempts(
        &self,
        metric_name: &str,
        instrument_answer: &str,
        action_answer: &str,
        rubric: &str,
        max_attempts: usize,
    ) -> u8 {
        let prompt = build_rating_prompt(metric_name, rubric, instrument_answer, action_answer);
        let policy = self.policy.with_max_attempts(max_attempts);

        policy
            .retry_or(metric_name, DEFAULT_RATING, |attempt| {
                let prompt = &prompt;
                async move {
                    let reply = self.llm.complete(prompt, None).await?;
                    debug!(metric = metric_name, attempt, reply = %reply.trim(), "Rating reply");
                    parse_rating(&reply).ok_or_else(|| EvalError::parse("a rating between 1 and 5", reply))
                }
            })
            .await
    }
}
