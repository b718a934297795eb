pub mod schema;
pub mod normalizer;
pub mod llm;
pub mod prompt;

pub use schema::{EntityKind, ParsedEntity, ACTION_LABELS, INSTRUMENT_LABELS};
pub use normalizer::{normalize_label, parse_answer_option, parse_option_letter};
pub use llm::{CompletionService, OllamaClient, OpenAiClient};

use std::sync::Arc;
use tracing::{debug, warn};

/// Turns a free-form agent answer into an instrument or action name.
///
/// Single attempt per call. A failed completion degrades to
/// [`ParsedEntity::Unknown`] and is logged, never returned as an error.
#[derive(Clone)]
pub struct AnswerExtractor {
    llm: Arc<dyn CompletionService>,
}

impl AnswerExtractor {
    pub fn new(llm: Arc<dyn CompletionService>) -> Self {
        Self { llm }
    }

    pub async fn extract(&self, response: &str, kind: EntityKind) -> ParsedEntity {
        let prompt = prompt::build_extraction_prompt(kind, response);

        match self.llm.complete(&prompt, None).await {
            Ok(reply) => {
                let parsed = ParsedEntity::from_reply(&reply);
                debug!(kind = %kind, parsed = %parsed, "Extracted entity");
                parsed
            }
            Err(e) => {
                warn!(kind = %kind, error = %e, "Extraction failed, using unknown");
                ParsedEntity::Unknown
            }
        }
    }

    pub async fn parse_instrument(&self, response: &str) -> ParsedEntity {
        self.extract(response, EntityKind::Instrument).await
    }

    pub async fn parse_action(&self, response: &str) -> ParsedEntity {
        self.extract(response, EntityKind::Action).await
    }
}
