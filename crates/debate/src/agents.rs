use anyhow::Result;
use async_trait::async_trait;
use extract::CompletionService;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentRole {
    InstrumentIdentification,
    ActionRecognition,
}

impl AgentRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentRole::InstrumentIdentification => "instrument_identification",
            AgentRole::ActionRecognition => "action_recognition",
        }
    }

    fn focus(&self) -> &'static str {
        match self {
            AgentRole::InstrumentIdentification => {
                "Instrument Identification: asks which surgical instrument is visible or in use. \
                 Match the tool's visual features (tip shape, jaws, shaft, energy attachments) against the listed options."
            }
            AgentRole::ActionRecognition => {
                "Action Recognition: asks about the ongoing action of the surgical tool or the reason for it. \
                 Relate the instrument's position, the tissue interaction and visible effects (smoke, bleeding, sutures, clips) to the listed options."
            }
        }
    }
}

/// Maps a question about a surgical frame to a chain-of-thought answer.
#[async_trait]
pub trait SurgicalAgent: Send + Sync {
    fn role(&self) -> AgentRole;

    async fn answer(&self, question: &str, image: &Path) -> Result<String>;
}

pub fn build_cot_prompt(role: AgentRole, question: &str) -> String {
    format!(
        r#"You are an AI assistant specializing in surgical video analysis, explaining a surgeon's reasoning to junior surgeons.
You are given a frame from a recorded robotic surgery. Answer the multiple-choice question about it with a chain-of-thought answer.

Requirements:
- Reason only from what is visible in the image and from the question itself.
- Work through the relevant sub-problems as separate chains, listed as "Chain 1: ...", "Chain 2: ..." and so on.
- Cross-validate the visual features you extract against the textual features implied by the question.
- There is exactly one correct option. If none seems right, still choose the most probable one.
- Finish with a final line of the form "The answer is: Option (X)".

Chain-of-thought focus:
{focus}

The question is:
{question}"#,
        focus = role.focus(),
        question = question,
    )
}

/// Agent backed by a vision completion service.
#[derive(Clone)]
pub struct VisionAgent {
    role: AgentRole,
    llm: Arc<dyn CompletionService>,
}

impl VisionAgent {
    pub fn new(role: AgentRole, llm: Arc<dyn CompletionService>) -> Self {
        Self { role, llm }
    }

    pub fn instrument(llm: Arc<dyn CompletionService>) -> Self {
        Self::new(AgentRole::InstrumentIdentification, llm)
    }

    pub fn action(llm: Arc<dyn CompletionService>) -> Self {
        Self::new(AgentRole::ActionRecognition, llm)
    }
}

#[async_trait]
impl SurgicalAgent for VisionAgent {
    fn role(&self) -> AgentRole {
        self.role
    }

    async fn answer(&self, question: &str, image: &Path) -> Result<String> {
        let prompt = build_cot_prompt(self.role, question);
        self.llm.complete(&prompt, Some(image)).await
    }
}
