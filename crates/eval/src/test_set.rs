use anyhow::{Context, Result};
use extract::parse_option_letter;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// One row of a question set: a frame, its multiple-choice question and the expected option.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionRecord {
    pub image_path: PathBuf,
    /// Chain-of-thought process the question exercises, e.g. "Action Recognition".
    #[serde(default)]
    pub cot_process: String,
    pub question: String,
    #[serde(default)]
    pub ground_truth: Option<String>,
}

impl QuestionRecord {
    pub fn expected_option(&self) -> Option<char> {
        self.ground_truth.as_deref().and_then(parse_option_letter)
    }

    /// `<image stem>_<cot process>_<row>.json`, spaces replaced by underscores.
    pub fn log_file_name(&self, row: usize) -> String {
        let stem = self
            .image_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "frame".to_string());
        let process = self.cot_process.trim().replace(' ', "_");

        if process.is_empty() {
            format!("{}_{}.json", stem, row)
        } else {
            format!("{}_{}_{}.json", stem, process, row)
        }
    }
}

/// Load a JSON array of question records.
pub async fn load_question_set(path: &Path) -> Result<Vec<QuestionRecord>> {
    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read question set {}", path.display()))?;
    serde_json::from_str(&content).context("Failed to parse question set")
}
