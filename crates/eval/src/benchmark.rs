use anyhow::{Context, Result};
use debate::{Candidate, DebateController, DebateOutcome, DebateResult};
use extract::parse_answer_option;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{info, warn};

use crate::test_set::QuestionRecord;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RowResult {
    pub row: usize,
    pub image_path: PathBuf,
    pub cot_process: String,
    pub predicted: Option<char>,
    pub expected: Option<char>,
    pub correct: Option<bool>,
    pub outcome: DebateOutcome,
    pub refinements: usize,
    pub latency_ms: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchReport {
    pub total_rows: usize,
    /// Rows whose final action answer named an option.
    pub answered: usize,
    /// Rows with a usable ground truth.
    pub graded: usize,
    pub correct: usize,
    pub accuracy: f64,
    pub accepted_initial_rate: f64,
    pub avg_refinements: f64,
    pub avg_latency_ms: f64,
    pub p50_latency_ms: f64,
    pub p95_latency_ms: f64,
    pub rows: Vec<RowResult>,
}

#[derive(Serialize)]
struct RowLog<'a> {
    record: &'a QuestionRecord,
    result: &'a DebateResult,
    candidates: &'a [Candidate],
}

/// Runs one debate per question record and grades the final answers.
pub struct BatchRunner {
    controller: Arc<DebateController>,
    log_dir: PathBuf,
    max_concurrent: usize,
}

impl BatchRunner {
    pub fn new(controller: Arc<DebateController>, log_dir: PathBuf, max_concurrent: usize) -> Self {
        Self {
            controller,
            log_dir,
            max_concurrent: max_concurrent.max(1),
        }
    }

    pub async fn run(&self, records: Vec<QuestionRecord>) -> Result<BatchReport> {
        tokio::fs::create_dir_all(&self.log_dir)
            .await
            .with_context(|| format!("Failed to create log directory {}", self.log_dir.display()))?;

        info!(rows = records.len(), concurrency = self.max_concurrent, "Running batch");

        let permits = Arc::new(Semaphore::new(self.max_concurrent));
        let mut tasks = JoinSet::new();

        for (row, record) in records.into_iter().enumerate() {
            let controller = Arc::clone(&self.controller);
            let permits = Arc::clone(&permits);
            let log_dir = self.log_dir.clone();

            tasks.spawn(async move {
                let _permit = permits.acquire_owned().await.ok();
                run_row(&controller, &log_dir, row, record).await
            });
        }

        let mut rows = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(result) => rows.push(result),
                Err(e) => warn!(error = %e, "Batch row task failed"),
            }
        }
        rows.sort_by_key(|r| r.row);

        Ok(compute_report(rows))
    }
}

async fn run_row(controller: &DebateController, log_dir: &Path, row: usize, record: QuestionRecord) -> RowResult {
    let start = Instant::now();
    let session = controller.run_session(&record.question, &record.image_path).await;
    let latency_ms = start.elapsed().as_millis() as f64;

    let predicted = parse_answer_option(&session.result.action_agent_answer);
    let expected = record.expected_option();
    let correct = match (predicted, expected) {
        (_, None) => None,
        (Some(p), Some(e)) => Some(p == e),
        (None, Some(_)) => Some(false),
    };

    let log = RowLog {
        record: &record,
        result: &session.result,
        candidates: &session.candidates,
    };
    let log_path = log_dir.join(record.log_file_name(row));
    if let Err(e) = write_log(&log_path, &log).await {
        warn!(row, error = %e, "Failed to write row log");
    }

    info!(row, ?predicted, ?expected, latency_ms, "Row finished");

    RowResult {
        row,
        image_path: record.image_path,
        cot_process: record.cot_process,
        predicted,
        expected,
        correct,
        outcome: session.result.trace.outcome,
        refinements: session.result.trace.refinements,
        latency_ms,
    }
}

async fn write_log(path: &Path, log: &RowLog<'_>) -> Result<()> {
    let json = serde_json::to_string_pretty(log)?;
    tokio::fs::write(path, json)
        .await
        .with_context(|| format!("Failed to write {}", path.display()))
}

pub fn compute_report(rows: Vec<RowResult>) -> BatchReport {
    let total_rows = rows.len();
    let answered = rows.iter().filter(|r| r.predicted.is_some()).count();
    let graded = rows.iter().filter(|r| r.correct.is_some()).count();
    let correct = rows.iter().filter(|r| r.correct == Some(true)).count();
    let accepted_initial = rows
        .iter()
        .filter(|r| r.outcome == DebateOutcome::AcceptedInitial)
        .count();

    let mut latencies: Vec<f64> = rows.iter().map(|r| r.latency_ms).collect();
    latencies.sort_by(|a, b| a.total_cmp(b));

    BatchReport {
        total_rows,
        answered,
        graded,
        correct,
        accuracy: ratio(correct, graded),
        accepted_initial_rate: ratio(accepted_initial, total_rows),
        avg_refinements: mean(rows.iter().map(|r| r.refinements as f64)),
        avg_latency_ms: mean(latencies.iter().copied()),
        p50_latency_ms: percentile(&latencies, 50),
        p95_latency_ms: percentile(&latencies, 95),
        rows,
    }
}

fn ratio(part: usize, whole: usize) -> f64 {
    if whole == 0 { 0.0 } else { part as f64 / whole as f64 }
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, count) = values.fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));
    if count == 0 { 0.0 } else { sum / count as f64 }
}

fn percentile(sorted_data: &[f64], p: usize) -> f64 {
    if sorted_data.is_empty() {
        return 0.0;
    }
    let index = (p as f64 / 100.0 * sorted_data.len() as f64) as usize;
    sorted_data[index.min(sorted_data.len() - 1)]
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use consensus::{ConsensusEvaluator, KnowledgeGraph, QualityScorer, RetryPolicy};
    use debate::{AgentRole, CandidateSelector, SurgicalAgent};
    use extract::{AnswerExtractor, CompletionService};
    use std::time::Duration;

    struct FixedAgent(AgentRole, &'static str);

    #[async_trait]
    impl SurgicalAgent for FixedAgent {
        fn role(&self) -> AgentRole {
            self.0
        }

        async fn answer(&self, _question: &str, _image: &Path) -> anyhow::Result<String> {
            Ok(self.1.to_string())
        }
    }

    struct FixedText;

    #[async_trait]
    impl CompletionService for FixedText {
        async fn complete(&self, prompt: &str, _image: Option<&Path>) -> anyhow::Result<String> {
            let reply = if prompt.contains("final instrument prediction") {
                "Forceps"
            } else if prompt.contains("final action prediction") {
                "Grasping"
            } else {
                "5"
            };
            Ok(reply.to_string())
        }

        fn describe(&self) -> String {
            "fixed".to_string()
        }
    }

    fn controller() -> Arc<DebateController> {
        let text: Arc<dyn CompletionService> = Arc::new(FixedText);
        let scorer = QualityScorer::new(text.clone(), RetryPolicy::new(1, Duration::ZERO));
        Arc::new(DebateController::new(
            Arc::new(FixedAgent(AgentRole::InstrumentIdentification, "The answer is: Option (D)")),
            Arc::new(FixedAgent(AgentRole::ActionRecognition, "Chain 1: jaws closed.\nThe answer is: Option (D)")),
            AnswerExtractor::new(text.clone()),
            ConsensusEvaluator::new(KnowledgeGraph::surgical(), scorer),
            CandidateSelector::new(text),
        ))
    }

    fn record(image: &str, ground_truth: Option<&str>) -> QuestionRecord {
        QuestionRecord {
            image_path: PathBuf::from(image),
            cot_process: "Action Recognition".to_string(),
            question: "What is the most likely ongoing action of the surgical instrument?".to_string(),
            ground_truth: ground_truth.map(str::to_string),
        }
    }

    fn row(latency_ms: f64, correct: Option<bool>, outcome: DebateOutcome) -> RowResult {
        RowResult {
            row: 0,
            image_path: PathBuf::from("a.jpg"),
            cot_process: String::new(),
            predicted: Some('A'),
            expected: correct.map(|_| 'A'),
            correct,
            outcome,
            refinements: if outcome == DebateOutcome::AcceptedInitial { 0 } else { 3 },
            latency_ms,
        }
    }

    #[tokio::test]
    async fn test_batch_grades_and_logs_rows() {
        let dir = tempfile::tempdir().unwrap();
        let runner = BatchRunner::new(controller(), dir.path().join("logs"), 2);

        let report = runner
            .run(vec![
                record("frames/a.jpg", Some("(d) Grasping")),
                record("frames/b.jpg", Some("E")),
                record("frames/c.jpg", None),
            ])
            .await
            .unwrap();

        assert_eq!(report.total_rows, 3);
        assert_eq!(report.answered, 3);
        assert_eq!(report.graded, 2);
        assert_eq!(report.correct, 1);
        assert_eq!(report.accuracy, 0.5);
        assert_eq!(report.accepted_initial_rate, 1.0);
        assert_eq!(report.rows.iter().map(|r| r.row).collect::<Vec<_>>(), vec![0, 1, 2]);

        let log = std::fs::read_to_string(dir.path().join("logs/a_Action_Recognition_0.json")).unwrap();
        let json: serde_json::Value = serde_json::from_str(&log).unwrap();
        assert_eq!(json["result"]["metrics"]["kg_consistency"], true);
        assert_eq!(json["candidates"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn test_report_statistics() {
        let report = compute_report(vec![
            row(100.0, Some(true), DebateOutcome::AcceptedInitial),
            row(300.0, Some(false), DebateOutcome::Selected),
            row(200.0, None, DebateOutcome::SelectionFallback),
        ]);

        assert_eq!(report.graded, 2);
        assert_eq!(report.accuracy, 0.5);
        assert_eq!(report.avg_latency_ms, 200.0);
        assert_eq!(report.p50_latency_ms, 200.0);
        assert_eq!(report.p95_latency_ms, 300.0);
        assert_eq!(report.avg_refinements, 2.0);
    }

    #[test]
    fn test_empty_report() {
        let report = compute_report(Vec::new());
        assert_eq!(report.accuracy, 0.0);
        assert_eq!(report.p95_latency_ms, 0.0);
    }
}
