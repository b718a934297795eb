use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Serialize;
use std::path::PathBuf;
use tracing::info;
use uuid::Uuid;

use crate::candidate::Candidate;

/// Durable audit record of the candidates produced by one refined session.
#[async_trait]
pub trait CandidateSink: Send + Sync {
    async fn persist(&self, session_id: Uuid, question: &str, candidates: &[Candidate]) -> Result<()>;
}

#[derive(Serialize)]
struct CandidateLog<'a> {
    session_id: Uuid,
    question: &'a str,
    candidates: &'a [Candidate],
}

/// Writes `<dir>/<session_id>_candidates.json`.
#[derive(Debug, Clone)]
pub struct JsonFileSink {
    dir: PathBuf,
}

impl JsonFileSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, session_id: Uuid) -> PathBuf {
        self.dir.join(format!("{}_candidates.json", session_id))
    }
}

#[async_trait]
impl CandidateSink for JsonFileSink {
    async fn persist(&self, session_id: Uuid, question: &str, candidates: &[Candidate]) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .with_context(|| format!("Failed to create {}", self.dir.display()))?;

        let log = CandidateLog {
            session_id,
            question,
            candidates,
        };
        let json = serde_json::to_string_pretty(&log).context("Failed to serialize candidates")?;

        let path = self.path_for(session_id);
        tokio::fs::write(&path, json)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;

        info!(path = %path.display(), count = candidates.len(), "Saved candidates");
        Ok(())
    }
}

/// Drops candidates without recording them.
#[derive(Debug, Clone, Copy, Default)]
pub struct DiscardSink;

#[async_trait]
impl CandidateSink for DiscardSink {
    async fn persist(&self, _session_id: Uuid, _question: &str, _candidates: &[Candidate]) -> Result<()> {
        Ok(())
    }
}
