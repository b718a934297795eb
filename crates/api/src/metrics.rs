use debate::{DebateOutcome, DebateResult};
use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

pub struct Metrics {
    // Counters
    total_sessions: AtomicUsize,
    accepted_initial: AtomicUsize,
    accepted_after_refinement: AtomicUsize,
    selected: AtomicUsize,
    selection_fallbacks: AtomicUsize,
    unrefined: AtomicUsize,
    rejected_requests: AtomicUsize,

    // Counts
    total_refinement_rounds: AtomicUsize,
    kg_consistent_first_rounds: AtomicUsize,

    // Timing (in milliseconds)
    total_session_time_ms: AtomicU64,
}

impl Metrics {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            total_sessions: AtomicUsize::new(0),
            accepted_initial: AtomicUsize::new(0),
            accepted_after_refinement: AtomicUsize::new(0),
            selected: AtomicUsize::new(0),
            selection_fallbacks: AtomicUsize::new(0),
            unrefined: AtomicUsize::new(0),
            rejected_requests: AtomicUsize::new(0),
            total_refinement_rounds: AtomicUsize::new(0),
            kg_consistent_first_rounds: AtomicUsize::new(0),
            total_session_time_ms: AtomicU64::new(0),
        })
    }

    pub fn record_session(&self, result: &DebateResult) {
        let trace = &result.trace;
        self.total_sessions.fetch_add(1, Ordering::Relaxed);
        self.total_refinement_rounds.fetch_add(trace.refinements, Ordering::Relaxed);
        self.total_session_time_ms.fetch_add(trace.duration_ms, Ordering::Relaxed);

        if result.metrics.kg_consistency {
            self.kg_consistent_first_rounds.fetch_add(1, Ordering::Relaxed);
        }

        let counter = match trace.outcome {
            DebateOutcome::AcceptedInitial => &self.accepted_initial,
            DebateOutcome::Selected => &self.selected,
            DebateOutcome::SelectionFallback => &self.selection_fallbacks,
            DebateOutcome::NoRefinement => &self.unrefined,
        };
        counter.fetch_add(1, Ordering::Relaxed);

        if trace.refinements > 0 && trace.accepted_round.is_some() {
            self.accepted_after_refinement.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_rejected(&self) {
        self.rejected_requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let total_sessions = self.total_sessions.load(Ordering::Relaxed);
        let total_time = self.total_session_time_ms.load(Ordering::Relaxed) as f64;

        MetricsSnapshot {
            total_sessions,
            accepted_initial: self.accepted_initial.load(Ordering::Relaxed),
            accepted_after_refinement: self.accepted_after_refinement.load(Ordering::Relaxed),
            selected: self.selected.load(Ordering::Relaxed),
            selection_fallbacks: self.selection_fallbacks.load(Ordering::Relaxed),
            unrefined: self.unrefined.load(Ordering::Relaxed),
            rejected_requests: self.rejected_requests.load(Ordering::Relaxed),
            total_refinement_rounds: self.total_refinement_rounds.load(Ordering::Relaxed),
            kg_consistent_first_rounds: self.kg_consistent_first_rounds.load(Ordering::Relaxed),
            avg_session_time_ms: if total_sessions > 0 {
                total_time / total_sessions as f64
            } else {
                0.0
            },
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MetricsSnapshot {
    pub total_sessions: usize,
    pub accepted_initial: usize,
    pub accepted_after_refinement: usize,
    pub selected: usize,
    pub selection_fallbacks: usize,
    pub unrefined: usize,
    pub rejected_requests: usize,
    pub total_refinement_rounds: usize,
    pub kg_consistent_first_rounds: usize,
    pub avg_session_time_ms: f64,
}
