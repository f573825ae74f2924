//! Progress and diagnostics hooks injected by the caller.

use std::collections::BTreeMap;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

/// One progress notification of a sweep or batch.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProgressUpdate {
    pub completed: usize,
    pub total: usize,
    /// Best score seen so far; negative before any combination finished.
    pub best_score: f32,
    pub message: String,
}

impl ProgressUpdate {
    /// Completion percentage, clamped to `[0, 100]`.
    pub fn percent(&self) -> f32 {
        if self.total == 0 {
            return 100.0;
        }
        (self.completed as f32 / self.total as f32 * 100.0).clamp(0.0, 100.0)
    }
}

/// Receives progress notifications; must not block.
pub trait ProgressSink: Sync {
    fn report(&self, update: &ProgressUpdate);
}

impl<F> ProgressSink for F
where
    F: Fn(&ProgressUpdate) + Sync,
{
    fn report(&self, update: &ProgressUpdate) {
        self(update)
    }
}

/// Discards all notifications.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn report(&self, _update: &ProgressUpdate) {}
}

/// Per-invocation run statistics.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SweepDiagnostics {
    /// Caller-supplied label, e.g. the box id.
    pub label: Option<String>,
    /// Raw circle count per combination key.
    pub combination_counts: BTreeMap<String, usize>,
    pub final_circle_count: usize,
    pub total_combinations_tested: usize,
    pub failed_combinations: usize,
    /// Worker threads used, 1 for sequential runs.
    pub workers: usize,
}

/// Receives the statistics of each detection call.
pub trait DiagnosticsSink: Sync {
    fn record(&self, diagnostics: &SweepDiagnostics);
}

#[derive(Clone, Copy, Debug, Default)]
pub struct NoopDiagnostics;

impl DiagnosticsSink for NoopDiagnostics {
    fn record(&self, _diagnostics: &SweepDiagnostics) {}
}

/// Keeps every record in memory, in arrival order.
#[derive(Debug, Default)]
pub struct MemoryDiagnostics {
    records: Mutex<Vec<SweepDiagnostics>>,
}

impl MemoryDiagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<SweepDiagnostics> {
        match self.records.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl DiagnosticsSink for MemoryDiagnostics {
    fn record(&self, diagnostics: &SweepDiagnostics) {
        let mut guard = match self.records.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        guard.push(diagnostics.clone());
    }
}
