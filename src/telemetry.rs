use serde::Serialize;

use crate::runner::Stage;

/// Events emitted by the pipeline as it works through its stages
#[derive(Debug, Clone)]
pub enum StageEvent {
    /// A stage began executing its statement list
    StageStarted { stage: Stage },
    /// One statement completed successfully
    StatementExecuted {
        rows_affected: u64,
        duration_ms: u64,
    },
    /// Every statement of the stage completed
    StageCompleted { stage: Stage, duration_ms: u64 },
}

/// Per-stage timing
#[derive(Debug, Clone, Serialize)]
pub struct StageTiming {
    pub stage: Stage,
    pub duration_ms: u64,
}

/// Statistics aggregated from stage events
#[derive(Debug, Default, Clone, Serialize)]
pub struct RunStats {
    pub stages_started: usize,
    pub stages_completed: Vec<StageTiming>,
    pub statements_executed: usize,
    pub rows_affected: u64,
    pub statement_durations_ms: Vec<u64>,
}

impl RunStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Update stats with a stage event
    pub fn update(&mut self, event: &StageEvent) {
        match event {
            StageEvent::StageStarted { .. } => {
                self.stages_started += 1;
            }
            StageEvent::StatementExecuted {
                rows_affected,
                duration_ms,
            } => {
                self.statements_executed += 1;
                self.rows_affected += rows_affected;
                self.statement_durations_ms.push(*duration_ms);
            }
            StageEvent::StageCompleted { stage, duration_ms } => {
                self.stages_completed.push(StageTiming {
                    stage: *stage,
                    duration_ms: *duration_ms,
                });
            }
        }
    }

    /// Calculate percentile from statement durations
    pub fn percentile(&self, p: f64) -> Option<u64> {
        if self.statement_durations_ms.is_empty() {
            return None;
        }

        let mut sorted = self.statement_durations_ms.clone();
        sorted.sort_unstable();

        let index = ((p / 100.0) * sorted.len() as f64).ceil() as usize;
        let index = index.saturating_sub(1).min(sorted.len() - 1);

        Some(sorted[index])
    }

    /// Get p50, p90, p99 percentiles
    pub fn get_percentiles(&self) -> (Option<u64>, Option<u64>, Option<u64>) {
        (
            self.percentile(50.0),
            self.percentile(90.0),
            self.percentile(99.0),
        )
    }

    /// Stages that ran to completion, in order
    pub fn completed_stages(&self) -> Vec<Stage> {
        self.stages_completed.iter().map(|t| t.stage).collect()
    }
}
