//! Insight pipeline.
//!
//! Drives the three one-shot model request kinds — diagnostic analysis,
//! health reporting, visual synthesis — each with its own task state so one
//! kind never blocks another. Results replace prior state wholesale on
//! success; failures leave prior state intact, flag the task `Errored`, and
//! log a warning. No failure here is fatal.

use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use portfolio::{
    ActivityKind, ActivityLog, FinancialHealth, HealthVisual, Recommendation, SubscriptionRecord,
};

use crate::backend::ModelBackend;

/// The three independently-triggerable request kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsightTask {
    Diagnostic,
    Health,
    Visual,
}

/// Per-kind task state. Replaces ad hoc busy booleans so the re-entrancy
/// guard and error reporting stay uniform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TaskState {
    #[default]
    Idle,
    InFlight,
    Errored,
}

/// What happened to an insight request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsightOutcome {
    /// Request ran and its result was applied
    Completed,
    /// A request of the same kind is already in flight; this one was ignored
    Busy,
    /// The request was a guarded no-op (e.g. no health record to visualize)
    Skipped,
    /// The request failed; prior state is intact
    Failed,
}

#[derive(Debug, Default)]
struct PipelineState {
    recommendations: Vec<Recommendation>,
    health: Option<FinancialHealth>,
    visual: Option<HealthVisual>,
    diagnostic: TaskState,
    health_task: TaskState,
    visual_task: TaskState,
}

impl PipelineState {
    fn task(&mut self, task: InsightTask) -> &mut TaskState {
        match task {
            InsightTask::Diagnostic => &mut self.diagnostic,
            InsightTask::Health => &mut self.health_task,
            InsightTask::Visual => &mut self.visual_task,
        }
    }
}

/// Orchestrates insight requests against the model collaborator.
pub struct InsightPipeline {
    backend: Arc<dyn ModelBackend>,
    activity: Arc<RwLock<ActivityLog>>,
    state: Arc<RwLock<PipelineState>>,
}

impl InsightPipeline {
    /// Create a pipeline over a backend, logging to the shared activity log.
    pub fn new(backend: Arc<dyn ModelBackend>, activity: Arc<RwLock<ActivityLog>>) -> Self {
        Self {
            backend,
            activity,
            state: Arc::new(RwLock::new(PipelineState::default())),
        }
    }

    /// Run diagnostic analysis on a ledger snapshot.
    ///
    /// On success replaces the recommendation set wholesale and triggers a
    /// health-report refresh as a paired follow-up with the same snapshot.
    pub async fn run_diagnostic(&self, snapshot: &[SubscriptionRecord]) -> InsightOutcome {
        if !self.try_begin(InsightTask::Diagnostic).await {
            return InsightOutcome::Busy;
        }

        match self.backend.analyze(snapshot).await {
            Ok(recommendations) => {
                let count = recommendations.len();
                {
                    let mut state = self.state.write().await;
                    state.recommendations = recommendations;
                    state.diagnostic = TaskState::Idle;
                }
                self.log(
                    format!("Diagnostic analysis produced {} recommendations", count),
                    ActivityKind::Ai,
                )
                .await;

                // Paired follow-up with the same snapshot
                self.refresh_health(snapshot).await;
                InsightOutcome::Completed
            }
            Err(e) => {
                self.fail(InsightTask::Diagnostic, "Diagnostic analysis failed", e)
                    .await
            }
        }
    }

    /// Refresh the health report from a ledger snapshot.
    pub async fn refresh_health(&self, snapshot: &[SubscriptionRecord]) -> InsightOutcome {
        if !self.try_begin(InsightTask::Health).await {
            return InsightOutcome::Busy;
        }

        match self.backend.health_report(snapshot).await {
            Ok(health) => {
                let score = health.score;
                {
                    let mut state = self.state.write().await;
                    state.health = Some(health);
                    state.health_task = TaskState::Idle;
                }
                self.log(
                    format!("Health report refreshed: score {}", score),
                    ActivityKind::Ai,
                )
                .await;
                InsightOutcome::Completed
            }
            Err(e) => self.fail(InsightTask::Health, "Health report failed", e).await,
        }
    }

    /// Render a visual for the current health report.
    ///
    /// Guarded no-op when no health record exists yet.
    pub async fn generate_visual(&self) -> InsightOutcome {
        let health = {
            let state = self.state.read().await;
            if state.visual_task == TaskState::InFlight {
                return InsightOutcome::Busy;
            }
            match &state.health {
                Some(health) => health.clone(),
                None => {
                    debug!("No health record to visualize; skipping");
                    return InsightOutcome::Skipped;
                }
            }
        };

        if !self.try_begin(InsightTask::Visual).await {
            return InsightOutcome::Busy;
        }

        match self.backend.health_visual(&health).await {
            Ok(visual) => {
                {
                    let mut state = self.state.write().await;
                    state.visual = Some(visual);
                    state.visual_task = TaskState::Idle;
                }
                self.log("Health visual rendered", ActivityKind::Ai).await;
                InsightOutcome::Completed
            }
            Err(e) => self.fail(InsightTask::Visual, "Health visual failed", e).await,
        }
    }

    /// Empty the recommendation set and discard the visual.
    ///
    /// The health record survives a reset.
    pub async fn clear_insights(&self) {
        {
            let mut state = self.state.write().await;
            state.recommendations.clear();
            state.visual = None;
        }
        self.log("Insights cleared", ActivityKind::Info).await;
    }

    /// Current recommendation set.
    pub async fn recommendations(&self) -> Vec<Recommendation> {
        self.state.read().await.recommendations.clone()
    }

    /// Current health report, if any.
    pub async fn health(&self) -> Option<FinancialHealth> {
        self.state.read().await.health.clone()
    }

    /// Current health visual, if any.
    pub async fn visual(&self) -> Option<HealthVisual> {
        self.state.read().await.visual.clone()
    }

    /// State of one request kind.
    pub async fn task_state(&self, task: InsightTask) -> TaskState {
        let state = self.state.read().await;
        match task {
            InsightTask::Diagnostic => state.diagnostic,
            InsightTask::Health => state.health_task,
            InsightTask::Visual => state.visual_task,
        }
    }

    /// Atomically move a task to `InFlight`, unless it already is.
    async fn try_begin(&self, task: InsightTask) -> bool {
        let mut state = self.state.write().await;
        let slot = state.task(task);
        if *slot == TaskState::InFlight {
            false
        } else {
            *slot = TaskState::InFlight;
            true
        }
    }

    async fn fail(
        &self,
        task: InsightTask,
        context: &str,
        error: crate::backend::ModelError,
    ) -> InsightOutcome {
        warn!(?task, error = %error, "{}", context);
        {
            let mut state = self.state.write().await;
            *state.task(task) = TaskState::Errored;
        }
        self.log(format!("{}: {}", context, error), ActivityKind::Warning)
            .await;
        InsightOutcome::Failed
    }

    async fn log(&self, message: impl Into<String>, kind: ActivityKind) {
        self.activity.write().await.record(message, kind);
    }
}
