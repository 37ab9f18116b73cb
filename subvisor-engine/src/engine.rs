//! SubvisorEngine - main entry point for the reconciliation core.
//!
//! Owns the canonical ledger and mediates every mutation to it, drives the
//! insight pipeline and advisory session against the model collaborator,
//! and keeps the remote copy reconciled through a debounced background
//! saver. Background failures are logged and contained; nothing here is
//! fatal.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Notify, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use portfolio::{
    metrics, ActivityEntry, ActivityKind, ActivityLog, Category, Checklist, FinancialHealth,
    HealthVisual, Ledger, Recommendation, SubscriptionDraft, SubscriptionRecord, ValidationError,
};
use serde::{Deserialize, Serialize};

use crate::advisor::{AdvisorSession, ChatMessage, QueryOutcome};
use crate::backend::{ModelBackend, ModelError};
use crate::config::EngineConfig;
use crate::insights::{InsightOutcome, InsightPipeline};
use crate::sync::{SyncStatus, SyncStore};

/// Error types for the engine surface.
///
/// Background operations never raise these; they catch their own failures,
/// log a warning-kind activity entry, and preserve prior state.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Enrollment rejected before mutating the ledger
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// A model request failed while being set up on the caller's path
    #[error("Model error: {0}")]
    Model(#[from] ModelError),

    /// No advisory session is open
    #[error("No advisory session is open")]
    NoSession,
}

/// Aggregate figures recomputed from current state on every call.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardMetrics {
    pub monthly_burn: f64,
    pub potential_savings: f64,
    pub checklist: Checklist,
}

/// The state reconciliation and insight orchestration engine.
pub struct SubvisorEngine {
    config: EngineConfig,
    ledger: Arc<RwLock<Ledger>>,
    activity: Arc<RwLock<ActivityLog>>,
    insights: InsightPipeline,
    advisor: RwLock<Option<Arc<AdvisorSession>>>,
    backend: Arc<dyn ModelBackend>,
    store: Arc<dyn SyncStore>,
    dirty: Arc<AtomicBool>,
    save_notify: Arc<Notify>,
    bootstrapped: AtomicBool,
    saver: std::sync::Mutex<Option<JoinHandle<()>>>,
    shutdown_tx: watch::Sender<bool>,
}

impl SubvisorEngine {
    /// Create an engine with the default configuration.
    pub fn new(backend: Arc<dyn ModelBackend>, store: Arc<dyn SyncStore>) -> Self {
        Self::with_config(backend, store, EngineConfig::default())
    }

    /// Create an engine with an explicit configuration.
    pub fn with_config(
        backend: Arc<dyn ModelBackend>,
        store: Arc<dyn SyncStore>,
        config: EngineConfig,
    ) -> Self {
        let activity = Arc::new(RwLock::new(ActivityLog::with_capacity(
            config.activity_capacity,
        )));
        let (shutdown_tx, _) = watch::channel(false);

        Self {
            config,
            ledger: Arc::new(RwLock::new(Ledger::new())),
            activity: Arc::clone(&activity),
            insights: InsightPipeline::new(Arc::clone(&backend), activity),
            advisor: RwLock::new(None),
            backend,
            store,
            dirty: Arc::new(AtomicBool::new(false)),
            save_notify: Arc::new(Notify::new()),
            bootstrapped: AtomicBool::new(false),
            saver: std::sync::Mutex::new(None),
            shutdown_tx,
        }
    }

    /// Populate the ledger from the remote store, or fall back to the
    /// built-in seed, then start the debounced saver.
    ///
    /// At most one canonical load ever happens; repeated calls are no-ops.
    pub async fn bootstrap(&self) {
        if self.bootstrapped.swap(true, Ordering::SeqCst) {
            debug!("Bootstrap already ran; ignoring");
            return;
        }

        let provider = self.store.status().provider;
        match self.store.load_all().await {
            Ok(Some(records)) if !records.is_empty() => {
                let count = records.len();
                self.ledger.write().await.load(records);
                info!(count, provider, "Ledger loaded from remote");
                self.log(
                    format!("Loaded {} subscriptions from {}", count, provider),
                    ActivityKind::Success,
                )
                .await;
            }
            Ok(_) => {
                self.ledger.write().await.load(Ledger::seed());
                warn!(provider, "Remote returned no data; seeding defaults");
                self.log(
                    "Remote returned no data; loaded built-in defaults",
                    ActivityKind::Warning,
                )
                .await;
            }
            Err(e) => {
                self.ledger.write().await.load(Ledger::seed());
                warn!(provider, error = %e, "Remote load failed; seeding defaults");
                self.log(
                    format!("Remote load failed ({}); loaded built-in defaults", e),
                    ActivityKind::Warning,
                )
                .await;
            }
        }

        self.spawn_saver();
    }

    // --- Mutation surface -------------------------------------------------

    /// Enroll a new subscription from a draft.
    pub async fn enroll(
        &self,
        draft: &SubscriptionDraft,
    ) -> Result<SubscriptionRecord, EngineError> {
        let record = self.ledger.write().await.enroll(draft)?;
        self.log(format!("Enrolled {}", record.name), ActivityKind::Success)
            .await;
        self.mark_dirty();
        Ok(record)
    }

    /// Remove a subscription. Absent ids are a no-op.
    pub async fn remove(&self, id: &str) -> Option<String> {
        let name = self.ledger.write().await.remove(id);
        if let Some(name) = &name {
            self.log(format!("Removed {}", name), ActivityKind::Info).await;
            self.mark_dirty();
        }
        name
    }

    /// Update a subscription's category. Absent ids are a no-op.
    pub async fn update_category(&self, id: &str, category: Category) -> bool {
        let changed = self.ledger.write().await.update_category(id, category);
        if changed {
            self.log(
                format!("Category updated to {}", category.as_str()),
                ActivityKind::Info,
            )
            .await;
            self.mark_dirty();
        }
        changed
    }

    /// Mark a subscription's account as linked. Absent ids are a no-op.
    pub async fn verify_link(&self, id: &str) -> bool {
        let changed = self.ledger.write().await.verify_link(id);
        if changed {
            self.log("Account linked", ActivityKind::Success).await;
            self.mark_dirty();
        }
        changed
    }

    /// Bulk telemetry refresh across the whole ledger.
    pub async fn batch_sync_usage(&self) {
        let count = {
            let mut ledger = self.ledger.write().await;
            let mut rng = rand::thread_rng();
            ledger.batch_sync_usage(&mut rng);
            ledger.len()
        };
        self.log(
            format!("Telemetry sync completed for {} subscriptions", count),
            ActivityKind::Success,
        )
        .await;
        self.mark_dirty();
    }

    // --- Insight surface --------------------------------------------------

    /// Run diagnostic analysis on a point-in-time snapshot.
    pub async fn run_diagnostic(&self) -> InsightOutcome {
        let snapshot = self.ledger.read().await.snapshot();
        self.insights.run_diagnostic(&snapshot).await
    }

    /// Refresh the health report from a point-in-time snapshot.
    pub async fn refresh_health(&self) -> InsightOutcome {
        let snapshot = self.ledger.read().await.snapshot();
        self.insights.refresh_health(&snapshot).await
    }

    /// Render a visual for the current health report.
    pub async fn generate_visual(&self) -> InsightOutcome {
        self.insights.generate_visual().await
    }

    /// Empty the recommendation set and discard the visual.
    pub async fn clear_insights(&self) {
        self.insights.clear_insights().await;
    }

    // --- Advisory surface -------------------------------------------------

    /// Open an advisory session bound to the current ledger and health.
    ///
    /// A previously open session is closed and superseded.
    pub async fn open_advisor(&self) -> Result<(), EngineError> {
        let snapshot = self.ledger.read().await.snapshot();
        let health = self.insights.health().await;

        let session = match AdvisorSession::open(
            self.backend.as_ref(),
            snapshot,
            health,
            Arc::clone(&self.activity),
        )
        .await
        {
            Ok(session) => session,
            Err(e) => {
                warn!(error = %e, "Failed to open advisory session");
                self.log(
                    format!("Advisor unavailable: {}", e),
                    ActivityKind::Warning,
                )
                .await;
                return Err(EngineError::Model(e));
            }
        };

        let mut slot = self.advisor.write().await;
        if let Some(old) = slot.take() {
            old.close();
        }
        *slot = Some(Arc::new(session));
        drop(slot);

        self.log("Advisor session opened", ActivityKind::Ai).await;
        Ok(())
    }

    /// Send one query to the open advisory session.
    pub async fn send_query(&self, text: &str) -> Result<QueryOutcome, EngineError> {
        let session = self
            .advisor
            .read()
            .await
            .clone()
            .ok_or(EngineError::NoSession)?;
        Ok(session.send_query(text).await)
    }

    /// Transcript of the open session, empty when none is open.
    pub async fn transcript(&self) -> Vec<ChatMessage> {
        match self.advisor.read().await.as_ref() {
            Some(session) => session.transcript().await,
            None => Vec::new(),
        }
    }

    /// Close and discard the advisory session.
    pub async fn close_advisor(&self) {
        if let Some(session) = self.advisor.write().await.take() {
            session.close();
            self.log("Advisor session closed", ActivityKind::Info).await;
        }
    }

    // --- Read surface -----------------------------------------------------

    /// Point-in-time copy of the ledger.
    pub async fn records(&self) -> Vec<SubscriptionRecord> {
        self.ledger.read().await.snapshot()
    }

    /// Activity entries, newest first.
    pub async fn activity(&self) -> Vec<ActivityEntry> {
        self.activity.read().await.entries().cloned().collect()
    }

    /// Current recommendation set.
    pub async fn recommendations(&self) -> Vec<Recommendation> {
        self.insights.recommendations().await
    }

    /// Current health report, if any.
    pub async fn health(&self) -> Option<FinancialHealth> {
        self.insights.health().await
    }

    /// Current health visual, if any.
    pub async fn visual(&self) -> Option<HealthVisual> {
        self.insights.visual().await
    }

    /// Read access to the insight pipeline state.
    pub fn insights(&self) -> &InsightPipeline {
        &self.insights
    }

    /// Remote provider status.
    pub fn sync_status(&self) -> SyncStatus {
        self.store.status()
    }

    /// Aggregate figures, recomputed fresh from current state.
    pub async fn metrics(&self) -> DashboardMetrics {
        let records = self.ledger.read().await.snapshot();
        let recommendations = self.insights.recommendations().await;
        let sync_active = self.store.status().is_cloud_active;

        DashboardMetrics {
            monthly_burn: metrics::monthly_burn(&records),
            potential_savings: metrics::potential_savings(&recommendations),
            checklist: metrics::checklist(&records, &recommendations, sync_active),
        }
    }

    /// Flush a pending save and stop the saver task.
    pub async fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);

        if self.dirty.swap(false, Ordering::SeqCst) {
            let snapshot = self.ledger.read().await.snapshot();
            save_snapshot(self.store.as_ref(), &self.activity, &snapshot).await;
        }

        let handle = self.saver.lock().expect("saver lock").take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
    }

    // --- Internals --------------------------------------------------------

    /// Mark persisted state changed and nudge the saver. Exactly one
    /// notification per successful mutation.
    fn mark_dirty(&self) {
        self.dirty.store(true, Ordering::SeqCst);
        self.save_notify.notify_one();
    }

    /// Debounced background saver: first notification starts the debounce
    /// window; when it closes, the then-current snapshot is saved.
    /// Overlapping saves are tolerated by the remote contract.
    fn spawn_saver(&self) {
        let ledger = Arc::clone(&self.ledger);
        let store = Arc::clone(&self.store);
        let activity = Arc::clone(&self.activity);
        let dirty = Arc::clone(&self.dirty);
        let notify = Arc::clone(&self.save_notify);
        let debounce = Duration::from_millis(self.config.save_debounce_ms);
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = notify.notified() => {
                        tokio::time::sleep(debounce).await;
                        if !dirty.swap(false, Ordering::SeqCst) {
                            continue;
                        }
                        let snapshot = ledger.read().await.snapshot();
                        save_snapshot(store.as_ref(), &activity, &snapshot).await;
                    }
                    _ = shutdown_rx.changed() => break,
                }
            }
        });

        *self.saver.lock().expect("saver lock") = Some(handle);
    }

    async fn log(&self, message: impl Into<String>, kind: ActivityKind) {
        self.activity.write().await.record(message, kind);
    }
}

/// Best-effort remote save: failure is logged, never raised.
async fn save_snapshot(
    store: &dyn SyncStore,
    activity: &Arc<RwLock<ActivityLog>>,
    snapshot: &[SubscriptionRecord],
) {
    match store.save_all(snapshot).await {
        Ok(()) => debug!(count = snapshot.len(), "Ledger saved to remote"),
        Err(e) => {
            warn!(error = %e, "Remote save failed");
            activity
                .write()
                .await
                .record(format!("Remote save failed: {}", e), ActivityKind::Warning);
        }
    }
}
