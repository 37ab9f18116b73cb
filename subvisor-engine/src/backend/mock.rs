//! Mock model backend for testing and offline runs.

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use portfolio::{
    BillingCycle, FinancialHealth, HealthStatus, HealthVisual, Recommendation, RecommendedAction,
    SubscriptionRecord,
};

use super::traits::*;
use crate::stream::ReplyStream;

/// Mock backend with deterministic, snapshot-derived results.
///
/// Identical snapshots always yield identical recommendations and health
/// reports (ids included), so idempotence is testable. Failure modes and
/// reply scripts are configurable per test.
pub struct MockModel {
    model_id: String,
    available: AtomicBool,
    fail_analyze: AtomicBool,
    fail_health: AtomicBool,
    fail_visual: AtomicBool,
    reply_chunks: Vec<String>,
    fail_mid_stream: bool,
    analyze_calls: AtomicU32,
    health_calls: AtomicU32,
    visual_calls: AtomicU32,
}

impl MockModel {
    /// Create a new mock backend.
    pub fn new(model_id: impl Into<String>) -> Self {
        Self {
            model_id: model_id.into(),
            available: AtomicBool::new(true),
            fail_analyze: AtomicBool::new(false),
            fail_health: AtomicBool::new(false),
            fail_visual: AtomicBool::new(false),
            reply_chunks: vec!["Happy to help with your subscriptions.".to_string()],
            fail_mid_stream: false,
            analyze_calls: AtomicU32::new(0),
            health_calls: AtomicU32::new(0),
            visual_calls: AtomicU32::new(0),
        }
    }

    /// Set availability.
    pub fn with_available(self, available: bool) -> Self {
        self.available.store(available, Ordering::SeqCst);
        self
    }

    /// Make diagnostic analysis fail.
    pub fn with_failing_analyze(self) -> Self {
        self.fail_analyze.store(true, Ordering::SeqCst);
        self
    }

    /// Make health reporting fail.
    pub fn with_failing_health(self) -> Self {
        self.fail_health.store(true, Ordering::SeqCst);
        self
    }

    /// Make visual synthesis fail.
    pub fn with_failing_visual(self) -> Self {
        self.fail_visual.store(true, Ordering::SeqCst);
        self
    }

    /// Script the chunks every advisory reply streams.
    pub fn with_reply_chunks(mut self, chunks: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.reply_chunks = chunks.into_iter().map(Into::into).collect();
        self
    }

    /// Make advisory streams fail after the first chunk.
    pub fn with_mid_stream_failure(mut self) -> Self {
        self.fail_mid_stream = true;
        self
    }

    /// Number of analyze calls issued.
    pub fn analyze_calls(&self) -> u32 {
        self.analyze_calls.load(Ordering::SeqCst)
    }

    /// Number of health-report calls issued.
    pub fn health_calls(&self) -> u32 {
        self.health_calls.load(Ordering::SeqCst)
    }

    /// Number of visual calls issued.
    pub fn visual_calls(&self) -> u32 {
        self.visual_calls.load(Ordering::SeqCst)
    }

    fn check_available(&self) -> Result<(), ModelError> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(ModelError::Unavailable("Mock backend disabled".to_string()))
        }
    }
}

impl Default for MockModel {
    fn default() -> Self {
        Self::new("mock-model")
    }
}

fn monthly_amount(record: &SubscriptionRecord) -> f64 {
    match record.cycle {
        BillingCycle::Monthly => record.amount,
        BillingCycle::Yearly => record.amount / 12.0,
    }
}

#[async_trait]
impl ModelBackend for MockModel {
    fn id(&self) -> &str {
        &self.model_id
    }

    async fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }

    async fn analyze(
        &self,
        records: &[SubscriptionRecord],
    ) -> Result<Vec<Recommendation>, ModelError> {
        self.analyze_calls.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;

        if self.fail_analyze.load(Ordering::SeqCst) {
            return Err(ModelError::RequestFailed("Mock analyze failure".to_string()));
        }

        Ok(records
            .iter()
            .map(|record| {
                let (action, potential_saving, confidence) = match record.usage_level {
                    0..=39 => (RecommendedAction::Cancel, monthly_amount(record), 0.9),
                    40..=59 => (RecommendedAction::Downgrade, monthly_amount(record) * 0.4, 0.75),
                    60..=79 => (RecommendedAction::Review, 0.0, 0.6),
                    _ => (RecommendedAction::Keep, 0.0, 0.95),
                };

                Recommendation {
                    // Derived from the record id so identical snapshots
                    // produce identical recommendation sets
                    id: format!("rec-{}", record.id),
                    subscription_name: record.name.clone(),
                    action,
                    reasoning: format!(
                        "Usage level {} for {}",
                        record.usage_level, record.name
                    ),
                    potential_saving,
                    confidence,
                }
            })
            .collect())
    }

    async fn health_report(
        &self,
        records: &[SubscriptionRecord],
    ) -> Result<FinancialHealth, ModelError> {
        self.health_calls.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;

        if self.fail_health.load(Ordering::SeqCst) {
            return Err(ModelError::RequestFailed("Mock health failure".to_string()));
        }

        let score = if records.is_empty() {
            100
        } else {
            (records.iter().map(|r| r.usage_level as u32).sum::<u32>() / records.len() as u32) as u8
        };

        Ok(FinancialHealth {
            score,
            status: HealthStatus::from_score(score),
            summary: format!("Average usage across {} subscriptions: {}", records.len(), score),
        })
    }

    async fn health_visual(&self, health: &FinancialHealth) -> Result<HealthVisual, ModelError> {
        self.visual_calls.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;

        if self.fail_visual.load(Ordering::SeqCst) {
            return Err(ModelError::RequestFailed("Mock visual failure".to_string()));
        }

        Ok(HealthVisual {
            data_uri: format!(
                "data:image/svg+xml;utf8,<svg><text>score {}</text></svg>",
                health.score
            ),
            score: health.score,
        })
    }

    async fn open_session(
        &self,
        records: Vec<SubscriptionRecord>,
        _health: Option<FinancialHealth>,
    ) -> Result<Box<dyn AdvisorBackend>, ModelError> {
        self.check_available()?;

        Ok(Box::new(MockAdvisor {
            snapshot_len: records.len(),
            reply_chunks: self.reply_chunks.clone(),
            fail_mid_stream: self.fail_mid_stream,
        }))
    }
}

/// Mock conversational session: streams the scripted chunks per query.
struct MockAdvisor {
    #[allow(dead_code)]
    snapshot_len: usize,
    reply_chunks: Vec<String>,
    fail_mid_stream: bool,
}

#[async_trait]
impl AdvisorBackend for MockAdvisor {
    async fn stream_query(&mut self, _text: &str) -> Result<ReplyStream, ModelError> {
        let chunks = self.reply_chunks.clone();
        let fail_mid_stream = self.fail_mid_stream;
        let (sender, stream) = ReplyStream::channel(8);

        tokio::spawn(async move {
            let last = chunks.len().saturating_sub(1);
            for (i, chunk) in chunks.into_iter().enumerate() {
                if fail_mid_stream && i > 0 {
                    sender.abort();
                    return;
                }
                if i == last {
                    let _ = sender.finish(chunk).await;
                    return;
                }
                if sender.send(chunk).await.is_err() {
                    return;
                }
            }
        });

        Ok(stream)
    }
}
