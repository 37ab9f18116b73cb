//! Core traits for model backends.
//!
//! `ModelBackend` abstracts the generative-model collaborator behind the
//! four request kinds the engine drives: diagnostic analysis, health
//! reporting, visual synthesis, and conversational sessions. Every failure
//! is recoverable — callers log it and keep prior state.

use async_trait::async_trait;
use portfolio::{FinancialHealth, HealthVisual, Recommendation, SubscriptionRecord};

use crate::stream::ReplyStream;

/// Error types for model operations.
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    /// Backend is not reachable or disabled
    #[error("Model unavailable: {0}")]
    Unavailable(String),

    /// Request was rejected or failed at the backend
    #[error("Model request failed: {0}")]
    RequestFailed(String),

    /// Transport problem
    #[error("Network error: {0}")]
    NetworkError(String),

    /// Response could not be parsed into the expected shape
    #[error("Parse error: {0}")]
    ParseError(String),

    /// Rate limited by the backend
    #[error("Rate limited, retry after {retry_after_ms:?}ms")]
    RateLimited { retry_after_ms: Option<u64> },
}

/// Core trait for generative-model backends.
#[async_trait]
pub trait ModelBackend: Send + Sync {
    /// Backend identifier (e.g. model name).
    fn id(&self) -> &str;

    /// Check if the backend is currently available.
    async fn is_available(&self) -> bool;

    /// Diagnostic analysis: one-shot request producing a wholesale
    /// recommendation set for the given ledger snapshot.
    async fn analyze(
        &self,
        records: &[SubscriptionRecord],
    ) -> Result<Vec<Recommendation>, ModelError>;

    /// One-shot aggregate health report for the given ledger snapshot.
    async fn health_report(
        &self,
        records: &[SubscriptionRecord],
    ) -> Result<FinancialHealth, ModelError>;

    /// Render a visual for a health report.
    async fn health_visual(&self, health: &FinancialHealth) -> Result<HealthVisual, ModelError>;

    /// Open a conversational session bound to a point-in-time snapshot.
    ///
    /// The snapshot is captured once; later ledger mutations do not reach
    /// the session.
    async fn open_session(
        &self,
        records: Vec<SubscriptionRecord>,
        health: Option<FinancialHealth>,
    ) -> Result<Box<dyn AdvisorBackend>, ModelError>;
}

/// One live conversational exchange with the model collaborator.
///
/// Implementations keep conversational context across queries for the life
/// of the session.
#[async_trait]
pub trait AdvisorBackend: Send + Sync {
    /// Stream the reply to one query.
    ///
    /// The returned stream is finite and not restartable; it may end early
    /// on a mid-stream failure, in which case increments already delivered
    /// stand.
    async fn stream_query(&mut self, text: &str) -> Result<ReplyStream, ModelError>;
}
