//! Subvisor Engine - State Reconciliation & Insight Orchestration
//!
//! Owns the canonical subscription ledger and drives the asynchronous work
//! around it:
//! - Trait-based model backends (OpenAI-compatible HTTP, deterministic mock)
//! - Remote sync boundary with a debounced save-after-mutation policy
//! - Insight pipeline (diagnostics, health, visual) with per-kind busy state
//! - Streamed advisory sessions folded into an ordered transcript
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │            SubvisorEngine               │
//! │   (owns the ledger, mediates mutation)  │
//! └──────┬──────────────┬───────────────────┘
//!        │              │
//!        ▼              ▼
//! ┌─────────────┐  ┌──────────────┐  ┌──────────────┐
//! │ SyncStore   │  │ Insight      │  │ Advisor      │
//! │ (file/      │  │ Pipeline     │  │ Session      │
//! │  memory)    │  │              │  │ (streaming)  │
//! └─────────────┘  └──────┬───────┘  └──────┬───────┘
//!                         ▼                 ▼
//!                  ┌─────────────────────────────┐
//!                  │        ModelBackend         │
//!                  └─────────────────────────────┘
//! ```

pub mod advisor;
pub mod backend;
pub mod config;
pub mod engine;
pub mod insights;
pub mod stream;
pub mod sync;

// Re-export main types for convenience
pub use advisor::{AdvisorSession, ChatMessage, ChatRole, QueryOutcome};
pub use backend::{AdvisorBackend, MockModel, ModelBackend, ModelError, OpenAiModel};
pub use config::EngineConfig;
pub use engine::{DashboardMetrics, EngineError, SubvisorEngine};
pub use insights::{InsightOutcome, InsightPipeline, InsightTask, TaskState};
pub use stream::{ReplyChunk, ReplyStream, ReplyStreamSender};
pub use sync::{FileSyncStore, MemorySyncStore, SyncError, SyncStatus, SyncStore};
