//! Portfolio - Subscription Ledger Domain
//!
//! Pure, synchronous domain layer for Subvisor:
//! - The canonical subscription ledger and its mutation operations
//! - A bounded, newest-first activity log
//! - Derived metrics (monthly burn, potential savings, readiness checklist)
//!
//! No I/O and no async machinery lives here; the `subvisor-engine` crate
//! wraps these under its own locks and drives the asynchronous work.

pub mod activity;
pub mod ledger;
pub mod metrics;
pub mod types;

// Re-export main types for convenience
pub use activity::{ActivityEntry, ActivityKind, ActivityLog};
pub use ledger::{Ledger, ValidationError};
pub use metrics::Checklist;
pub use types::{
    BillingCycle, Category, FinancialHealth, HealthStatus, HealthVisual, Recommendation,
    RecommendedAction, SubscriptionDraft, SubscriptionRecord,
};
