//! Core types for the subscription portfolio.
//!
//! These model the records the ledger owns plus the insight artifacts
//! (recommendations, health reports, visuals) produced against it. Serde
//! spellings match the external data model, so `CloudStorage` serializes as
//! `"Cloud Storage"` and `SubOptimal` as `"Sub-optimal"`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// How often a subscription bills.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BillingCycle {
    Monthly,
    Yearly,
}

impl Default for BillingCycle {
    fn default() -> Self {
        Self::Monthly
    }
}

/// Spending category for a subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    Entertainment,
    Productivity,
    Fitness,
    #[serde(rename = "Cloud Storage")]
    CloudStorage,
    Other,
}

impl Default for Category {
    fn default() -> Self {
        Self::Other
    }
}

impl Category {
    /// String representation for prompts and display.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Entertainment => "Entertainment",
            Self::Productivity => "Productivity",
            Self::Fitness => "Fitness",
            Self::CloudStorage => "Cloud Storage",
            Self::Other => "Other",
        }
    }
}

/// A recurring-billing subscription owned by the ledger.
///
/// Identity is the opaque `id`, assigned at enrollment and never reused.
/// Everything else is mutable through the ledger's targeted operations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionRecord {
    /// Unique identifier (uuid v4)
    pub id: String,
    /// Display name
    pub name: String,
    /// Billed amount, always >= 0
    pub amount: f64,
    /// Currency symbol
    pub currency: String,
    /// Billing cycle
    pub cycle: BillingCycle,
    /// Spending category
    pub category: Category,
    /// Usage level, 0-100
    pub usage_level: u8,
    /// Next billing date (display string)
    pub next_billing_date: String,
    /// Icon glyph
    pub icon: String,
    /// Whether the account has been linked/verified
    pub is_linked: bool,
    /// When usage was last synced from telemetry
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_synced_at: Option<DateTime<Utc>>,
    /// Efficiency score, 0-100, set by telemetry sync
    #[serde(skip_serializing_if = "Option::is_none")]
    pub efficiency_score: Option<u8>,
}

/// User-supplied input to enrollment.
///
/// The amount is carried as entered so validation can distinguish a missing
/// amount from an unparseable one before any ledger mutation happens.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SubscriptionDraft {
    pub name: String,
    pub amount: String,
    pub cycle: BillingCycle,
    pub category: Category,
}

impl SubscriptionDraft {
    /// Create a draft with the required fields.
    pub fn new(name: impl Into<String>, amount: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            amount: amount.into(),
            ..Default::default()
        }
    }

    /// Set the billing cycle.
    pub fn with_cycle(mut self, cycle: BillingCycle) -> Self {
        self.cycle = cycle;
        self
    }

    /// Set the category.
    pub fn with_category(mut self, category: Category) -> Self {
        self.category = category;
        self
    }
}

/// Recommended action for a subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecommendedAction {
    Keep,
    Cancel,
    Downgrade,
    Review,
}

/// A single savings recommendation from diagnostic analysis.
///
/// The subject is carried by name, not by live reference: recommendations
/// survive ledger mutations that happen after the snapshot they were
/// computed from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recommendation {
    pub id: String,
    pub subscription_name: String,
    pub action: RecommendedAction,
    pub reasoning: String,
    /// Monthly amount that could be saved, >= 0
    pub potential_saving: f64,
    /// Model confidence, 0.0-1.0
    pub confidence: f64,
}

/// Aggregate health status bands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HealthStatus {
    Critical,
    #[serde(rename = "Sub-optimal")]
    SubOptimal,
    Good,
    Excellent,
}

impl HealthStatus {
    /// Band for a 0-100 score.
    pub fn from_score(score: u8) -> Self {
        match score {
            0..=39 => Self::Critical,
            40..=64 => Self::SubOptimal,
            65..=84 => Self::Good,
            _ => Self::Excellent,
        }
    }
}

/// One-shot aggregate financial health report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinancialHealth {
    /// 0-100 score
    pub score: u8,
    pub status: HealthStatus,
    pub summary: String,
}

/// Rendered visual for a health report.
///
/// The payload is opaque to the engine (typically a data URI); the score it
/// was rendered for ties it back to the health record that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthVisual {
    pub data_uri: String,
    pub score: u8,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_external_spelling() {
        let json = serde_json::to_string(&Category::CloudStorage).unwrap();
        assert_eq!(json, "\"Cloud Storage\"");

        let back: Category = serde_json::from_str("\"Cloud Storage\"").unwrap();
        assert_eq!(back, Category::CloudStorage);
    }

    #[test]
    fn test_health_status_spelling_and_bands() {
        let json = serde_json::to_string(&HealthStatus::SubOptimal).unwrap();
        assert_eq!(json, "\"Sub-optimal\"");

        assert_eq!(HealthStatus::from_score(10), HealthStatus::Critical);
        assert_eq!(HealthStatus::from_score(50), HealthStatus::SubOptimal);
        assert_eq!(HealthStatus::from_score(70), HealthStatus::Good);
        assert_eq!(HealthStatus::from_score(90), HealthStatus::Excellent);
    }

    #[test]
    fn test_record_roundtrip() {
        let record = SubscriptionRecord {
            id: "sub-1".to_string(),
            name: "Netflix".to_string(),
            amount: 15.49,
            currency: "$".to_string(),
            cycle: BillingCycle::Monthly,
            category: Category::Entertainment,
            usage_level: 80,
            next_billing_date: "Next month".to_string(),
            icon: "🎬".to_string(),
            is_linked: false,
            last_synced_at: None,
            efficiency_score: None,
        };

        let json = serde_json::to_string(&record).unwrap();
        assert!(json.contains("\"usageLevel\":80"));
        assert!(json.contains("\"cycle\":\"monthly\""));

        let back: SubscriptionRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back, record);
    }
}
