//! Derived portfolio metrics.
//!
//! Pure, deterministic functions over ledger and insight snapshots, kept
//! free of the async machinery so they are trivially testable.

use serde::{Deserialize, Serialize};

use crate::types::{BillingCycle, Recommendation, SubscriptionRecord};

/// Readiness checklist derived from current state. Computed, never stored.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Checklist {
    /// Any record has been linked/verified
    pub any_linked: bool,
    /// The recommendation set is non-empty
    pub has_recommendations: bool,
    /// Remote sync is currently active
    pub sync_active: bool,
    /// Any record has synced telemetry
    pub any_synced: bool,
}

/// Total monthly burn: monthly amounts as-is, yearly amounts divided by 12.
pub fn monthly_burn(records: &[SubscriptionRecord]) -> f64 {
    records
        .iter()
        .map(|r| match r.cycle {
            BillingCycle::Monthly => r.amount,
            BillingCycle::Yearly => r.amount / 12.0,
        })
        .sum()
}

/// Total potential saving across the current recommendation set.
pub fn potential_savings(recommendations: &[Recommendation]) -> f64 {
    recommendations.iter().map(|r| r.potential_saving).sum()
}

/// Compute the readiness checklist.
pub fn checklist(
    records: &[SubscriptionRecord],
    recommendations: &[Recommendation],
    sync_active: bool,
) -> Checklist {
    Checklist {
        any_linked: records.iter().any(|r| r.is_linked),
        has_recommendations: !recommendations.is_empty(),
        sync_active,
        any_synced: records.iter().any(|r| r.last_synced_at.is_some()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Category, RecommendedAction};
    use chrono::Utc;

    fn record(name: &str, amount: f64, cycle: BillingCycle) -> SubscriptionRecord {
        SubscriptionRecord {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.to_string(),
            amount,
            currency: "$".to_string(),
            cycle,
            category: Category::Other,
            usage_level: 50,
            next_billing_date: "Next month".to_string(),
            icon: "💳".to_string(),
            is_linked: false,
            last_synced_at: None,
            efficiency_score: None,
        }
    }

    #[test]
    fn test_monthly_burn_normalizes_yearly() {
        let records = vec![
            record("A", 12.00, BillingCycle::Monthly),
            record("B", 120.00, BillingCycle::Yearly),
        ];

        assert!((monthly_burn(&records) - 22.00).abs() < f64::EPSILON);
    }

    #[test]
    fn test_monthly_burn_empty() {
        assert_eq!(monthly_burn(&[]), 0.0);
    }

    #[test]
    fn test_potential_savings_sums() {
        let recs = vec![
            Recommendation {
                id: "r1".to_string(),
                subscription_name: "A".to_string(),
                action: RecommendedAction::Cancel,
                reasoning: String::new(),
                potential_saving: 9.99,
                confidence: 0.9,
            },
            Recommendation {
                id: "r2".to_string(),
                subscription_name: "B".to_string(),
                action: RecommendedAction::Downgrade,
                reasoning: String::new(),
                potential_saving: 5.01,
                confidence: 0.7,
            },
        ];

        assert!((potential_savings(&recs) - 15.00).abs() < f64::EPSILON);
    }

    #[test]
    fn test_checklist_booleans() {
        let mut records = vec![record("A", 10.0, BillingCycle::Monthly)];
        let empty = checklist(&records, &[], false);
        assert_eq!(empty, Checklist::default());

        records[0].is_linked = true;
        records[0].last_synced_at = Some(Utc::now());
        let full = checklist(&records, &[], true);
        assert!(full.any_linked);
        assert!(full.sync_active);
        assert!(full.any_synced);
        assert!(!full.has_recommendations);
    }
}
