//! The canonical subscription ledger.
//!
//! Pure, synchronous, single-owner: the engine wraps a `Ledger` in its own
//! lock, so every operation here is atomic from the caller's point of view.
//! Validation happens before any mutation — a rejected enrollment leaves the
//! ledger untouched and consumes no id.

use chrono::Utc;
use rand::Rng;

use crate::types::{BillingCycle, Category, SubscriptionDraft, SubscriptionRecord};

/// Default usage level assigned at enrollment, before any telemetry sync.
const DEFAULT_USAGE_LEVEL: u8 = 50;

/// Error types for ledger validation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// Enrollment draft has no name
    #[error("Subscription name is required")]
    MissingName,

    /// Enrollment draft has no amount
    #[error("Subscription amount is required")]
    MissingAmount,

    /// Amount could not be parsed as a non-negative number
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),
}

/// Canonical ordered collection of subscription records.
#[derive(Debug, Clone, Default)]
pub struct Ledger {
    records: Vec<SubscriptionRecord>,
}

impl Ledger {
    /// Create an empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the entire ledger. Never merges.
    ///
    /// Used once at bootstrap, or on explicit reset.
    pub fn load(&mut self, records: Vec<SubscriptionRecord>) {
        self.records = records;
    }

    /// Validate and append a new subscription from a draft.
    ///
    /// Assigns a fresh id and default usage/status fields. Returns the new
    /// record. Rejected drafts leave the ledger unchanged.
    pub fn enroll(&mut self, draft: &SubscriptionDraft) -> Result<SubscriptionRecord, ValidationError> {
        let name = draft.name.trim();
        if name.is_empty() {
            return Err(ValidationError::MissingName);
        }

        let raw_amount = draft.amount.trim();
        if raw_amount.is_empty() {
            return Err(ValidationError::MissingAmount);
        }

        let amount: f64 = raw_amount
            .parse()
            .map_err(|_| ValidationError::InvalidAmount(raw_amount.to_string()))?;
        if !amount.is_finite() || amount < 0.0 {
            return Err(ValidationError::InvalidAmount(raw_amount.to_string()));
        }

        let record = SubscriptionRecord {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.to_string(),
            amount,
            currency: "$".to_string(),
            cycle: draft.cycle,
            category: draft.category,
            usage_level: DEFAULT_USAGE_LEVEL,
            next_billing_date: "Next month".to_string(),
            icon: "💳".to_string(),
            is_linked: false,
            last_synced_at: None,
            efficiency_score: None,
        };

        self.records.push(record.clone());
        Ok(record)
    }

    /// Remove a record by id, returning its prior name for logging.
    ///
    /// An absent id is a no-op, not an error.
    pub fn remove(&mut self, id: &str) -> Option<String> {
        let index = self.records.iter().position(|r| r.id == id)?;
        Some(self.records.remove(index).name)
    }

    /// Update a record's category. Returns false when the id is absent.
    pub fn update_category(&mut self, id: &str, category: Category) -> bool {
        match self.records.iter_mut().find(|r| r.id == id) {
            Some(record) => {
                record.category = category;
                true
            }
            None => false,
        }
    }

    /// Mark a record's account as linked/verified. Returns false when absent.
    pub fn verify_link(&mut self, id: &str) -> bool {
        match self.records.iter_mut().find(|r| r.id == id) {
            Some(record) => {
                record.is_linked = true;
                true
            }
            None => false,
        }
    }

    /// Bulk telemetry refresh: every record gets a fresh usage level in
    /// [20,100), an efficiency score in [40,100), a sync stamp, and is
    /// marked linked. Safe to call repeatedly.
    pub fn batch_sync_usage<R: Rng>(&mut self, rng: &mut R) {
        let now = Utc::now();
        for record in &mut self.records {
            record.usage_level = rng.gen_range(20..100);
            record.efficiency_score = Some(rng.gen_range(40..100));
            record.last_synced_at = Some(now);
            record.is_linked = true;
        }
    }

    /// Read access to the records in ledger order.
    pub fn records(&self) -> &[SubscriptionRecord] {
        &self.records
    }

    /// Owned point-in-time copy, safe to hand to background tasks.
    pub fn snapshot(&self) -> Vec<SubscriptionRecord> {
        self.records.clone()
    }

    /// Look up a record by id.
    pub fn get(&self, id: &str) -> Option<&SubscriptionRecord> {
        self.records.iter().find(|r| r.id == id)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// The fixed built-in default set, used when the remote has no usable
    /// copy at bootstrap.
    pub fn seed() -> Vec<SubscriptionRecord> {
        [
            ("Netflix", 15.49, BillingCycle::Monthly, Category::Entertainment, "🎬", 85),
            ("Spotify", 10.99, BillingCycle::Monthly, Category::Entertainment, "🎵", 92),
            ("Adobe CC", 599.88, BillingCycle::Yearly, Category::Productivity, "🎨", 34),
            ("iCloud+", 2.99, BillingCycle::Monthly, Category::CloudStorage, "☁️", 71),
        ]
        .into_iter()
        .map(|(name, amount, cycle, category, icon, usage)| SubscriptionRecord {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.to_string(),
            amount,
            currency: "$".to_string(),
            cycle,
            category,
            usage_level: usage,
            next_billing_date: "Next month".to_string(),
            icon: icon.to_string(),
            is_linked: false,
            last_synced_at: None,
            efficiency_score: None,
        })
        .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::mock::StepRng;
    use std::collections::HashSet;

    fn draft(name: &str, amount: &str) -> SubscriptionDraft {
        SubscriptionDraft::new(name, amount)
    }

    #[test]
    fn test_enroll_assigns_unique_ids_and_defaults() {
        let mut ledger = Ledger::new();

        let a = ledger.enroll(&draft("Netflix", "15.49")).unwrap();
        let b = ledger.enroll(&draft("Spotify", "10.99")).unwrap();

        assert_ne!(a.id, b.id);
        assert_eq!(a.usage_level, DEFAULT_USAGE_LEVEL);
        assert!(!a.is_linked);
        assert_eq!(ledger.len(), 2);

        let ids: HashSet<_> = ledger.records().iter().map(|r| r.id.clone()).collect();
        assert_eq!(ids.len(), ledger.len());
    }

    #[test]
    fn test_enroll_rejects_missing_fields_without_mutation() {
        let mut ledger = Ledger::new();

        assert_eq!(
            ledger.enroll(&draft("", "10")),
            Err(ValidationError::MissingName)
        );
        assert_eq!(
            ledger.enroll(&draft("   ", "10")),
            Err(ValidationError::MissingName)
        );
        assert_eq!(
            ledger.enroll(&draft("X", "")),
            Err(ValidationError::MissingAmount)
        );
        assert!(matches!(
            ledger.enroll(&draft("X", "ten dollars")),
            Err(ValidationError::InvalidAmount(_))
        ));
        assert!(matches!(
            ledger.enroll(&draft("X", "-5")),
            Err(ValidationError::InvalidAmount(_))
        ));

        assert!(ledger.is_empty());
    }

    #[test]
    fn test_remove_returns_prior_name_and_ignores_absent() {
        let mut ledger = Ledger::new();
        let record = ledger.enroll(&draft("Netflix", "15.49")).unwrap();

        assert_eq!(ledger.remove(&record.id), Some("Netflix".to_string()));
        assert_eq!(ledger.remove(&record.id), None);
        assert!(ledger.is_empty());
    }

    #[test]
    fn test_targeted_updates_no_op_on_absent_id() {
        let mut ledger = Ledger::new();
        let record = ledger.enroll(&draft("Gym", "30")).unwrap();

        assert!(ledger.update_category(&record.id, Category::Fitness));
        assert!(ledger.verify_link(&record.id));
        assert!(!ledger.update_category("no-such-id", Category::Other));
        assert!(!ledger.verify_link("no-such-id"));

        let updated = ledger.get(&record.id).unwrap();
        assert_eq!(updated.category, Category::Fitness);
        assert!(updated.is_linked);
    }

    #[test]
    fn test_batch_sync_usage_bounds_and_repeatability() {
        let mut ledger = Ledger::new();
        ledger.load(Ledger::seed());
        assert_eq!(ledger.len(), 4);

        let mut rng = rand::thread_rng();
        ledger.batch_sync_usage(&mut rng);
        ledger.batch_sync_usage(&mut rng);

        assert_eq!(ledger.len(), 4);
        for record in ledger.records() {
            assert!(record.is_linked);
            assert!((20..100).contains(&record.usage_level));
            assert!((40..100).contains(&record.efficiency_score.unwrap()));
            assert!(record.last_synced_at.is_some());
        }
    }

    #[test]
    fn test_batch_sync_usage_deterministic_with_seeded_rng() {
        let mut ledger = Ledger::new();
        ledger.load(Ledger::seed());

        // StepRng always yields the same value, so the roll is predictable
        let mut rng = StepRng::new(0, 0);
        ledger.batch_sync_usage(&mut rng);

        let first: Vec<u8> = ledger.records().iter().map(|r| r.usage_level).collect();
        assert!(first.iter().all(|u| (20..100).contains(u)));
    }

    #[test]
    fn test_load_replaces_never_merges() {
        let mut ledger = Ledger::new();
        ledger.enroll(&draft("Old", "1")).unwrap();

        ledger.load(Ledger::seed());

        assert_eq!(ledger.len(), 4);
        assert!(ledger.records().iter().all(|r| r.name != "Old"));
    }
}
