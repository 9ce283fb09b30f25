//! Reminder scan orchestration and the deduplication gate.
//!
//! One scan: read the snapshot, run every registered evaluator in order, pass
//! each candidate through the dedup gate, fan accepted candidates out via
//! `delivery`. Dedup state lives in the store, never in memory, so a fresh
//! process makes the same decisions a long-running one would.

use chrono::{DateTime, Local, NaiveDate, NaiveTime, TimeZone, Utc};

use super::evaluators::{self, EvaluatorEntry, EvaluatorFn};
use crate::delivery::{self, DeliveryHub};
use crate::store::{ReminderStore, StoreError};
use crate::types::ReminderCandidate;

/// The scan engine: an ordered registry of condition evaluators.
#[derive(Default)]
pub struct ReminderEngine {
    evaluators: Vec<EvaluatorEntry>,
}

impl ReminderEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an evaluator. Scan order follows registration order.
    pub fn register(&mut self, name: &'static str, evaluator: EvaluatorFn) {
        self.evaluators.push(EvaluatorEntry { name, evaluator });
    }

    /// Run one scan against `store`, delivering accepted candidates through
    /// `hub`. Returns the number of notifications emitted.
    ///
    /// A snapshot read failure fails the whole tick. Per-candidate failures
    /// (dedup query, persist) are logged and skipped; nothing was recorded,
    /// so the condition fires again on a later tick.
    pub async fn run_scan(
        &self,
        store: &dyn ReminderStore,
        hub: &DeliveryHub,
        today: NaiveDate,
    ) -> Result<usize, StoreError> {
        let snapshot = store.snapshot(today).await?;
        let since = start_of_day_utc(today);
        let mut emitted = 0usize;

        for entry in &self.evaluators {
            for candidate in (entry.evaluator)(&snapshot, today) {
                match admit(store, &candidate, since).await {
                    Ok(false) => {}
                    Ok(true) => match delivery::deliver(store, hub, &candidate).await {
                        Ok(_) => emitted += 1,
                        Err(e) => log::warn!(
                            "Failed to deliver {} reminder for '{}': {}",
                            entry.name,
                            candidate.subject_key,
                            e
                        ),
                    },
                    Err(e) => log::warn!(
                        "Dedup check failed for {} '{}', deferring to next scan: {}",
                        entry.name,
                        candidate.subject_key,
                        e
                    ),
                }
            }
        }

        Ok(emitted)
    }
}

/// Build the engine with all three evaluators registered.
pub fn default_engine() -> ReminderEngine {
    let mut engine = ReminderEngine::new();
    engine.register("service_due", evaluators::service_due);
    engine.register("payment_due", evaluators::payment_due);
    engine.register("quote_pending", evaluators::quote_pending);
    engine
}

/// Dedup gate: admit the candidate only when no notification with the same
/// kind and subject key exists in today's window. A failed query never
/// admits.
pub async fn admit(
    store: &dyn ReminderStore,
    candidate: &ReminderCandidate,
    since: DateTime<Utc>,
) -> Result<bool, StoreError> {
    let existing = store
        .find_notified(candidate.kind, &candidate.subject_key, since)
        .await?;
    Ok(existing.is_none())
}

/// UTC instant of the given day's server-local midnight, the dedup window
/// boundary.
pub fn start_of_day_utc(day: NaiveDate) -> DateTime<Utc> {
    let midnight = day.and_time(NaiveTime::MIN);
    Local
        .from_local_datetime(&midnight)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|| Utc.from_utc_datetime(&midnight))
}

// =============================================================================
// Tests
// =============================================================================
