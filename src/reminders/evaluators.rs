//! Condition evaluators.
//!
//! Each evaluator is a pure function over one tick's snapshot: no storage
//! access, no side effects. They encode who needs to be told what given
//! current facts; whether they have already been told today is the dedup
//! gate's concern (see `engine`).
//!
//! A row whose client join came back empty is skipped silently. Bad data
//! must not abort a scan.

use chrono::NaiveDate;

use crate::types::{
    Audience, ReminderCandidate, ReminderKind, ScanSnapshot, QUOTE_PENDING_AGE_DAYS,
};

/// Function signature for a condition evaluator.
pub type EvaluatorFn = fn(&ScanSnapshot, NaiveDate) -> Vec<ReminderCandidate>;

/// A registered evaluator. Scan order follows registration order.
pub struct EvaluatorEntry {
    pub name: &'static str,
    pub evaluator: EvaluatorFn,
}

/// Jobs scheduled today with status "scheduled" → staff service reminders.
pub fn service_due(snapshot: &ScanSnapshot, today: NaiveDate) -> Vec<ReminderCandidate> {
    let today_str = today.format("%Y-%m-%d").to_string();
    let mut candidates = Vec::new();

    for job in &snapshot.jobs_today {
        if job.status != "scheduled" || job.scheduled_date != today_str {
            continue;
        }
        let Some(name) = non_empty(&job.client_name) else {
            continue;
        };
        let address =
            non_empty(&job.client_address).unwrap_or_else(|| "no address on file".to_string());

        candidates.push(ReminderCandidate {
            kind: ReminderKind::ServiceReminder,
            audience: Audience::Staff,
            subject_key: name.clone(),
            title: "Service scheduled today".to_string(),
            body: format!("Cleaning for {name} at {address} is on today's schedule."),
        });
    }

    candidates
}

/// Completed jobs with no payment recorded → admin payment reminders.
pub fn payment_due(snapshot: &ScanSnapshot, _today: NaiveDate) -> Vec<ReminderCandidate> {
    let mut candidates = Vec::new();

    for job in &snapshot.unpaid_jobs {
        if job.status != "completed" {
            continue;
        }
        if job.payment_date.as_deref().is_some_and(|d| !d.trim().is_empty()) {
            continue;
        }
        let Some(name) = non_empty(&job.client_name) else {
            continue;
        };

        candidates.push(ReminderCandidate {
            kind: ReminderKind::PaymentDue,
            audience: Audience::Admin,
            subject_key: name.clone(),
            title: "Payment pending".to_string(),
            body: format!(
                "{name} has a completed job from {} with no payment recorded.",
                job.scheduled_date
            ),
        });
    }

    candidates
}

/// Quotations at or past the staleness boundary → admin follow-up reminders.
pub fn quote_pending(snapshot: &ScanSnapshot, today: NaiveDate) -> Vec<ReminderCandidate> {
    let mut candidates = Vec::new();

    for quote in &snapshot.stale_quotes {
        let Some(name) = non_empty(&quote.client_name) else {
            continue;
        };
        let Some(created) = date_prefix(&quote.created_at) else {
            continue;
        };
        let age_days = (today - created).num_days();
        // Inclusive boundary: exactly QUOTE_PENDING_AGE_DAYS old already fires
        if age_days < QUOTE_PENDING_AGE_DAYS {
            continue;
        }

        candidates.push(ReminderCandidate {
            kind: ReminderKind::QuotePending,
            audience: Audience::Admin,
            subject_key: name.clone(),
            title: "Quotation awaiting follow-up".to_string(),
            body: format!("The quotation for {name} has been open {age_days} days. Time to follow up."),
        });
    }

    candidates
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Parse the `YYYY-MM-DD` prefix of a backend timestamp string.
fn date_prefix(timestamp: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(timestamp.get(..10)?, "%Y-%m-%d").ok()
}
