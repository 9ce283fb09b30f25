//! Core domain types shared across the engine.

use serde::{Deserialize, Serialize};

/// Inclusive staleness boundary for quotations, in days. A quotation created
/// exactly this many days ago is already stale.
pub const QUOTE_PENDING_AGE_DAYS: i64 = 2;

/// Role-based recipient group a notification targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Audience {
    Admin,
    Staff,
}

impl Audience {
    pub fn as_str(&self) -> &'static str {
        match self {
            Audience::Admin => "admin",
            Audience::Staff => "staff",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "admin" => Some(Audience::Admin),
            "staff" => Some(Audience::Staff),
            _ => None,
        }
    }
}

/// Which condition evaluator produced a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReminderKind {
    ServiceReminder,
    PaymentDue,
    QuotePending,
}

impl ReminderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReminderKind::ServiceReminder => "service_reminder",
            ReminderKind::PaymentDue => "payment_due",
            ReminderKind::QuotePending => "quote_pending",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "service_reminder" => Some(ReminderKind::ServiceReminder),
            "payment_due" => Some(ReminderKind::PaymentDue),
            "quote_pending" => Some(ReminderKind::QuotePending),
            _ => None,
        }
    }
}

/// A persisted notification.
///
/// `id` and `created_at` are store-assigned; `created_at` is authoritative
/// for dedup windowing. `read` is flipped only by the client-facing
/// `mark_read` operation, never by the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: String,
    pub audience: Audience,
    pub kind: ReminderKind,
    /// Dedup discriminator: which business entity this concerns (the client
    /// name for all current kinds). Matched by exact equality.
    pub subject_key: String,
    pub title: String,
    pub body: String,
    pub created_at: String,
    pub read: bool,
}

/// An ephemeral notification proposal produced by a condition evaluator.
///
/// Either suppressed by the dedup gate or promoted to a [`Notification`] by
/// the delivery fan-out. Carries no `read` field: the engine's write path has
/// no way to set one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReminderCandidate {
    pub kind: ReminderKind,
    pub audience: Audience,
    pub subject_key: String,
    pub title: String,
    pub body: String,
}

/// A job row joined to client identity.
///
/// The client join is a LEFT JOIN; `client_name`/`client_address` are `None`
/// when the join is missing, and evaluators skip such rows silently.
#[derive(Debug, Clone, Default)]
pub struct JobRow {
    pub id: String,
    pub client_name: Option<String>,
    pub client_address: Option<String>,
    /// `YYYY-MM-DD`
    pub scheduled_date: String,
    pub status: String,
    pub payment_date: Option<String>,
}

/// A quotation row joined to client identity.
#[derive(Debug, Clone, Default)]
pub struct QuoteRow {
    pub id: String,
    pub client_name: Option<String>,
    /// Backend-native timestamp text; the first ten characters are the
    /// `YYYY-MM-DD` creation date.
    pub created_at: String,
}

/// The read-only view of business state a single scan tick reasons over.
///
/// Populated by one store read at the top of the tick so every evaluator sees
/// the same facts. No cross-tick consistency is required.
#[derive(Debug, Clone, Default)]
pub struct ScanSnapshot {
    /// Jobs scheduled today with status "scheduled".
    pub jobs_today: Vec<JobRow>,
    /// Completed jobs with no payment recorded.
    pub unpaid_jobs: Vec<JobRow>,
    /// Quotations at or past the staleness threshold.
    pub stale_quotes: Vec<QuoteRow>,
}
