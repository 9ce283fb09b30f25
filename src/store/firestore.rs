//! Remote document store backend (Firestore REST).
//!
//! Documents live in three collections: `jobs`, `quotations`, and
//! `notifications`. Reads go through `:runQuery` structured queries; appends
//! are document POSTs; `read` flips via PATCH with an `updateMask` of exactly
//! one field path, so the client-facing path cannot touch anything else.
//!
//! Firestore's `createTime` metadata is not filterable by field queries, so
//! the adapter stamps a queryable `createdAt` field at write time. The store
//! layer remains the timestamp authority either way; engine code never
//! supplies a timestamp.

use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, SecondsFormat, Utc};
use serde_json::{json, Value};
use url::Url;

use super::{ReminderStore, StoreError};
use crate::config::FirestoreConfig;
use crate::types::{
    Audience, JobRow, Notification, QuoteRow, ReminderCandidate, ReminderKind, ScanSnapshot,
    QUOTE_PENDING_AGE_DAYS,
};

pub struct FirestoreStore {
    client: reqwest::Client,
    documents_url: Url,
    api_key: String,
}

impl FirestoreStore {
    pub fn new(config: FirestoreConfig) -> Result<Self, StoreError> {
        let base = format!(
            "{}/projects/{}/databases/(default)/documents",
            config.api_base.trim_end_matches('/'),
            config.project_id
        );
        let documents_url = Url::parse(&base).map_err(|e| StoreError::Endpoint(e.to_string()))?;

        Ok(Self {
            client: reqwest::Client::new(),
            documents_url,
            api_key: config.api_key,
        })
    }

    fn url(&self, suffix: &str) -> String {
        format!("{}{}", self.documents_url, suffix)
    }

    /// Run a structured query against the parent document path. Returns the
    /// matched documents (rows without a `document` key are progress markers
    /// and are dropped).
    async fn run_query(&self, query: Value) -> Result<Vec<Value>, StoreError> {
        let response = self
            .client
            .post(self.url(":runQuery"))
            .query(&[("key", self.api_key.as_str())])
            .json(&json!({ "structuredQuery": query }))
            .send()
            .await?;
        let response = check_status(response).await?;

        let body: Value = response.json().await?;
        let rows = body
            .as_array()
            .ok_or_else(|| malformed("runQuery did not return an array"))?;
        Ok(rows.iter().filter_map(|r| r.get("document").cloned()).collect())
    }
}

#[async_trait]
impl ReminderStore for FirestoreStore {
    async fn snapshot(&self, today: NaiveDate) -> Result<ScanSnapshot, StoreError> {
        let today_str = today.format("%Y-%m-%d").to_string();

        let job_docs = self
            .run_query(json!({
                "from": [{ "collectionId": "jobs" }],
                "where": and_filter(vec![
                    field_filter("scheduledDate", "EQUAL", string_value(&today_str)),
                    field_filter("status", "EQUAL", string_value("scheduled")),
                ]),
            }))
            .await?;
        let mut jobs_today: Vec<JobRow> = job_docs.iter().map(doc_to_job).collect();
        jobs_today.sort_by(|a, b| {
            (a.client_name.as_deref(), a.id.as_str()).cmp(&(b.client_name.as_deref(), b.id.as_str()))
        });

        let completed_docs = self
            .run_query(json!({
                "from": [{ "collectionId": "jobs" }],
                "where": field_filter("status", "EQUAL", string_value("completed")),
            }))
            .await?;
        let mut unpaid_jobs: Vec<JobRow> = completed_docs
            .iter()
            .map(doc_to_job)
            .filter(payment_missing)
            .collect();
        unpaid_jobs.sort_by(|a, b| {
            (a.scheduled_date.as_str(), a.id.as_str())
                .cmp(&(b.scheduled_date.as_str(), b.id.as_str()))
        });

        // "Created at or before today - 2 days" in day terms: strictly before
        // the start of (today - 1 day).
        let cutoff_day = today - Duration::days(QUOTE_PENDING_AGE_DAYS - 1);
        let cutoff = crate::reminders::engine::start_of_day_utc(cutoff_day)
            .to_rfc3339_opts(SecondsFormat::Secs, true);
        let quote_docs = self
            .run_query(json!({
                "from": [{ "collectionId": "quotations" }],
                "where": field_filter("createdAt", "LESS_THAN", timestamp_value(&cutoff)),
            }))
            .await?;
        let mut stale_quotes: Vec<QuoteRow> = quote_docs.iter().map(doc_to_quote).collect();
        stale_quotes.sort_by(|a, b| {
            (a.created_at.as_str(), a.id.as_str()).cmp(&(b.created_at.as_str(), b.id.as_str()))
        });

        Ok(ScanSnapshot {
            jobs_today,
            unpaid_jobs,
            stale_quotes,
        })
    }

    async fn find_notified(
        &self,
        kind: ReminderKind,
        subject_key: &str,
        since: DateTime<Utc>,
    ) -> Result<Option<Notification>, StoreError> {
        let since_str = since.to_rfc3339_opts(SecondsFormat::Secs, true);
        let docs = self
            .run_query(json!({
                "from": [{ "collectionId": "notifications" }],
                "where": and_filter(vec![
                    field_filter("kind", "EQUAL", string_value(kind.as_str())),
                    field_filter("subjectKey", "EQUAL", string_value(subject_key)),
                    field_filter("createdAt", "GREATER_THAN_OR_EQUAL", timestamp_value(&since_str)),
                ]),
                "limit": 1,
            }))
            .await?;

        match docs.first() {
            Some(doc) => Ok(Some(doc_to_notification(doc)?)),
            None => Ok(None),
        }
    }

    async fn append(&self, candidate: &ReminderCandidate) -> Result<Notification, StoreError> {
        let created_at = Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true);
        let fields = json!({
            "audience": string_value(candidate.audience.as_str()),
            "kind": string_value(candidate.kind.as_str()),
            "subjectKey": string_value(&candidate.subject_key),
            "title": string_value(&candidate.title),
            "body": string_value(&candidate.body),
            "read": bool_value(false),
            "createdAt": timestamp_value(&created_at),
        });

        let response = self
            .client
            .post(self.url("/notifications"))
            .query(&[("key", self.api_key.as_str())])
            .json(&json!({ "fields": fields }))
            .send()
            .await?;
        let response = check_status(response).await?;

        let doc: Value = response.json().await?;
        doc_to_notification(&doc)
    }

    async fn list_notifications(
        &self,
        audience: Audience,
        limit: u32,
    ) -> Result<Vec<Notification>, StoreError> {
        let docs = self
            .run_query(json!({
                "from": [{ "collectionId": "notifications" }],
                "where": field_filter("audience", "EQUAL", string_value(audience.as_str())),
                "orderBy": [{ "field": { "fieldPath": "createdAt" }, "direction": "DESCENDING" }],
                "limit": limit,
            }))
            .await?;

        docs.iter().map(doc_to_notification).collect()
    }

    async fn mark_read(&self, id: &str) -> Result<(), StoreError> {
        let response = self
            .client
            .patch(self.url(&format!("/notifications/{id}")))
            .query(&[
                ("key", self.api_key.as_str()),
                ("updateMask.fieldPaths", "read"),
            ])
            .json(&json!({ "fields": { "read": bool_value(true) } }))
            .send()
            .await?;
        check_status(response).await?;
        Ok(())
    }
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, StoreError> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status().as_u16();
    let message = response.text().await.unwrap_or_default();
    Err(StoreError::Remote { status, message })
}

// ---------------------------------------------------------------------------
// Typed value mapping
// ---------------------------------------------------------------------------

fn string_value(v: &str) -> Value {
    json!({ "stringValue": v })
}

fn bool_value(v: bool) -> Value {
    json!({ "booleanValue": v })
}

fn timestamp_value(v: &str) -> Value {
    json!({ "timestampValue": v })
}

fn field_filter(field: &str, op: &str, value: Value) -> Value {
    json!({
        "fieldFilter": {
            "field": { "fieldPath": field },
            "op": op,
            "value": value,
        }
    })
}

fn and_filter(filters: Vec<Value>) -> Value {
    json!({ "compositeFilter": { "op": "AND", "filters": filters } })
}

fn field_str(doc: &Value, name: &str) -> Option<String> {
    doc["fields"][name]["stringValue"].as_str().map(str::to_string)
}

fn field_timestamp(doc: &Value, name: &str) -> Option<String> {
    doc["fields"][name]["timestampValue"].as_str().map(str::to_string)
}

fn field_bool(doc: &Value, name: &str) -> Option<bool> {
    doc["fields"][name]["booleanValue"].as_bool()
}

/// Last path segment of the document resource name.
fn doc_id(doc: &Value) -> Option<String> {
    doc["name"]
        .as_str()
        .map(|name| name.rsplit('/').next().unwrap_or(name).to_string())
}

fn malformed(message: &str) -> StoreError {
    StoreError::MalformedResponse(message.to_string())
}

fn doc_to_job(doc: &Value) -> JobRow {
    JobRow {
        id: doc_id(doc).unwrap_or_default(),
        client_name: field_str(doc, "clientName"),
        client_address: field_str(doc, "clientAddress"),
        scheduled_date: field_str(doc, "scheduledDate").unwrap_or_default(),
        status: field_str(doc, "status").unwrap_or_default(),
        payment_date: field_str(doc, "paymentDate"),
    }
}

fn payment_missing(job: &JobRow) -> bool {
    job.payment_date
        .as_deref()
        .map_or(true, |date| date.trim().is_empty())
}

fn doc_to_quote(doc: &Value) -> QuoteRow {
    QuoteRow {
        id: doc_id(doc).unwrap_or_default(),
        client_name: field_str(doc, "clientName"),
        created_at: field_timestamp(doc, "createdAt").unwrap_or_default(),
    }
}

fn doc_to_notification(doc: &Value) -> Result<Notification, StoreError> {
    let id = doc_id(doc).ok_or_else(|| malformed("document missing resource name"))?;
    let audience = field_str(doc, "audience")
        .and_then(|s| Audience::parse(&s))
        .ok_or_else(|| malformed("notification missing or invalid audience"))?;
    let kind = field_str(doc, "kind")
        .and_then(|s| ReminderKind::parse(&s))
        .ok_or_else(|| malformed("notification missing or invalid kind"))?;

    Ok(Notification {
        id,
        audience,
        kind,
        subject_key: field_str(doc, "subjectKey")
            .ok_or_else(|| malformed("notification missing subjectKey"))?,
        title: field_str(doc, "title").unwrap_or_default(),
        body: field_str(doc, "body").unwrap_or_default(),
        created_at: field_timestamp(doc, "createdAt")
            .ok_or_else(|| malformed("notification missing createdAt"))?,
        read: field_bool(doc, "read").unwrap_or(false),
    })
}
