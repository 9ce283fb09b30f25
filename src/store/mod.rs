//! Storage contract for the reminder engine.
//!
//! Two interchangeable backends implement [`ReminderStore`]: a local SQLite
//! store ([`sqlite`]) and a remote Firestore-style document store
//! ([`firestore`]). The backend is selected once at startup from
//! configuration; engine code never branches on which one it holds.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use thiserror::Error;

use crate::config::Config;
use crate::types::{Audience, Notification, ReminderCandidate, ReminderKind, ScanSnapshot};

pub mod firestore;
pub mod sqlite;

/// Errors from either storage backend.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Document store rejected request ({status}): {message}")]
    Remote { status: u16, message: String },

    #[error("Malformed document store response: {0}")]
    MalformedResponse(String),

    #[error("Invalid store endpoint: {0}")]
    Endpoint(String),

    #[error("Home directory not found")]
    HomeDirNotFound,

    #[error("Failed to create database directory: {0}")]
    CreateDir(std::io::Error),

    #[error("Blocking task failed: {0}")]
    Runtime(String),
}

/// Persistence and pull contract shared by both backends.
///
/// `append` takes a candidate, not a notification: the store assigns `id` and
/// `created_at`, and nothing on this path can write `read = true`. Only the
/// client-facing [`ReminderStore::mark_read`] flips the flag.
#[async_trait]
pub trait ReminderStore: Send + Sync {
    /// Read the scan snapshot for one tick: today's scheduled jobs, unpaid
    /// completed jobs, and quotations at or past the staleness threshold.
    async fn snapshot(&self, today: NaiveDate) -> Result<ScanSnapshot, StoreError>;

    /// Find a notification with this kind and subject key created at or
    /// after `since`. The dedup gate's only query.
    async fn find_notified(
        &self,
        kind: ReminderKind,
        subject_key: &str,
        since: DateTime<Utc>,
    ) -> Result<Option<Notification>, StoreError>;

    /// Persist a candidate. Returns the stored notification with its
    /// store-assigned id and timestamp.
    async fn append(&self, candidate: &ReminderCandidate) -> Result<Notification, StoreError>;

    /// List notifications for an audience, most recent first, at most
    /// `limit` rows.
    async fn list_notifications(
        &self,
        audience: Audience,
        limit: u32,
    ) -> Result<Vec<Notification>, StoreError>;

    /// Mark a notification read. Touches nothing but the `read` flag.
    async fn mark_read(&self, id: &str) -> Result<(), StoreError>;
}

/// Select and open the backend once at startup.
pub fn open_store(config: &Config) -> Result<Arc<dyn ReminderStore>, StoreError> {
    match &config.firestore {
        Some(remote) => {
            log::info!(
                "Using document store backend (project {})",
                remote.project_id
            );
            Ok(Arc::new(firestore::FirestoreStore::new(remote.clone())?))
        }
        None => {
            let store = sqlite::SqliteStore::open(config)?;
            log::info!("Using local SQLite backend");
            Ok(Arc::new(store))
        }
    }
}
