//! Local relational backend.
//!
//! The database lives at `~/.tidyops/tidyops.db` and is the system of record
//! when no document store is configured. The schema is applied idempotently
//! on every open; timestamps are stored as `datetime('now')` TEXT in UTC, so
//! lexicographic comparison matches chronological order.
//!
//! The connection sits behind a `parking_lot` mutex and every store call runs
//! on the blocking pool. Snapshot reads take the lock once for all three
//! queries, so a tick sees internally consistent state.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection};
use uuid::Uuid;

use super::{ReminderStore, StoreError};
use crate::config::Config;
use crate::types::{
    Audience, JobRow, Notification, QuoteRow, ReminderCandidate, ReminderKind, ScanSnapshot,
    QUOTE_PENDING_AGE_DAYS,
};

const NOTIFICATION_COLUMNS: &str =
    "id, audience, kind, subject_key, title, body, created_at, read";

pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open (or create) the database at the configured path and apply the
    /// schema.
    pub fn open(config: &Config) -> Result<Self, StoreError> {
        let path = match &config.database_path {
            Some(path) => PathBuf::from(path),
            None => Self::db_path()?,
        };
        Self::open_at(path)
    }

    /// Open a database at an explicit path. Useful for testing.
    pub(crate) fn open_at(path: PathBuf) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            if !parent.exists() {
                std::fs::create_dir_all(parent).map_err(StoreError::CreateDir)?;
            }
        }

        let conn = Connection::open(&path)?;

        // WAL for concurrent reads from the pull API while a scan writes
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        conn.execute_batch(include_str!("schema.sql"))?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Resolve the default database path: `~/.tidyops/tidyops.db`.
    fn db_path() -> Result<PathBuf, StoreError> {
        let home = dirs::home_dir().ok_or(StoreError::HomeDirNotFound)?;
        Ok(home.join(".tidyops").join("tidyops.db"))
    }

    /// Run a closure against the connection on the blocking pool.
    async fn with_conn<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&Connection) -> Result<T, StoreError> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let guard = conn.lock();
            f(&guard)
        })
        .await
        .map_err(|e| StoreError::Runtime(e.to_string()))?
    }

    /// Synchronous connection access for test fixtures.
    #[cfg(test)]
    pub(crate) fn with_conn_sync<T>(&self, f: impl FnOnce(&Connection) -> T) -> T {
        let guard = self.conn.lock();
        f(&guard)
    }
}

#[async_trait]
impl ReminderStore for SqliteStore {
    async fn snapshot(&self, today: NaiveDate) -> Result<ScanSnapshot, StoreError> {
        let today_str = today.format("%Y-%m-%d").to_string();
        self.with_conn(move |conn| {
            let jobs_today = query_jobs(
                conn,
                "SELECT j.id, c.name, c.address, j.scheduled_date, j.status, j.payment_date
                 FROM jobs j LEFT JOIN clients c ON c.id = j.client_id
                 WHERE j.scheduled_date = ?1 AND j.status = 'scheduled'
                 ORDER BY c.name, j.id",
                params![today_str],
            )?;

            let unpaid_jobs = query_jobs(
                conn,
                "SELECT j.id, c.name, c.address, j.scheduled_date, j.status, j.payment_date
                 FROM jobs j LEFT JOIN clients c ON c.id = j.client_id
                 WHERE j.status = 'completed'
                   AND (j.payment_date IS NULL OR j.payment_date = '')
                 ORDER BY j.scheduled_date, j.id",
                [],
            )?;

            let mut stmt = conn.prepare(
                "SELECT q.id, COALESCE(c.name, q.client_name), q.created_at
                 FROM quotations q LEFT JOIN clients c ON c.id = q.client_id
                 WHERE date(q.created_at) <= date(?1, '-' || ?2 || ' days')
                 ORDER BY q.created_at, q.id",
            )?;
            let rows = stmt.query_map(params![today_str, QUOTE_PENDING_AGE_DAYS], |row| {
                Ok(QuoteRow {
                    id: row.get(0)?,
                    client_name: row.get(1)?,
                    created_at: row.get(2)?,
                })
            })?;
            let mut stale_quotes = Vec::new();
            for row in rows {
                stale_quotes.push(row?);
            }

            Ok(ScanSnapshot {
                jobs_today,
                unpaid_jobs,
                stale_quotes,
            })
        })
        .await
    }

    async fn find_notified(
        &self,
        kind: ReminderKind,
        subject_key: &str,
        since: DateTime<Utc>,
    ) -> Result<Option<Notification>, StoreError> {
        let subject = subject_key.to_string();
        let since_str = since.format("%Y-%m-%d %H:%M:%S").to_string();
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {NOTIFICATION_COLUMNS} FROM notifications
                 WHERE kind = ?1 AND subject_key = ?2 AND created_at >= ?3
                 ORDER BY created_at DESC LIMIT 1"
            ))?;
            let mut rows =
                stmt.query_map(params![kind.as_str(), subject, since_str], notification_from_row)?;
            match rows.next() {
                Some(row) => Ok(Some(row?)),
                None => Ok(None),
            }
        })
        .await
    }

    async fn append(&self, candidate: &ReminderCandidate) -> Result<Notification, StoreError> {
        let candidate = candidate.clone();
        self.with_conn(move |conn| {
            let id = format!("ntf-{}", Uuid::new_v4());
            conn.execute(
                "INSERT INTO notifications (id, audience, kind, subject_key, title, body, read, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0, datetime('now'))",
                params![
                    id,
                    candidate.audience.as_str(),
                    candidate.kind.as_str(),
                    candidate.subject_key,
                    candidate.title,
                    candidate.body,
                ],
            )?;

            // Read back so created_at is the store-assigned value
            let mut stmt = conn.prepare(&format!(
                "SELECT {NOTIFICATION_COLUMNS} FROM notifications WHERE id = ?1"
            ))?;
            stmt.query_row(params![id], notification_from_row)
                .map_err(StoreError::from)
        })
        .await
    }

    async fn list_notifications(
        &self,
        audience: Audience,
        limit: u32,
    ) -> Result<Vec<Notification>, StoreError> {
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {NOTIFICATION_COLUMNS} FROM notifications
                 WHERE audience = ?1
                 ORDER BY created_at DESC, id LIMIT ?2"
            ))?;
            let rows = stmt.query_map(params![audience.as_str(), limit], notification_from_row)?;
            let mut notifications = Vec::new();
            for row in rows {
                notifications.push(row?);
            }
            Ok(notifications)
        })
        .await
    }

    async fn mark_read(&self, id: &str) -> Result<(), StoreError> {
        let id = id.to_string();
        self.with_conn(move |conn| {
            let updated =
                conn.execute("UPDATE notifications SET read = 1 WHERE id = ?1", params![id])?;
            if updated == 0 {
                log::debug!("mark_read: no notification with id {}", id);
            }
            Ok(())
        })
        .await
    }
}

fn query_jobs<P: rusqlite::Params>(
    conn: &Connection,
    sql: &str,
    params: P,
) -> Result<Vec<JobRow>, StoreError> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map(params, |row| {
        Ok(JobRow {
            id: row.get(0)?,
            client_name: row.get(1)?,
            client_address: row.get(2)?,
            scheduled_date: row.get(3)?,
            status: row.get(4)?,
            payment_date: row.get(5)?,
        })
    })?;

    let mut jobs = Vec::new();
    for row in rows {
        jobs.push(row?);
    }
    Ok(jobs)
}

fn notification_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Notification> {
    let audience: String = row.get(1)?;
    let kind: String = row.get(2)?;
    Ok(Notification {
        id: row.get(0)?,
        audience: parse_enum(1, &audience, Audience::parse)?,
        kind: parse_enum(2, &kind, ReminderKind::parse)?,
        subject_key: row.get(3)?,
        title: row.get(4)?,
        body: row.get(5)?,
        created_at: row.get(6)?,
        read: row.get(7)?,
    })
}

fn parse_enum<T>(idx: usize, raw: &str, parse: fn(&str) -> Option<T>) -> rusqlite::Result<T> {
    parse(raw).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            rusqlite::types::Type::Text,
            format!("unrecognized value '{raw}'").into(),
        )
    })
}

// =============================================================================
// Shared test utilities
// =============================================================================


// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use chrono::{Duration, Local};

    use super::test_utils::*;
    use super::*;

    fn fixed_today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 10).expect("valid date")
    }

    fn sample_candidate(kind: ReminderKind, subject: &str) -> ReminderCandidate {
        ReminderCandidate {
            kind,
            audience: match kind {
                ReminderKind::ServiceReminder => Audience::Staff,
                _ => Audience::Admin,
            },
            subject_key: subject.to_string(),
            title: "title".to_string(),
            body: "body".to_string(),
        }
    }

    #[tokio::test]
    async fn test_snapshot_picks_todays_scheduled_jobs() {
        let store = test_store();
        insert_client(&store, "c1", "Acme Corp", "12 Main St");
        insert_job(&store, "j1", Some("c1"), "2026-03-10", "scheduled", None);
        insert_job(&store, "j2", Some("c1"), "2026-03-11", "scheduled", None);
        insert_job(&store, "j3", Some("c1"), "2026-03-10", "completed", None);

        let snapshot = store.snapshot(fixed_today()).await.expect("snapshot");
        assert_eq!(snapshot.jobs_today.len(), 1);
        assert_eq!(snapshot.jobs_today[0].id, "j1");
        assert_eq!(snapshot.jobs_today[0].client_name.as_deref(), Some("Acme Corp"));
        assert_eq!(snapshot.jobs_today[0].client_address.as_deref(), Some("12 Main St"));
    }

    #[tokio::test]
    async fn test_snapshot_missing_client_join_yields_none() {
        let store = test_store();
        insert_job(&store, "j1", None, "2026-03-10", "scheduled", None);

        let snapshot = store.snapshot(fixed_today()).await.expect("snapshot");
        assert_eq!(snapshot.jobs_today.len(), 1);
        assert!(snapshot.jobs_today[0].client_name.is_none());
    }

    #[tokio::test]
    async fn test_snapshot_unpaid_covers_null_and_empty() {
        let store = test_store();
        insert_client(&store, "c1", "Beta LLC", "9 Side Ave");
        insert_job(&store, "j1", Some("c1"), "2026-03-01", "completed", None);
        insert_job(&store, "j2", Some("c1"), "2026-03-02", "completed", Some(""));
        insert_job(&store, "j3", Some("c1"), "2026-03-03", "completed", Some("2026-03-05"));
        insert_job(&store, "j4", Some("c1"), "2026-03-04", "scheduled", None);

        let snapshot = store.snapshot(fixed_today()).await.expect("snapshot");
        let ids: Vec<&str> = snapshot.unpaid_jobs.iter().map(|j| j.id.as_str()).collect();
        assert_eq!(ids, vec!["j1", "j2"]);
    }

    #[tokio::test]
    async fn test_snapshot_quote_staleness_boundary_is_inclusive() {
        let store = test_store();
        insert_client(&store, "c1", "Gamma Inc", "1 Plaza");
        // Exactly two days old: stale. One day old: not yet.
        insert_quote(&store, "q1", Some("c1"), "2026-03-08 15:30:00");
        insert_quote(&store, "q2", Some("c1"), "2026-03-09 08:00:00");

        let snapshot = store.snapshot(fixed_today()).await.expect("snapshot");
        assert_eq!(snapshot.stale_quotes.len(), 1);
        assert_eq!(snapshot.stale_quotes[0].id, "q1");
        assert_eq!(snapshot.stale_quotes[0].client_name.as_deref(), Some("Gamma Inc"));
    }

    #[tokio::test]
    async fn test_append_assigns_id_timestamp_and_unread() {
        let store = test_store();
        let candidate = sample_candidate(ReminderKind::ServiceReminder, "Acme Corp");

        let notification = store.append(&candidate).await.expect("append");
        assert!(notification.id.starts_with("ntf-"));
        assert!(!notification.created_at.is_empty());
        assert!(!notification.read);
        assert_eq!(notification.subject_key, "Acme Corp");
        assert_eq!(notification.kind, ReminderKind::ServiceReminder);
    }

    #[tokio::test]
    async fn test_find_notified_within_window() {
        let store = test_store();
        let candidate = sample_candidate(ReminderKind::PaymentDue, "Beta LLC");
        store.append(&candidate).await.expect("append");

        let now = chrono::Utc::now();
        let found = store
            .find_notified(ReminderKind::PaymentDue, "Beta LLC", now - Duration::hours(1))
            .await
            .expect("query");
        assert!(found.is_some());

        // Outside the window (future cutoff) nothing matches
        let found = store
            .find_notified(ReminderKind::PaymentDue, "Beta LLC", now + Duration::hours(1))
            .await
            .expect("query");
        assert!(found.is_none());

        // Different kind or subject never matches
        let found = store
            .find_notified(ReminderKind::ServiceReminder, "Beta LLC", now - Duration::hours(1))
            .await
            .expect("query");
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn test_yesterdays_notification_outside_today_window() {
        let store = test_store();
        store.with_conn_sync(|conn| {
            conn.execute(
                "INSERT INTO notifications (id, audience, kind, subject_key, title, body, created_at)
                 VALUES ('ntf-old', 'staff', 'service_reminder', 'Jane Doe', 't', 'b',
                         datetime('now', '-1 day'))",
                [],
            )
            .expect("insert");
        });

        let since = crate::reminders::engine::start_of_day_utc(Local::now().date_naive());
        let found = store
            .find_notified(ReminderKind::ServiceReminder, "Jane Doe", since)
            .await
            .expect("query");
        assert!(found.is_none(), "yesterday's row must not suppress today");
    }

    #[tokio::test]
    async fn test_list_notifications_ordered_and_bounded() {
        let store = test_store();
        store.with_conn_sync(|conn| {
            conn.execute_batch(
                "INSERT INTO notifications (id, audience, kind, subject_key, title, body, created_at)
                 VALUES ('ntf-1', 'admin', 'payment_due', 'A', 't1', 'b', '2026-03-09 08:00:00');
                 INSERT INTO notifications (id, audience, kind, subject_key, title, body, created_at)
                 VALUES ('ntf-2', 'admin', 'quote_pending', 'B', 't2', 'b', '2026-03-10 08:00:00');
                 INSERT INTO notifications (id, audience, kind, subject_key, title, body, created_at)
                 VALUES ('ntf-3', 'staff', 'service_reminder', 'C', 't3', 'b', '2026-03-10 09:00:00');",
            )
            .expect("insert");
        });

        let admin = store
            .list_notifications(Audience::Admin, 10)
            .await
            .expect("list");
        let ids: Vec<&str> = admin.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec!["ntf-2", "ntf-1"]);

        let bounded = store
            .list_notifications(Audience::Admin, 1)
            .await
            .expect("list");
        assert_eq!(bounded.len(), 1);
        assert_eq!(bounded[0].id, "ntf-2");
    }

    #[tokio::test]
    async fn test_mark_read_flips_only_read() {
        let store = test_store();
        let stored = store
            .append(&sample_candidate(ReminderKind::QuotePending, "Gamma Inc"))
            .await
            .expect("append");

        store.mark_read(&stored.id).await.expect("mark read");

        let listed = store
            .list_notifications(Audience::Admin, 10)
            .await
            .expect("list");
        assert_eq!(listed.len(), 1);
        assert!(listed[0].read);
        assert_eq!(listed[0].created_at, stored.created_at);
        assert_eq!(listed[0].body, stored.body);

        // Unknown id is a no-op, not an error
        store.mark_read("ntf-missing").await.expect("no-op");
    }
}
