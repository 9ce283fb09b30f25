//! Fixed-interval scan loop.
//!
//! One tick, one scan. Ticks never overlap: if a scan is still running when
//! the next tick fires, the tick is skipped. Dedup makes a skipped tick
//! harmless, the conditions are still true next time around.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{Local, NaiveDate};

use super::engine::ReminderEngine;
use crate::delivery::DeliveryHub;
use crate::store::{ReminderStore, StoreError};

pub struct ReminderScheduler {
    store: Arc<dyn ReminderStore>,
    hub: Arc<DeliveryHub>,
    engine: ReminderEngine,
    interval: Duration,
    scanning: AtomicBool,
}

impl ReminderScheduler {
    pub fn new(
        store: Arc<dyn ReminderStore>,
        hub: Arc<DeliveryHub>,
        engine: ReminderEngine,
        interval: Duration,
    ) -> Self {
        Self {
            store,
            hub,
            engine,
            interval,
            scanning: AtomicBool::new(false),
        }
    }

    /// Run the scan loop forever. The first scan happens immediately.
    pub async fn run(&self) {
        log::info!(
            "Reminder scheduler started (interval: {}s)",
            self.interval.as_secs()
        );
        loop {
            self.tick().await;
            tokio::time::sleep(self.interval).await;
        }
    }

    async fn tick(&self) {
        let today = Local::now().date_naive();
        match self.scan_guarded(today).await {
            None => {}
            Some(Ok(0)) => log::debug!("Scan complete, nothing to report"),
            Some(Ok(emitted)) => log::info!("Scan complete, {} notification(s) emitted", emitted),
            Some(Err(e)) => log::warn!("Scan failed, will retry next tick: {}", e),
        }
    }

    /// Run one scan unless another is already in flight. Returns `None` when
    /// the tick was skipped.
    pub async fn scan_guarded(&self, today: NaiveDate) -> Option<Result<usize, StoreError>> {
        if self
            .scanning
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            log::debug!("Previous scan still running, skipping tick");
            return None;
        }

        let result = self
            .engine
            .run_scan(self.store.as_ref(), &self.hub, today)
            .await;
        self.scanning.store(false, Ordering::SeqCst);
        Some(result)
    }
}
