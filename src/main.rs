//! tidyops daemon entry point.

use std::process::exit;
use std::sync::Arc;
use std::time::Duration;

use tidyops::config::load_config;
use tidyops::delivery::DeliveryHub;
use tidyops::reminders::engine::default_engine;
use tidyops::reminders::scheduler::ReminderScheduler;
use tidyops::store::open_store;

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = match load_config() {
        Ok(config) => config,
        Err(e) => {
            log::error!("Failed to load configuration: {}", e);
            exit(1);
        }
    };

    let store = match open_store(&config) {
        Ok(store) => store,
        Err(e) => {
            log::error!("Failed to open store: {}", e);
            exit(2);
        }
    };

    let hub = Arc::new(DeliveryHub::new());
    let scheduler = ReminderScheduler::new(
        store,
        hub,
        default_engine(),
        Duration::from_secs(config.scan_interval_secs),
    );
    scheduler.run().await;
}
