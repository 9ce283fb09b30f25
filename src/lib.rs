//! TidyOps reminder engine.
//!
//! Long-lived background service for a small cleaning business. On a fixed
//! interval it inspects business state (today's scheduled jobs, completed
//! jobs with no payment recorded, quotations gone stale) and emits
//! notifications to the right audience (admin or staff) at most once per
//! condition per day. Persistence runs over one of two interchangeable
//! backends: a local SQLite store or a remote document store.

pub mod config;
pub mod delivery;
pub mod reminders;
pub mod store;
pub mod types;
