//! Reminder scanning.
//!
//! Pure condition evaluators produce candidates from one tick's snapshot, the
//! engine gates them through day-windowed dedup, and the scheduler drives the
//! whole thing on a fixed interval.

pub mod engine;
pub mod evaluators;
pub mod scheduler;
