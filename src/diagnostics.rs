//! Run diagnostics: a warn-once registry and run statistics.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Registry of messages that are logged only the first time they occur.
///
/// Owned by the driver and lent to the classifier for each event.
#[derive(Debug, Default)]
pub struct WarnOnce {
    seen: HashSet<String>,
}

impl WarnOnce {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Log `message` at info level unless `key` was logged before.
    /// Returns true if the message was emitted.
    pub fn info(&mut self, key: &str, message: impl FnOnce() -> String) -> bool {
        if self.seen.contains(key) {
            return false;
        }
        self.seen.insert(key.to_string());
        log::info!("{}", message());
        true
    }

    /// Log `message` at warn level unless `key` was logged before.
    pub fn warn(&mut self, key: &str, message: impl FnOnce() -> String) -> bool {
        if self.seen.contains(key) {
            return false;
        }
        self.seen.insert(key.to_string());
        log::warn!("{}", message());
        true
    }

    /// Returns true if `key` has been logged.
    #[must_use]
    pub fn has_seen(&self, key: &str) -> bool {
        self.seen.contains(key)
    }
}

/// Counters maintained by the driver.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunStats {
    /// Simulated events read, including skipped ones.
    pub simulated_read: u64,
    /// Reconstructed event lists read, including skipped ones.
    pub reconstructed_read: u64,
    /// Event pairs with equal IDs that passed the sanity check.
    pub matched: u64,
    /// Pairs with equal IDs rejected by the sanity check.
    pub sanity_failures: u64,
    /// Raw events that went through sequence classification.
    pub raw_events_analyzed: u64,
    /// Raw events skipped before classification.
    pub raw_events_skipped: u64,
    /// Analyzed raw events whose whole ordering was good.
    pub good_sequences: u64,
    /// Analyzed raw events with at least one bad step.
    pub bad_sequences: u64,
    pub checkpoints_written: u64,
    pub checkpoint_failures: u64,
}

impl RunStats {
    /// Fraction of analyzed raw events that were fully good.
    #[must_use]
    pub fn good_fraction(&self) -> f64 {
        if self.raw_events_analyzed == 0 {
            0.0
        } else {
            self.good_sequences as f64 / self.raw_events_analyzed as f64
        }
    }
}

/// Report returned when a run is finalized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Showers simulated so far, as reported by the simulation source.
    pub simulated_showers: u64,
    pub interrupted: bool,
    pub stats: RunStats,
}

impl RunSummary {
    /// One-line human readable summary.
    #[must_use]
    pub fn describe(&self) -> String {
        format!(
            "{} matched events, {} raw events analyzed ({:.1}% fully good), {} skipped, {} sanity failures{}",
            self.stats.matched,
            self.stats.raw_events_analyzed,
            100.0 * self.stats.good_fraction(),
            self.stats.raw_events_skipped,
            self.stats.sanity_failures,
            if self.interrupted { ", interrupted" } else { "" }
        )
    }
}
