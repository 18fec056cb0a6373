//! Validation Statistics Tracker
//!
//! Process-lifetime outcome counters shared by every pipeline call. Counters
//! are atomics; error frequencies live in a `DashMap` so concurrent records
//! only contend on the shard holding the same message.
//!
//! Error messages echo input (ids, enum values, parser positions), so the
//! number of distinct messages tracked is capped. Once the cap is reached,
//! known messages keep counting and new ones are tallied only in
//! `untracked_errors`. Concurrent inserts may overshoot the cap by at most
//! the number of recording threads.

use std::time::Duration;

use dashmap::DashMap;
use lms_common::{AtomicCounter, HistogramSnapshot, LatencyHistogram};
use serde::Serialize;

use crate::pipeline::ValidationResult;

/// Default length of the most-frequent-errors ranking
pub const DEFAULT_TOP_ERRORS: usize = 5;

/// Default number of distinct error messages kept in the frequency map
pub const DEFAULT_MAX_TRACKED_ERRORS: usize = 10_000;

#[derive(Debug, Clone, Copy)]
struct ErrorTally {
    count: u64,
    first_seen: u64,
}

/// Aggregate counters
#[derive(Debug)]
pub struct ValidationStats {
    success: AtomicCounter,
    failure: AtomicCounter,
    errors: DashMap<String, ErrorTally>,
    max_tracked: usize,
    untracked: AtomicCounter,
    sequence: AtomicCounter,
    latency: LatencyHistogram,
}

impl Default for ValidationStats {
    fn default() -> Self {
        Self::with_max_tracked(DEFAULT_MAX_TRACKED_ERRORS)
    }
}

/// How often one rendered error was seen
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorFrequency {
    /// Rendered error
    pub error: String,
    /// Occurrences
    pub count: u64,
}

/// Point-in-time view of the counters
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsSnapshot {
    /// Validations recorded
    pub total: u64,
    /// Successful validations
    pub success: u64,
    /// Failed validations
    pub failure: u64,
    /// `success / total` in percent; 0 before any validation
    pub success_rate: f64,
    /// Most frequent errors, most frequent first, ties by first appearance
    pub top_errors: Vec<ErrorFrequency>,
    /// Error occurrences not ranked because the frequency map was full
    pub untracked_errors: u64,
    /// Validation latency
    pub latency: HistogramSnapshot,
}

impl ValidationStats {
    /// Empty statistics
    pub fn new() -> Self {
        Self::default()
    }

    /// Empty statistics tracking at most `max` distinct error messages
    pub fn with_max_tracked(max: usize) -> Self {
        Self {
            success: AtomicCounter::default(),
            failure: AtomicCounter::default(),
            errors: DashMap::new(),
            max_tracked: max,
            untracked: AtomicCounter::default(),
            sequence: AtomicCounter::default(),
            latency: LatencyHistogram::default(),
        }
    }

    /// Count one outcome; failures also tally each of their errors
    pub fn record(&self, result: &ValidationResult) {
        if result.success {
            self.success.inc();
            return;
        }

        self.failure.inc();
        for error in &result.errors {
            if let Some(mut tally) = self.errors.get_mut(error) {
                tally.count += 1;
                continue;
            }
            if self.errors.len() >= self.max_tracked {
                self.untracked.inc();
                continue;
            }
            let mut tally = self.errors.entry(error.clone()).or_insert_with(|| ErrorTally {
                count: 0,
                first_seen: self.sequence.inc(),
            });
            tally.count += 1;
        }
    }

    /// Record how long one validation took
    pub fn record_latency(&self, elapsed: Duration) {
        self.latency
            .record(u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX));
    }

    /// Snapshot with the default ranking length
    pub fn snapshot(&self) -> StatsSnapshot {
        self.snapshot_with(DEFAULT_TOP_ERRORS)
    }

    /// Snapshot ranking the `top` most frequent errors
    pub fn snapshot_with(&self, top: usize) -> StatsSnapshot {
        let success = self.success.get();
        let failure = self.failure.get();
        let total = success + failure;
        let success_rate = if total == 0 {
            0.0
        } else {
            success as f64 * 100.0 / total as f64
        };

        StatsSnapshot {
            total,
            success,
            failure,
            success_rate,
            top_errors: self.top_errors(top),
            untracked_errors: self.untracked.get(),
            latency: self.latency.snapshot(),
        }
    }

    fn top_errors(&self, top: usize) -> Vec<ErrorFrequency> {
        let mut ranked: Vec<(String, ErrorTally)> = self
            .errors
            .iter()
            .map(|entry| (entry.key().clone(), *entry.value()))
            .collect();

        ranked.sort_by(|a, b| {
            b.1.count
                .cmp(&a.1.count)
                .then_with(|| a.1.first_seen.cmp(&b.1.first_seen))
        });

        ranked
            .into_iter()
            .take(top)
            .map(|(error, tally)| ErrorFrequency {
                error,
                count: tally.count,
            })
            .collect()
    }

    /// Clear every counter
    pub fn reset(&self) {
        self.success.reset();
        self.failure.reset();
        self.errors.clear();
        self.untracked.reset();
        self.sequence.reset();
        self.latency.reset();
    }
}
