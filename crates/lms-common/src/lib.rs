//! LMS Guard Common - shared primitives for the content validation pipeline
//!
//! This crate provides the pieces every other guard crate leans on:
//! - Error handling for infrastructure failures (pattern compilation, config)
//! - Lock-free counters
//! - Latency histograms for validation timing
//!
//! Untrusted-input failures are *not* represented here. Those are data and
//! live in `lms-validator` as field-path errors.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod metrics;

pub use error::*;
pub use metrics::{HistogramSnapshot, LatencyHistogram};

use std::sync::atomic::{AtomicU64, Ordering};

/// High-performance counter for lock-free metrics
#[derive(Debug, Default)]
pub struct AtomicCounter(AtomicU64);

impl AtomicCounter {
    /// Create new counter
    pub const fn new(value: u64) -> Self {
        Self(AtomicU64::new(value))
    }

    /// Increment and return previous value
    #[inline(always)]
    pub fn inc(&self) -> u64 {
        self.0.fetch_add(1, Ordering::Relaxed)
    }

    /// Add value and return previous
    #[inline(always)]
    pub fn add(&self, val: u64) -> u64 {
        self.0.fetch_add(val, Ordering::Relaxed)
    }

    /// Get current value
    #[inline(always)]
    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }

    /// Reset to zero
    #[inline]
    pub fn reset(&self) {
        self.0.store(0, Ordering::Relaxed);
    }
}
