//! Lock-free latency tracking for validation calls

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Upper bound (inclusive, microseconds) of each bucket. The last bucket is open.
const BUCKET_LIMITS_US: [u64; 8] = [100, 1_000, 5_000, 10_000, 50_000, 100_000, 1_000_000, 10_000_000];

/// Lock-free histogram for latency tracking
#[derive(Debug)]
pub struct LatencyHistogram {
    /// Buckets: <=100μs, <=1ms, <=5ms, <=10ms, <=50ms, <=100ms, <=1s, >1s
    buckets: [AtomicU64; 8],
    /// Total count
    count: AtomicU64,
    /// Sum for average calculation
    sum_us: AtomicU64,
    /// Min latency
    min_us: AtomicU64,
    /// Max latency
    max_us: AtomicU64,
}

impl LatencyHistogram {
    /// Create new histogram
    pub const fn new() -> Self {
        Self {
            buckets: [
                AtomicU64::new(0),
                AtomicU64::new(0),
                AtomicU64::new(0),
                AtomicU64::new(0),
                AtomicU64::new(0),
                AtomicU64::new(0),
                AtomicU64::new(0),
                AtomicU64::new(0),
            ],
            count: AtomicU64::new(0),
            sum_us: AtomicU64::new(0),
            min_us: AtomicU64::new(u64::MAX),
            max_us: AtomicU64::new(0),
        }
    }

    /// Record a latency value in microseconds
    #[inline]
    pub fn record(&self, latency_us: u64) {
        let bucket = BUCKET_LIMITS_US
            .iter()
            .position(|&limit| latency_us <= limit)
            .unwrap_or(BUCKET_LIMITS_US.len() - 1);

        self.buckets[bucket].fetch_add(1, Ordering::Relaxed);
        self.count.fetch_add(1, Ordering::Relaxed);
        self.sum_us.fetch_add(latency_us, Ordering::Relaxed);
        self.min_us.fetch_min(latency_us, Ordering::Relaxed);
        self.max_us.fetch_max(latency_us, Ordering::Relaxed);
    }

    /// Number of recorded samples
    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    /// Get average latency in microseconds
    pub fn average(&self) -> f64 {
        let count = self.count.load(Ordering::Relaxed);
        if count == 0 {
            return 0.0;
        }
        self.sum_us.load(Ordering::Relaxed) as f64 / count as f64
    }

    /// Get percentile (approximate, bucket upper bound)
    pub fn percentile(&self, p: f64) -> u64 {
        let count = self.count.load(Ordering::Relaxed);
        if count == 0 {
            return 0;
        }

        let target = ((count as f64) * p).ceil() as u64;
        let mut cumulative = 0u64;

        for (i, bucket) in self.buckets.iter().enumerate() {
            cumulative += bucket.load(Ordering::Relaxed);
            if cumulative >= target {
                return BUCKET_LIMITS_US[i];
            }
        }

        BUCKET_LIMITS_US[BUCKET_LIMITS_US.len() - 1]
    }

    /// Get P99 latency
    pub fn p99(&self) -> u64 {
        self.percentile(0.99)
    }

    /// Clear all samples
    pub fn reset(&self) {
        for bucket in &self.buckets {
            bucket.store(0, Ordering::Relaxed);
        }
        self.count.store(0, Ordering::Relaxed);
        self.sum_us.store(0, Ordering::Relaxed);
        self.min_us.store(u64::MAX, Ordering::Relaxed);
        self.max_us.store(0, Ordering::Relaxed);
    }

    /// Get snapshot
    pub fn snapshot(&self) -> HistogramSnapshot {
        let count = self.count.load(Ordering::Relaxed);
        HistogramSnapshot {
            count,
            sum_us: self.sum_us.load(Ordering::Relaxed),
            min_us: if count == 0 { 0 } else { self.min_us.load(Ordering::Relaxed) },
            max_us: self.max_us.load(Ordering::Relaxed),
            p50: self.percentile(0.50),
            p90: self.percentile(0.90),
            p99: self.percentile(0.99),
        }
    }
}

impl Default for LatencyHistogram {
    fn default() -> Self {
        Self::new()
    }
}

/// Histogram snapshot
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct HistogramSnapshot {
    /// Samples recorded
    pub count: u64,
    /// Sum of all samples
    pub sum_us: u64,
    /// Smallest sample (0 when empty)
    pub min_us: u64,
    /// Largest sample
    pub max_us: u64,
    /// Median bucket bound
    pub p50: u64,
    /// 90th percentile bucket bound
    pub p90: u64,
    /// 99th percentile bucket bound
    pub p99: u64,
}
