//! Lock-free metrics collection and periodic reporting
//!
//! Uses atomics for hot-path operations to avoid mutex contention.
//! All counter updates are lock-free; reporting is the only operation
//! that needs synchronization (via atomic swap).
//!
//! NOTE: All atomics use Relaxed ordering intentionally: these are statistical
//! counters only. Do NOT use these atomics for coordination or logic decisions.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::info;

/// Exponential bucket boundaries (microseconds)
/// Buckets: ≤100, ≤200, ≤400, ≤800, ≤1600, ≤3200, ≤6400, ≤12800, ≤25600, ≤51200, >51200
const BUCKET_BOUNDS: [u64; 10] = [100, 200, 400, 800, 1600, 3200, 6400, 12800, 25600, 51200];
const NUM_BUCKETS: usize = 11;

/// Compute bucket index for a latency value using binary search
#[inline]
fn bucket_index(latency_us: u64) -> usize {
    BUCKET_BOUNDS.partition_point(|&bound| bound < latency_us)
}

/// Update an atomic max value using compare-and-swap loop
#[inline]
fn update_atomic_max(atomic_max: &AtomicU64, new_value: u64) {
    let mut current_max = atomic_max.load(Ordering::Relaxed);
    while new_value > current_max {
        match atomic_max.compare_exchange_weak(
            current_max,
            new_value,
            Ordering::Relaxed,
            Ordering::Relaxed,
        ) {
            Ok(_) => break,
            Err(actual) => current_max = actual,
        }
    }
}

/// Swap all buckets to zero and return their values
#[inline]
fn swap_buckets(buckets: &[AtomicU64; NUM_BUCKETS]) -> [u64; NUM_BUCKETS] {
    let mut result = [0u64; NUM_BUCKETS];
    for (i, bucket) in buckets.iter().enumerate() {
        result[i] = bucket.swap(0, Ordering::Relaxed);
    }
    result
}

/// Compute percentile from histogram buckets
/// Returns the upper bound of the bucket containing the percentile
fn percentile_from_buckets(buckets: &[u64; NUM_BUCKETS], percentile: f64) -> u64 {
    let total: u64 = buckets.iter().sum();
    if total == 0 {
        return 0;
    }

    let target = (total as f64 * percentile) as u64;
    let mut cumulative = 0u64;

    // Upper bounds for each bucket (last bucket uses 2x the previous bound)
    const BUCKET_UPPER_BOUNDS: [u64; NUM_BUCKETS] =
        [100, 200, 400, 800, 1600, 3200, 6400, 12800, 25600, 51200, 102400];

    for (i, &count) in buckets.iter().enumerate() {
        cumulative += count;
        if cumulative >= target {
            return BUCKET_UPPER_BOUNDS[i];
        }
    }
    BUCKET_UPPER_BOUNDS[NUM_BUCKETS - 1]
}

/// Latency histogram with sum and max, reset on report
struct LatencyHistogram {
    buckets: [AtomicU64; NUM_BUCKETS],
    sum_us: AtomicU64,
    max_us: AtomicU64,
}

impl LatencyHistogram {
    fn new() -> Self {
        Self {
            buckets: std::array::from_fn(|_| AtomicU64::new(0)),
            sum_us: AtomicU64::new(0),
            max_us: AtomicU64::new(0),
        }
    }

    #[inline]
    fn record(&self, latency_us: u64) {
        self.buckets[bucket_index(latency_us)].fetch_add(1, Ordering::Relaxed);
        self.sum_us.fetch_add(latency_us, Ordering::Relaxed);
        update_atomic_max(&self.max_us, latency_us);
    }

    fn take(&self) -> LatencySnapshot {
        let buckets = swap_buckets(&self.buckets);
        let sum = self.sum_us.swap(0, Ordering::Relaxed);
        let max_us = self.max_us.swap(0, Ordering::Relaxed);
        let count: u64 = buckets.iter().sum();
        LatencySnapshot {
            count,
            avg_us: if count > 0 { sum / count } else { 0 },
            max_us,
            p50_us: percentile_from_buckets(&buckets, 0.50),
            p95_us: percentile_from_buckets(&buckets, 0.95),
            p99_us: percentile_from_buckets(&buckets, 0.99),
            buckets,
        }
    }
}

/// Lock-free metrics collector
///
/// All recording operations are lock-free using atomics.
/// The `report()` method atomically swaps counters to get a consistent snapshot.
pub struct Metrics {
    /// Route requests ever received (monotonic)
    route_requests_total: AtomicU64,
    /// Route requests since last report (reset on report)
    requests_since_report: AtomicU64,
    /// Requests that produced a non-empty route (monotonic)
    routes_found_total: AtomicU64,
    /// Searches that completed without a route (monotonic)
    unreachable_total: AtomicU64,
    /// Results discarded because a newer request or a clear overtook them (monotonic)
    stale_discarded_total: AtomicU64,
    /// Outdoor provider failures and timeouts (monotonic)
    provider_failures_total: AtomicU64,
    /// Venue-to-venue requests answered with a pure indoor route (monotonic)
    linked_indoor_total: AtomicU64,
    /// Indoor graph search latency
    search_latency: LatencyHistogram,
    /// Outdoor provider round-trip latency
    outdoor_latency: LatencyHistogram,
    /// Last report time (only accessed from reporter, not atomic)
    last_report_time: parking_lot::Mutex<Instant>,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            route_requests_total: AtomicU64::new(0),
            requests_since_report: AtomicU64::new(0),
            routes_found_total: AtomicU64::new(0),
            unreachable_total: AtomicU64::new(0),
            stale_discarded_total: AtomicU64::new(0),
            provider_failures_total: AtomicU64::new(0),
            linked_indoor_total: AtomicU64::new(0),
            search_latency: LatencyHistogram::new(),
            outdoor_latency: LatencyHistogram::new(),
            last_report_time: parking_lot::Mutex::new(Instant::now()),
        }
    }

    #[inline]
    pub fn record_route_request(&self) {
        self.route_requests_total.fetch_add(1, Ordering::Relaxed);
        self.requests_since_report.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_route_found(&self) {
        self.routes_found_total.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_unreachable(&self) {
        self.unreachable_total.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_stale_discarded(&self) {
        self.stale_discarded_total.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_provider_failure(&self) {
        self.provider_failures_total.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_linked_indoor(&self) {
        self.linked_indoor_total.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_search_latency(&self, latency_us: u64) {
        self.search_latency.record(latency_us);
    }

    #[inline]
    pub fn record_outdoor_latency(&self, latency_us: u64) {
        self.outdoor_latency.record(latency_us);
    }

    pub fn route_requests_total(&self) -> u64 {
        self.route_requests_total.load(Ordering::Relaxed)
    }

    pub fn routes_found_total(&self) -> u64 {
        self.routes_found_total.load(Ordering::Relaxed)
    }

    pub fn unreachable_total(&self) -> u64 {
        self.unreachable_total.load(Ordering::Relaxed)
    }

    pub fn stale_discarded_total(&self) -> u64 {
        self.stale_discarded_total.load(Ordering::Relaxed)
    }

    pub fn provider_failures_total(&self) -> u64 {
        self.provider_failures_total.load(Ordering::Relaxed)
    }

    /// Calculate and return metrics summary, then reset periodic counters
    ///
    /// This is the only method that resets counters. It uses atomic swap
    /// to get a consistent snapshot while allowing concurrent updates.
    pub fn report(&self) -> MetricsSummary {
        let requests = self.requests_since_report.swap(0, Ordering::Relaxed);
        let search = self.search_latency.take();
        let outdoor = self.outdoor_latency.take();

        let elapsed = {
            let mut last = self.last_report_time.lock();
            let elapsed = last.elapsed();
            *last = Instant::now();
            elapsed
        };

        let requests_per_sec = if elapsed.as_secs_f64() > 0.0 {
            requests as f64 / elapsed.as_secs_f64()
        } else {
            0.0
        };

        MetricsSummary {
            route_requests_total: self.route_requests_total.load(Ordering::Relaxed),
            requests_per_sec,
            routes_found_total: self.routes_found_total.load(Ordering::Relaxed),
            unreachable_total: self.unreachable_total.load(Ordering::Relaxed),
            stale_discarded_total: self.stale_discarded_total.load(Ordering::Relaxed),
            provider_failures_total: self.provider_failures_total.load(Ordering::Relaxed),
            linked_indoor_total: self.linked_indoor_total.load(Ordering::Relaxed),
            search,
            outdoor,
        }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-interval latency figures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LatencySnapshot {
    pub count: u64,
    pub avg_us: u64,
    pub max_us: u64,
    /// Bounds: ≤100, ≤200, ≤400, ≤800, ≤1600, ≤3200, ≤6400, ≤12800, ≤25600, ≤51200, >51200 µs
    pub buckets: [u64; NUM_BUCKETS],
    pub p50_us: u64,
    pub p95_us: u64,
    pub p99_us: u64,
}

#[derive(Debug)]
pub struct MetricsSummary {
    pub route_requests_total: u64,
    pub requests_per_sec: f64,
    pub routes_found_total: u64,
    pub unreachable_total: u64,
    pub stale_discarded_total: u64,
    pub provider_failures_total: u64,
    pub linked_indoor_total: u64,
    /// Indoor search latency since last report
    pub search: LatencySnapshot,
    /// Outdoor provider latency since last report
    pub outdoor: LatencySnapshot,
}

impl MetricsSummary {
    pub fn log(&self) {
        info!(
            requests_total = %self.route_requests_total,
            requests_per_sec = format!("{:.1}", self.requests_per_sec),
            found = %self.routes_found_total,
            unreachable = %self.unreachable_total,
            stale = %self.stale_discarded_total,
            provider_failures = %self.provider_failures_total,
            linked_indoor = %self.linked_indoor_total,
            search_avg_us = %self.search.avg_us,
            search_p99_us = %self.search.p99_us,
            search_max_us = %self.search.max_us,
            outdoor_p50_us = %self.outdoor.p50_us,
            outdoor_p99_us = %self.outdoor.p99_us,
            "metrics"
        );
    }
}
