//! Log-bucketed latency histogram
//!
//! 64 power-of-two buckets indexed by the highest set bit of the sample,
//! lock-free on the record path. Percentiles are reported as the upper
//! bound of the bucket where the cumulative count crosses the requested
//! quantile, which is exact enough for latency work where the bucket width
//! tracks the magnitude.

use crossbeam_utils::CachePadded;
use std::sync::atomic::{AtomicU64, Ordering};

const BUCKETS: usize = 64;

pub struct LatencyHistogram {
    buckets: Box<[CachePadded<AtomicU64>]>,
    total_ns: CachePadded<AtomicU64>,
}

impl LatencyHistogram {
    pub fn new() -> Self {
        Self {
            buckets: (0..BUCKETS)
                .map(|_| CachePadded::new(AtomicU64::new(0)))
                .collect::<Vec<_>>()
                .into_boxed_slice(),
            total_ns: CachePadded::new(AtomicU64::new(0)),
        }
    }

    #[inline(always)]
    fn bucket_index(sample_ns: u64) -> usize {
        if sample_ns == 0 {
            0
        } else {
            63 - sample_ns.leading_zeros() as usize
        }
    }

    /// Upper bound of a bucket in nanoseconds.
    #[inline(always)]
    fn bucket_bound(index: usize) -> u64 {
        if index >= 63 {
            u64::MAX
        } else {
            (2u64 << index) - 1
        }
    }

    #[inline(always)]
    pub fn record(&self, sample_ns: u64) {
        self.buckets[Self::bucket_index(sample_ns)].fetch_add(1, Ordering::Relaxed);
        self.total_ns.fetch_add(sample_ns, Ordering::Relaxed);
    }

    pub fn count(&self) -> u64 {
        self.buckets
            .iter()
            .map(|b| b.load(Ordering::Relaxed))
            .sum()
    }

    pub fn mean_ns(&self) -> u64 {
        let count = self.count();
        if count == 0 {
            0
        } else {
            self.total_ns.load(Ordering::Relaxed) / count
        }
    }

    /// Upper bound of the bucket containing the `q`-quantile sample,
    /// `q` in (0, 1].
    pub fn percentile_ns(&self, q: f64) -> u64 {
        let counts: Vec<u64> = self.buckets.iter().map(|b| b.load(Ordering::Relaxed)).collect();
        let total: u64 = counts.iter().sum();
        if total == 0 {
            return 0;
        }
        let rank = ((q.clamp(0.0, 1.0) * total as f64).ceil() as u64).max(1);
        let mut cumulative = 0;
        for (index, count) in counts.iter().enumerate() {
            cumulative += count;
            if cumulative >= rank {
                return Self::bucket_bound(index);
            }
        }
        Self::bucket_bound(BUCKETS - 1)
    }

    /// Non-empty buckets as `(upper_bound_ns, count)` pairs.
    pub fn snapshot(&self) -> Vec<(u64, u64)> {
        self.buckets
            .iter()
            .enumerate()
            .filter_map(|(index, bucket)| {
                let count = bucket.load(Ordering::Relaxed);
                (count > 0).then_some((Self::bucket_bound(index), count))
            })
            .collect()
    }

    pub fn reset(&self) {
        for bucket in self.buckets.iter() {
            bucket.store(0, Ordering::Relaxed);
        }
        self.total_ns.store(0, Ordering::Relaxed);
    }
}

impl Default for LatencyHistogram {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bucket_boundaries() {
        assert_eq!(LatencyHistogram::bucket_index(0), 0);
        assert_eq!(LatencyHistogram::bucket_index(1), 0);
        assert_eq!(LatencyHistogram::bucket_index(2), 1);
        assert_eq!(LatencyHistogram::bucket_index(3), 1);
        assert_eq!(LatencyHistogram::bucket_index(1024), 10);
        assert_eq!(LatencyHistogram::bucket_bound(0), 1);
        assert_eq!(LatencyHistogram::bucket_bound(1), 3);
        assert_eq!(LatencyHistogram::bucket_bound(10), 2047);
    }

    #[test]
    fn test_count_and_mean() {
        let h = LatencyHistogram::new();
        h.record(100);
        h.record(200);
        h.record(300);
        assert_eq!(h.count(), 3);
        assert_eq!(h.mean_ns(), 200);
    }

    #[test]
    fn test_percentiles_land_in_right_bucket() {
        let h = LatencyHistogram::new();
        // 90 fast samples around 1µs, 10 slow around 1ms.
        for _ in 0..90 {
            h.record(1_000);
        }
        for _ in 0..10 {
            h.record(1_000_000);
        }
        let p50 = h.percentile_ns(0.50);
        let p99 = h.percentile_ns(0.99);
        assert!(p50 < 2_048, "p50 {p50}");
        assert!((524_288..2_097_152).contains(&p99), "p99 {p99}");
    }

    #[test]
    fn test_empty_histogram() {
        let h = LatencyHistogram::new();
        assert_eq!(h.count(), 0);
        assert_eq!(h.mean_ns(), 0);
        assert_eq!(h.percentile_ns(0.99), 0);
        assert!(h.snapshot().is_empty());
    }

    #[test]
    fn test_reset() {
        let h = LatencyHistogram::new();
        h.record(500);
        h.reset();
        assert_eq!(h.count(), 0);
        assert!(h.snapshot().is_empty());
    }
}
