//! Performance monitoring for PSI phases.
//!
//! Thin wrapper off the hot path: phase timers, operation counter and a
//! serializable snapshot for callers that export metrics. Also keeps the
//! noise-level probe used when tuning the correctness threshold.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::info;

use crate::math::{ModQ, Poly};

/// Tracks per-phase durations and throughput of one PSI operation.
#[derive(Debug)]
pub struct PerformanceMonitor {
    start: Instant,
    key_gen: Duration,
    hashing: Duration,
    witness: Duration,
    intersection: Duration,
    total_operations: usize,
    num_workers: usize,
}

/// Serializable metrics snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct MonitorSnapshot {
    pub total_time_seconds: f64,
    pub key_gen_seconds: f64,
    pub key_gen_percent: f64,
    pub hashing_seconds: f64,
    pub hashing_percent: f64,
    pub witness_seconds: f64,
    pub witness_percent: f64,
    pub intersection_seconds: f64,
    pub intersection_percent: f64,
    pub num_workers: usize,
    pub total_operations: usize,
    pub throughput_ops_per_sec: f64,
}

impl PerformanceMonitor {
    pub fn new(num_workers: usize) -> Self {
        Self {
            start: Instant::now(),
            key_gen: Duration::ZERO,
            hashing: Duration::ZERO,
            witness: Duration::ZERO,
            intersection: Duration::ZERO,
            total_operations: 0,
            num_workers,
        }
    }

    pub fn track_key_generation(&mut self, started: Instant) {
        self.key_gen = started.elapsed();
    }

    pub fn track_hashing(&mut self, started: Instant) {
        self.hashing = started.elapsed();
    }

    pub fn track_witness_generation(&mut self, started: Instant) {
        self.witness = started.elapsed();
    }

    pub fn track_intersection(&mut self, started: Instant) {
        self.intersection = started.elapsed();
    }

    pub fn add_operations(&mut self, n: usize) {
        self.total_operations += n;
    }

    pub fn total_time(&self) -> Duration {
        self.start.elapsed()
    }

    /// Operations per second since the monitor was created.
    pub fn throughput(&self) -> f64 {
        let secs = self.total_time().as_secs_f64();
        if secs == 0.0 || self.total_operations == 0 {
            return 0.0;
        }
        self.total_operations as f64 / secs
    }

    /// Snapshot of every metric, suitable for JSON export.
    pub fn snapshot(&self) -> MonitorSnapshot {
        let total = self.total_time().as_secs_f64();
        let pct = |d: Duration| {
            if total > 0.0 {
                d.as_secs_f64() / total * 100.0
            } else {
                0.0
            }
        };
        MonitorSnapshot {
            total_time_seconds: total,
            key_gen_seconds: self.key_gen.as_secs_f64(),
            key_gen_percent: pct(self.key_gen),
            hashing_seconds: self.hashing.as_secs_f64(),
            hashing_percent: pct(self.hashing),
            witness_seconds: self.witness.as_secs_f64(),
            witness_percent: pct(self.witness),
            intersection_seconds: self.intersection.as_secs_f64(),
            intersection_percent: pct(self.intersection),
            num_workers: self.num_workers,
            total_operations: self.total_operations,
            throughput_ops_per_sec: self.throughput(),
        }
    }

    /// Logs the phase breakdown at info level.
    pub fn report(&self, label: &str) {
        let s = self.snapshot();
        info!(
            label,
            total_s = s.total_time_seconds,
            key_gen_s = s.key_gen_seconds,
            hashing_s = s.hashing_seconds,
            witness_s = s.witness_seconds,
            intersection_s = s.intersection_seconds,
            workers = s.num_workers,
            operations = s.total_operations,
            throughput = s.throughput_ops_per_sec,
            "performance report"
        );
    }
}

/// Noise between an original message and its decryption: maximum and
/// average centered magnitude as fractions of q, plus a histogram over the
/// standard analysis bins.
pub fn measure_noise_level(
    original: &Poly,
    decrypted: &Poly,
    q: u64,
) -> (f64, f64, BTreeMap<&'static str, usize>) {
    let d = original.dimension();
    let mut max_noise = 0u64;
    let mut total_noise = 0u128;

    let mut bins: BTreeMap<&'static str, usize> = BTreeMap::new();
    for key in ["0-0.1%Q", "0.1-1%Q", "1-5%Q", "5-10%Q", "10-25%Q", ">25%Q"] {
        bins.insert(key, 0);
    }

    for i in 0..d {
        let diff = ModQ::sub(decrypted.coeff(i), original.coeff(i), q);
        let noise = if diff > q / 2 { q - diff } else { diff };
        max_noise = max_noise.max(noise);
        total_noise += noise as u128;

        let fraction = noise as f64 / q as f64;
        let key = match fraction {
            f if f <= 0.001 => "0-0.1%Q",
            f if f <= 0.01 => "0.1-1%Q",
            f if f <= 0.05 => "1-5%Q",
            f if f <= 0.1 => "5-10%Q",
            f if f <= 0.25 => "10-25%Q",
            _ => ">25%Q",
        };
        *bins.get_mut(key).unwrap() += 1;
    }

    let max_fraction = max_noise as f64 / q as f64;
    let avg_fraction = total_noise as f64 / d as f64 / q as f64;
    (max_fraction, avg_fraction, bins)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::DEFAULT_Q;

    #[test]
    fn test_snapshot_percentages_cover_phases() {
        let mut m = PerformanceMonitor::new(4);
        let t = Instant::now();
        std::thread::sleep(Duration::from_millis(5));
        m.track_key_generation(t);
        m.add_operations(100);

        let s = m.snapshot();
        assert!(s.key_gen_seconds > 0.0);
        assert!(s.key_gen_percent > 0.0 && s.key_gen_percent <= 100.0);
        assert_eq!(s.num_workers, 4);
        assert_eq!(s.total_operations, 100);
        assert!(s.throughput_ops_per_sec > 0.0);
    }

    #[test]
    fn test_snapshot_serializes_to_json() {
        let m = PerformanceMonitor::new(2);
        let json = serde_json::to_string(&m.snapshot()).unwrap();
        assert!(json.contains("intersection_seconds"));
        assert!(json.contains("num_workers"));
    }

    #[test]
    fn test_noise_measurement_identical_polys() {
        let q = DEFAULT_Q;
        let p = Poly::from_coeffs(vec![1, 0, 1, 1], q);
        let (max, avg, bins) = measure_noise_level(&p, &p, q);
        assert_eq!(max, 0.0);
        assert_eq!(avg, 0.0);
        assert_eq!(bins["0-0.1%Q"], 4);
    }

    #[test]
    fn test_noise_measurement_wraps_negative() {
        let q = DEFAULT_Q;
        let orig = Poly::from_coeffs(vec![10, 0], q);
        // 5 below and q/3 above: one tiny, one huge noise term.
        let dec = Poly::from_coeffs(vec![5, q / 3], q);
        let (max, _avg, bins) = measure_noise_level(&orig, &dec, q);
        assert!(max > 0.25);
        assert_eq!(bins[">25%Q"], 1);
        assert_eq!(bins["0-0.1%Q"], 1);
    }
}
