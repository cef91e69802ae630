use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::results::{LoadTestResult, TestStatus, TimelineBucket};

// ---------------------------------------------------------------------------
// RequestOutcome
// ---------------------------------------------------------------------------

/// What one dispatched load-test unit reports on completion.
///
/// A unit is one first-step request or one full scenario pass, so the
/// per-step vectors may hold more than one entry in full-scenario mode.
#[derive(Debug, Clone)]
pub struct RequestOutcome {
    pub status: TestStatus,
    /// Response time of each step that received a response.
    pub response_times_ms: Vec<u64>,
    pub status_codes: Vec<u16>,
    /// Error kinds observed (e.g. `timeout`, `transport`, `concurrency_limit`).
    pub error_kinds: Vec<String>,
}

impl RequestOutcome {
    /// Outcome for a dispatch that could not obtain a concurrency slot.
    pub fn rejected() -> Self {
        Self {
            status: TestStatus::Error,
            response_times_ms: Vec::new(),
            status_codes: Vec::new(),
            error_kinds: vec!["concurrency_limit".to_string()],
        }
    }
}

// ---------------------------------------------------------------------------
// ProgressSnapshot
// ---------------------------------------------------------------------------

/// Point-in-time view handed to the load-test progress callback.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ProgressSnapshot {
    pub elapsed_seconds: f64,
    pub total_requests: u64,
    pub successful_requests: u64,
    pub failed_requests: u64,
    pub error_requests: u64,
    pub current_tps: f64,
    pub avg_response_ms: f64,
    pub p95_response_ms: u64,
}

// ---------------------------------------------------------------------------
// LoadAggregator
// ---------------------------------------------------------------------------

/// Per-second statistics window.
#[derive(Debug, Clone)]
struct BucketStats {
    requests: u64,
    successes: u64,
    failures: u64,
    sum_ms: u64,
    samples: u64,
}

/// Streaming metrics aggregator for a load-test run.
///
/// Clock-free: callers pass the elapsed run time with each record, so a
/// completion is credited to the second in which it completed and buckets
/// for past seconds are never touched again. Held behind `Arc<RwLock<_>>`;
/// a single drain task performs all writes while the progress reporter
/// takes read snapshots.
pub struct LoadAggregator {
    total: u64,
    successes: u64,
    failures: u64,
    errors: u64,
    /// All individual response times (ms), kept for exact percentiles.
    response_times: Vec<u64>,
    sum_ms: u64,
    min_ms: u64,
    max_ms: u64,
    status_codes: BTreeMap<u16, u64>,
    error_kinds: BTreeMap<String, u64>,
    buckets: BTreeMap<u64, BucketStats>,
}

impl LoadAggregator {
    pub fn new() -> Self {
        Self {
            total: 0,
            successes: 0,
            failures: 0,
            errors: 0,
            response_times: Vec::new(),
            sum_ms: 0,
            min_ms: u64::MAX,
            max_ms: 0,
            status_codes: BTreeMap::new(),
            error_kinds: BTreeMap::new(),
            buckets: BTreeMap::new(),
        }
    }

    /// Record one completed unit, credited to the second `elapsed` falls in.
    pub fn record(&mut self, elapsed: Duration, outcome: &RequestOutcome) {
        self.total += 1;
        match outcome.status {
            TestStatus::Success => self.successes += 1,
            TestStatus::Failure => self.failures += 1,
            TestStatus::Error => self.errors += 1,
        }

        for &ms in &outcome.response_times_ms {
            self.response_times.push(ms);
            self.sum_ms += ms;
            if ms < self.min_ms {
                self.min_ms = ms;
            }
            if ms > self.max_ms {
                self.max_ms = ms;
            }
        }

        for &code in &outcome.status_codes {
            *self.status_codes.entry(code).or_insert(0) += 1;
        }
        for kind in &outcome.error_kinds {
            *self.error_kinds.entry(kind.clone()).or_insert(0) += 1;
        }

        let bucket = self
            .buckets
            .entry(elapsed.as_secs())
            .or_insert(BucketStats {
                requests: 0,
                successes: 0,
                failures: 0,
                sum_ms: 0,
                samples: 0,
            });
        bucket.requests += 1;
        match outcome.status {
            TestStatus::Success => bucket.successes += 1,
            TestStatus::Failure | TestStatus::Error => bucket.failures += 1,
        }
        for &ms in &outcome.response_times_ms {
            bucket.sum_ms += ms;
            bucket.samples += 1;
        }
    }

    pub fn total_requests(&self) -> u64 {
        self.total
    }

    /// Nearest-rank percentile over all recorded response times.
    ///
    /// `p` is in (0.0, 100.0]; returns 0 when nothing has been recorded.
    pub fn percentile(&self, p: f64) -> u64 {
        if self.response_times.is_empty() {
            return 0;
        }
        let mut sorted = self.response_times.clone();
        sorted.sort_unstable();
        let idx = ((p / 100.0) * sorted.len() as f64).ceil() as usize;
        let idx = idx.saturating_sub(1).min(sorted.len() - 1);
        sorted[idx]
    }

    fn avg_response_ms(&self) -> f64 {
        if self.response_times.is_empty() {
            0.0
        } else {
            self.sum_ms as f64 / self.response_times.len() as f64
        }
    }

    /// Lightweight view for the progress callback.
    pub fn snapshot(&self, elapsed: Duration) -> ProgressSnapshot {
        let secs = elapsed.as_secs_f64();
        let current_tps = if secs > 0.001 {
            self.total as f64 / secs
        } else {
            0.0
        };
        ProgressSnapshot {
            elapsed_seconds: secs,
            total_requests: self.total,
            successful_requests: self.successes,
            failed_requests: self.failures,
            error_requests: self.errors,
            current_tps,
            avg_response_ms: self.avg_response_ms(),
            p95_response_ms: self.percentile(95.0),
        }
    }

    /// Per-second timeline, ordered by second.
    pub fn timeline(&self) -> Vec<TimelineBucket> {
        self.buckets
            .iter()
            .map(|(&second, stats)| TimelineBucket {
                second,
                requests: stats.requests,
                successes: stats.successes,
                failures: stats.failures,
                avg_response_ms: if stats.samples > 0 {
                    stats.sum_ms as f64 / stats.samples as f64
                } else {
                    0.0
                },
            })
            .collect()
    }

    /// Assemble the final result document.
    pub fn result(
        &self,
        run_id: Uuid,
        scenario_name: String,
        started_at: DateTime<Utc>,
        finished_at: DateTime<Utc>,
        elapsed: Duration,
        target_tps: f64,
    ) -> LoadTestResult {
        let secs = elapsed.as_secs_f64();
        let actual_avg_tps = if secs > 0.0 {
            self.total as f64 / secs
        } else {
            0.0
        };
        let success_rate = if self.total > 0 {
            self.successes as f64 / self.total as f64 * 100.0
        } else {
            0.0
        };

        LoadTestResult {
            run_id,
            scenario_name,
            started_at,
            finished_at,
            duration_seconds: secs,
            target_tps,
            actual_avg_tps,
            total_requests: self.total,
            successful_requests: self.successes,
            failed_requests: self.failures,
            error_requests: self.errors,
            success_rate,
            avg_response_ms: self.avg_response_ms(),
            min_response_ms: if self.min_ms == u64::MAX { 0 } else { self.min_ms },
            max_response_ms: self.max_ms,
            p50_response_ms: self.percentile(50.0),
            p95_response_ms: self.percentile(95.0),
            p99_response_ms: self.percentile(99.0),
            status_code_distribution: self.status_codes.clone(),
            error_distribution: self.error_kinds.clone(),
            timeline: self.timeline(),
        }
    }
}

impl Default for LoadAggregator {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn success(ms: u64, code: u16) -> RequestOutcome {
        RequestOutcome {
            status: TestStatus::Success,
            response_times_ms: vec![ms],
            status_codes: vec![code],
            error_kinds: Vec::new(),
        }
    }

    fn failure(ms: u64, code: u16) -> RequestOutcome {
        RequestOutcome {
            status: TestStatus::Failure,
            response_times_ms: vec![ms],
            status_codes: vec![code],
            error_kinds: Vec::new(),
        }
    }

    fn transport_error(kind: &str) -> RequestOutcome {
        RequestOutcome {
            status: TestStatus::Error,
            response_times_ms: Vec::new(),
            status_codes: Vec::new(),
            error_kinds: vec![kind.to_string()],
        }
    }

    fn at(secs: u64) -> Duration {
        Duration::from_secs(secs)
    }

    // -----------------------------------------------------------------------
    // record
    // -----------------------------------------------------------------------

    #[test]
    fn record_updates_classification_counts() {
        let mut agg = LoadAggregator::new();
        agg.record(at(0), &success(100, 200));
        agg.record(at(0), &failure(200, 500));
        agg.record(at(0), &transport_error("timeout"));

        assert_eq!(agg.total, 3);
        assert_eq!(agg.successes, 1);
        assert_eq!(agg.failures, 1);
        assert_eq!(agg.errors, 1);
    }

    #[test]
    fn record_tracks_min_max_sum() {
        let mut agg = LoadAggregator::new();
        agg.record(at(0), &success(100, 200));
        agg.record(at(0), &success(50, 200));
        agg.record(at(0), &success(200, 200));
        assert_eq!(agg.min_ms, 50);
        assert_eq!(agg.max_ms, 200);
        assert_eq!(agg.sum_ms, 350);
    }

    #[test]
    fn record_builds_status_code_histogram() {
        let mut agg = LoadAggregator::new();
        agg.record(at(0), &success(10, 200));
        agg.record(at(0), &success(10, 200));
        agg.record(at(0), &failure(10, 500));
        assert_eq!(agg.status_codes[&200], 2);
        assert_eq!(agg.status_codes[&500], 1);
    }

    #[test]
    fn record_builds_error_kind_histogram() {
        let mut agg = LoadAggregator::new();
        agg.record(at(0), &transport_error("timeout"));
        agg.record(at(0), &transport_error("timeout"));
        agg.record(at(0), &RequestOutcome::rejected());
        assert_eq!(agg.error_kinds["timeout"], 2);
        assert_eq!(agg.error_kinds["concurrency_limit"], 1);
    }

    #[test]
    fn multi_step_outcome_records_every_sample() {
        let mut agg = LoadAggregator::new();
        let outcome = RequestOutcome {
            status: TestStatus::Success,
            response_times_ms: vec![10, 20, 30],
            status_codes: vec![200, 201, 200],
            error_kinds: Vec::new(),
        };
        agg.record(at(0), &outcome);
        assert_eq!(agg.total, 1);
        assert_eq!(agg.response_times.len(), 3);
        assert_eq!(agg.status_codes[&200], 2);
        assert_eq!(agg.status_codes[&201], 1);
    }

    // -----------------------------------------------------------------------
    // percentile
    // -----------------------------------------------------------------------

    #[test]
    fn percentile_empty_returns_zero() {
        let agg = LoadAggregator::new();
        assert_eq!(agg.percentile(50.0), 0);
        assert_eq!(agg.percentile(99.0), 0);
    }

    #[test]
    fn percentile_single_entry_returns_that_value() {
        let mut agg = LoadAggregator::new();
        agg.record(at(0), &success(250, 200));
        assert_eq!(agg.percentile(50.0), 250);
        assert_eq!(agg.percentile(99.0), 250);
    }

    #[test]
    fn percentile_nearest_rank_over_hundred_samples() {
        // 10, 20, ..., 1000 — the standard nearest-rank answers.
        let mut agg = LoadAggregator::new();
        for i in 1..=100u64 {
            agg.record(at(0), &success(i * 10, 200));
        }
        assert_eq!(agg.percentile(50.0), 500);
        assert_eq!(agg.percentile(95.0), 950);
        assert_eq!(agg.percentile(99.0), 990);
        assert_eq!(agg.percentile(100.0), 1000);
    }

    #[test]
    fn percentile_is_insertion_order_independent() {
        let mut ordered = LoadAggregator::new();
        let mut reversed = LoadAggregator::new();
        for ms in [10u64, 50, 100, 200, 500] {
            ordered.record(at(0), &success(ms, 200));
        }
        for ms in [500u64, 200, 100, 50, 10] {
            reversed.record(at(0), &success(ms, 200));
        }
        assert_eq!(ordered.percentile(50.0), reversed.percentile(50.0));
        assert_eq!(ordered.percentile(95.0), reversed.percentile(95.0));
    }

    // -----------------------------------------------------------------------
    // timeline
    // -----------------------------------------------------------------------

    #[test]
    fn timeline_credits_completions_to_their_second() {
        let mut agg = LoadAggregator::new();
        agg.record(Duration::from_millis(500), &success(10, 200));
        agg.record(Duration::from_millis(900), &success(20, 200));
        agg.record(Duration::from_millis(1100), &failure(30, 500));
        agg.record(Duration::from_millis(3200), &success(40, 200));

        let timeline = agg.timeline();
        assert_eq!(timeline.len(), 3);
        assert_eq!(timeline[0].second, 0);
        assert_eq!(timeline[0].requests, 2);
        assert_eq!(timeline[0].successes, 2);
        assert_eq!(timeline[1].second, 1);
        assert_eq!(timeline[1].failures, 1);
        assert_eq!(timeline[2].second, 3);
    }

    #[test]
    fn timeline_request_counts_sum_to_total() {
        let mut agg = LoadAggregator::new();
        for i in 0..137u64 {
            let elapsed = Duration::from_millis(i * 73);
            if i % 5 == 0 {
                agg.record(elapsed, &transport_error("transport"));
            } else {
                agg.record(elapsed, &success(i, 200));
            }
        }
        let timeline_total: u64 = agg.timeline().iter().map(|b| b.requests).sum();
        assert_eq!(timeline_total, agg.total_requests());
    }

    #[test]
    fn timeline_bucket_avg_uses_only_its_samples() {
        let mut agg = LoadAggregator::new();
        agg.record(at(0), &success(10, 200));
        agg.record(at(0), &success(30, 200));
        agg.record(at(1), &success(100, 200));
        let timeline = agg.timeline();
        assert!((timeline[0].avg_response_ms - 20.0).abs() < 0.001);
        assert!((timeline[1].avg_response_ms - 100.0).abs() < 0.001);
    }

    #[test]
    fn timeline_is_ordered_by_second() {
        let mut agg = LoadAggregator::new();
        agg.record(at(5), &success(1, 200));
        agg.record(at(2), &success(1, 200));
        agg.record(at(9), &success(1, 200));
        let seconds: Vec<u64> = agg.timeline().iter().map(|b| b.second).collect();
        assert_eq!(seconds, vec![2, 5, 9]);
    }

    // -----------------------------------------------------------------------
    // snapshot
    // -----------------------------------------------------------------------

    #[test]
    fn snapshot_empty_aggregator() {
        let agg = LoadAggregator::new();
        let snap = agg.snapshot(Duration::ZERO);
        assert_eq!(snap.total_requests, 0);
        assert_eq!(snap.current_tps, 0.0);
        assert_eq!(snap.avg_response_ms, 0.0);
    }

    #[test]
    fn snapshot_computes_current_tps() {
        let mut agg = LoadAggregator::new();
        for _ in 0..50 {
            agg.record(at(0), &success(10, 200));
        }
        let snap = agg.snapshot(Duration::from_secs(5));
        assert!((snap.current_tps - 10.0).abs() < 0.001);
        assert_eq!(snap.total_requests, 50);
    }

    // -----------------------------------------------------------------------
    // result
    // -----------------------------------------------------------------------

    #[test]
    fn result_empty_aggregator() {
        let agg = LoadAggregator::new();
        let now = Utc::now();
        let r = agg.result(
            Uuid::new_v4(),
            "Empty".to_string(),
            now,
            now,
            Duration::from_secs(1),
            10.0,
        );
        assert_eq!(r.total_requests, 0);
        assert_eq!(r.min_response_ms, 0);
        assert_eq!(r.success_rate, 0.0);
        assert_eq!(r.actual_avg_tps, 0.0);
    }

    #[test]
    fn result_computes_rates_and_statistics() {
        let mut agg = LoadAggregator::new();
        for _ in 0..90 {
            agg.record(at(0), &success(100, 200));
        }
        for _ in 0..10 {
            agg.record(at(1), &failure(300, 500));
        }

        let now = Utc::now();
        let r = agg.result(
            Uuid::new_v4(),
            "Load".to_string(),
            now,
            now,
            Duration::from_secs(10),
            10.0,
        );
        assert_eq!(r.total_requests, 100);
        assert_eq!(r.successful_requests, 90);
        assert_eq!(r.failed_requests, 10);
        assert!((r.actual_avg_tps - 10.0).abs() < 0.001);
        assert!((r.success_rate - 90.0).abs() < 0.001);
        assert!((r.avg_response_ms - 120.0).abs() < 0.001);
        assert_eq!(r.min_response_ms, 100);
        assert_eq!(r.max_response_ms, 300);
        assert_eq!(r.status_code_distribution[&200], 90);
        assert_eq!(r.status_code_distribution[&500], 10);
        assert_eq!(r.timeline.len(), 2);
    }
}
