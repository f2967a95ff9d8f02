use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use hdrhistogram::Histogram;
use hyper::StatusCode;
use parking_lot::Mutex;

/// Distinct failure reasons tracked individually, the rest fold into `OTHER_REASON`.
const MAX_REASONS: usize = 64;
/// Round trips above one hour are clamped.
const MAX_TRACKED_RTT_US: u64 = 3_600_000_000;
pub const OTHER_REASON: &str = "other";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Failure(String),
}

/// Result of a single task execution.
#[derive(Debug, Clone)]
pub struct RequestSample {
    pub rtt: Duration,
    /// `None` when no response arrived.
    pub status: Option<StatusCode>,
    pub outcome: Outcome,
}

impl RequestSample {
    #[must_use]
    pub fn success(rtt: Duration, status: StatusCode) -> Self {
        Self {
            rtt,
            status: Some(status),
            outcome: Outcome::Success,
        }
    }

    #[must_use]
    pub fn failure(rtt: Duration, status: Option<StatusCode>, reason: impl Into<String>) -> Self {
        Self {
            rtt,
            status,
            outcome: Outcome::Failure(reason.into()),
        }
    }

    #[inline]
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.outcome == Outcome::Success
    }
}

struct Totals {
    rtt_us: Histogram<u64>,
    successes: usize,
    failures: usize,
    failure_reasons: BTreeMap<String, usize>,
}

/// Shared sink every user records into, memory stays constant over the run.
#[derive(Clone)]
pub struct StatsCollector {
    totals: Arc<Mutex<Totals>>,
}

impl StatsCollector {
    pub fn new() -> anyhow::Result<Self> {
        let rtt_us = Histogram::new_with_bounds(1, MAX_TRACKED_RTT_US, 3)
            .context("Failed to create rtt histogram")?;
        Ok(Self {
            totals: Arc::new(Mutex::new(Totals {
                rtt_us,
                successes: 0,
                failures: 0,
                failure_reasons: BTreeMap::new(),
            })),
        })
    }

    pub fn record(&self, sample: &RequestSample) {
        let us = u64::try_from(sample.rtt.as_micros()).unwrap_or(u64::MAX);
        let mut guard = self.totals.lock();
        let totals = &mut *guard;
        totals.rtt_us.saturating_record(us);
        match &sample.outcome {
            Outcome::Success => totals.successes += 1,
            Outcome::Failure(reason) => {
                totals.failures += 1;
                let tracked = totals.failure_reasons.len();
                match totals.failure_reasons.get_mut(reason.as_str()) {
                    Some(count) => *count += 1,
                    None if tracked < MAX_REASONS => {
                        totals.failure_reasons.insert(reason.clone(), 1);
                    }
                    None => {
                        *totals
                            .failure_reasons
                            .entry(OTHER_REASON.to_string())
                            .or_default() += 1;
                    }
                }
            }
        }
    }

    #[must_use]
    pub fn summary(&self, wall_time: Duration) -> Summary {
        let totals = self.totals.lock();
        let hist = &totals.rtt_us;
        let mut summary = Summary {
            successes: totals.successes,
            failures: totals.failures,
            requests: totals.successes + totals.failures,
            failure_reasons: totals.failure_reasons.clone(),
            wall_time,
            ..Summary::default()
        };
        if hist.len() > 0 {
            summary.min_rtt_us = hist.min();
            summary.mean_rtt_us = hist.mean();
            summary.max_rtt_us = hist.max();
            summary.p50_rtt_us = hist.value_at_quantile(0.50);
            summary.p95_rtt_us = hist.value_at_quantile(0.95);
            summary.p99_rtt_us = hist.value_at_quantile(0.99);
        }
        summary
    }
}

#[derive(Debug, Clone, Default)]
pub struct Summary {
    pub requests: usize,
    pub successes: usize,
    pub failures: usize,
    pub min_rtt_us: u64,
    pub mean_rtt_us: f64,
    pub max_rtt_us: u64,
    pub p50_rtt_us: u64,
    pub p95_rtt_us: u64,
    pub p99_rtt_us: u64,
    pub wall_time: Duration,
    pub failure_reasons: BTreeMap<String, usize>,
}

impl Summary {
    #[must_use]
    pub fn requests_per_sec(&self) -> f64 {
        let secs = self.wall_time.as_secs_f64();
        if secs > 0.0 {
            self.requests as f64 / secs
        } else {
            0.0
        }
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "\
Results:
    requests                       = {} (ok {}, failed {})
    predict_rtt us [min, mean, max] = [{}, {:.2}, {}]
    predict_rtt us [p50, p95, p99]  = [{}, {}, {}]
    throughput req/s               = {:.2} over {:.2}s",
            self.requests,
            self.successes,
            self.failures,
            self.min_rtt_us,
            self.mean_rtt_us,
            self.max_rtt_us,
            self.p50_rtt_us,
            self.p95_rtt_us,
            self.p99_rtt_us,
            self.requests_per_sec(),
            self.wall_time.as_secs_f64(),
        )?;
        if !self.failure_reasons.is_empty() {
            write!(f, "\nFailures:")?;
            for (reason, count) in &self.failure_reasons {
                write!(f, "\n    {count:>8}  {reason}")?;
            }
        }
        Ok(())
    }
}
