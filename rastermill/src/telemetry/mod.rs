//! Run telemetry.
//!
//! [`RunMetrics`] collects lock-free counters from the worker pool;
//! [`MetricsSnapshot`] is a point-in-time copy for display. [`init_tracing`]
//! installs the process-wide subscriber used by the CLI.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Lock-free counters updated by workers while a run is in flight.
#[derive(Debug, Default)]
pub struct RunMetrics {
    items_claimed: AtomicU64,
    items_succeeded: AtomicU64,
    items_failed: AtomicU64,
    transform_nanos: AtomicU64,
}

impl RunMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records that a worker claimed an item from the queue.
    pub fn item_claimed(&self) {
        self.items_claimed.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a successful transform and its duration.
    pub fn item_succeeded(&self, elapsed: Duration) {
        self.items_succeeded.fetch_add(1, Ordering::Relaxed);
        self.transform_nanos
            .fetch_add(elapsed.as_nanos() as u64, Ordering::Relaxed);
    }

    /// Records a failed transform and its duration.
    pub fn item_failed(&self, elapsed: Duration) {
        self.items_failed.fetch_add(1, Ordering::Relaxed);
        self.transform_nanos
            .fetch_add(elapsed.as_nanos() as u64, Ordering::Relaxed);
    }

    /// Takes a point-in-time copy of the counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            items_claimed: self.items_claimed.load(Ordering::Relaxed),
            items_succeeded: self.items_succeeded.load(Ordering::Relaxed),
            items_failed: self.items_failed.load(Ordering::Relaxed),
            transform_time: Duration::from_nanos(self.transform_nanos.load(Ordering::Relaxed)),
        }
    }
}

/// Point-in-time view of [`RunMetrics`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MetricsSnapshot {
    pub items_claimed: u64,
    pub items_succeeded: u64,
    pub items_failed: u64,
    /// Total time spent inside the transform, summed across workers.
    pub transform_time: Duration,
}

impl fmt::Display for MetricsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} claimed, {} succeeded, {} failed, {:.2}s transform time",
            self.items_claimed,
            self.items_succeeded,
            self.items_failed,
            self.transform_time.as_secs_f64()
        )
    }
}

/// Installs the global tracing subscriber.
///
/// `RUST_LOG` overrides `default_filter`. Safe to call more than once; later
/// calls are no-ops.
pub fn init_tracing(default_filter: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_accumulate() {
        let metrics = RunMetrics::new();
        metrics.item_claimed();
        metrics.item_claimed();
        metrics.item_claimed();
        metrics.item_succeeded(Duration::from_millis(100));
        metrics.item_succeeded(Duration::from_millis(50));
        metrics.item_failed(Duration::from_millis(25));

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.items_claimed, 3);
        assert_eq!(snapshot.items_succeeded, 2);
        assert_eq!(snapshot.items_failed, 1);
        assert_eq!(snapshot.transform_time, Duration::from_millis(175));
    }

    #[test]
    fn test_snapshot_is_a_copy() {
        let metrics = RunMetrics::new();
        metrics.item_claimed();
        let before = metrics.snapshot();
        metrics.item_claimed();
        assert_eq!(before.items_claimed, 1);
        assert_eq!(metrics.snapshot().items_claimed, 2);
    }

    #[test]
    fn test_display_summary() {
        let metrics = RunMetrics::new();
        metrics.item_claimed();
        metrics.item_failed(Duration::from_millis(10));
        let text = metrics.snapshot().to_string();
        assert!(text.contains("1 claimed"));
        assert!(text.contains("1 failed"));
    }
}
