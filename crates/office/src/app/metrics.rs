use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use office_engine::DebugInfoSnapshot;
use tracing::warn;

static SIM_METRICS_POISON_WARNED: AtomicBool = AtomicBool::new(false);

fn warn_poison_once(operation: &'static str) {
    if SIM_METRICS_POISON_WARNED
        .compare_exchange(false, true, Ordering::Relaxed, Ordering::Relaxed)
        .is_ok()
    {
        warn!(operation, "sim metrics lock poisoned; recovered inner value");
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub(crate) struct SimMetricsSnapshot {
    pub(crate) tps: f32,
    pub(crate) tick_time_ms: f32,
    pub(crate) moving_avatars: usize,
    /// Searches started during the interval.
    pub(crate) path_searches: u64,
    pub(crate) path_failures: u64,
}

/// Latest interval metrics, readable from any thread.
#[derive(Clone, Debug, Default)]
pub(crate) struct MetricsHandle {
    snapshot: Arc<RwLock<SimMetricsSnapshot>>,
}

impl MetricsHandle {
    pub(crate) fn snapshot(&self) -> SimMetricsSnapshot {
        match self.snapshot.read() {
            Ok(guard) => *guard,
            Err(poisoned) => {
                warn_poison_once("read");
                *poisoned.into_inner()
            }
        }
    }

    pub(crate) fn publish(&self, snapshot: SimMetricsSnapshot) {
        match self.snapshot.write() {
            Ok(mut guard) => *guard = snapshot,
            Err(poisoned) => {
                warn_poison_once("write");
                *poisoned.into_inner() = snapshot;
            }
        }
    }
}

#[derive(Debug)]
pub(crate) struct MetricsAccumulator {
    interval_start: Instant,
    interval: Duration,
    ticks: u32,
    tick_time_sum: Duration,
    searches_at_start: u64,
    failures_at_start: u64,
}

impl MetricsAccumulator {
    pub(crate) fn new(interval: Duration, now: Instant) -> Self {
        Self {
            interval_start: now,
            interval,
            ticks: 0,
            tick_time_sum: Duration::ZERO,
            searches_at_start: 0,
            failures_at_start: 0,
        }
    }

    pub(crate) fn record_tick(&mut self, tick_time: Duration) {
        self.ticks = self.ticks.saturating_add(1);
        self.tick_time_sum = self.tick_time_sum.saturating_add(tick_time);
    }

    pub(crate) fn maybe_snapshot(
        &mut self,
        now: Instant,
        debug: &DebugInfoSnapshot,
    ) -> Option<SimMetricsSnapshot> {
        let elapsed = now.saturating_duration_since(self.interval_start);
        if elapsed < self.interval {
            return None;
        }

        let elapsed_seconds = elapsed.as_secs_f32().max(f32::EPSILON);
        let tick_time_ms = if self.ticks == 0 {
            0.0
        } else {
            (self.tick_time_sum.as_secs_f32() / self.ticks as f32) * 1000.0
        };

        let snapshot = SimMetricsSnapshot {
            tps: self.ticks as f32 / elapsed_seconds,
            tick_time_ms,
            moving_avatars: debug.moving_count,
            path_searches: debug.path_searches.saturating_sub(self.searches_at_start),
            path_failures: debug.path_failures.saturating_sub(self.failures_at_start),
        };

        self.interval_start = now;
        self.ticks = 0;
        self.tick_time_sum = Duration::ZERO;
        self.searches_at_start = debug.path_searches;
        self.failures_at_start = debug.path_failures;

        Some(snapshot)
    }
}
