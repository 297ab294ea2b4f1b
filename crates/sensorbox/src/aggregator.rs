//! Hourly particulate window feeding the air-quality index.
//!
//! Samples accumulate once per wake cycle; when the window has run its
//! course the averages are turned into one index and the window restarts at
//! the flushing sample's timestamp.

use tracing::debug;

use crate::caqi::compute_index;
use crate::clock::{elapsed, Millis};

/// Default window length: one hour.
pub const DEFAULT_WINDOW_MS: Millis = 3_600_000;

/// Running sums for the current window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WindowState {
    pub sample_count: u32,
    pub pm25_sum: u32,
    pub pm10_sum: u32,
    pub window_start: Millis,
}

/// Result of a window flush.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Flush {
    pub index: i32,
    pub pm25_avg: u32,
    pub pm10_avg: u32,
    pub samples: u32,
}

#[derive(Debug, Clone)]
pub struct WindowedAggregator {
    window_ms: Millis,
    state: WindowState,
}

impl WindowedAggregator {
    /// Start an empty window at `now`.
    pub fn new(now: Millis, window_ms: Millis) -> Self {
        Self {
            window_ms,
            state: WindowState {
                window_start: now,
                ..WindowState::default()
            },
        }
    }

    pub fn state(&self) -> WindowState {
        self.state
    }

    /// Add one sample and flush if the window is over.
    ///
    /// The window counts as over when a full `window_ms` has elapsed, or when
    /// `now` is not after the window start.  The latter is how a clock wrap
    /// shows up; it also flushes a sample taken at the very instant the
    /// window opened.  Either way the index covers whatever was collected.
    pub fn ingest(&mut self, pm25: u32, pm10: u32, now: Millis) -> Option<Flush> {
        let s = &mut self.state;
        s.sample_count += 1;
        s.pm25_sum = s.pm25_sum.saturating_add(pm25);
        s.pm10_sum = s.pm10_sum.saturating_add(pm10);

        let span = elapsed(now, s.window_start);
        if now > s.window_start && span < self.window_ms {
            return None;
        }

        // sample_count >= 1: we just added one.
        let pm25_avg = s.pm25_sum / s.sample_count;
        let pm10_avg = s.pm10_sum / s.sample_count;
        let flush = Flush {
            index: compute_index(pm25_avg, pm10_avg),
            pm25_avg,
            pm10_avg,
            samples: s.sample_count,
        };
        debug!(
            samples = flush.samples,
            span_ms = span,
            index = flush.index,
            "particulate window flushed"
        );

        *s = WindowState {
            window_start: now,
            ..WindowState::default()
        };
        Some(flush)
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const FIVE_MIN: Millis = 300_000;

    #[test]
    fn no_flush_inside_window() {
        let mut agg = WindowedAggregator::new(0, DEFAULT_WINDOW_MS);
        for k in 1..12 {
            assert_eq!(agg.ingest(10, 10, k * FIVE_MIN), None, "cycle {k}");
        }
        assert_eq!(agg.state().sample_count, 11);
        assert_eq!(agg.state().pm25_sum, 110);
    }

    #[test]
    fn flushes_average_after_window() {
        let mut agg = WindowedAggregator::new(1_000, DEFAULT_WINDOW_MS);
        agg.ingest(20, 40, 1_000 + FIVE_MIN);
        agg.ingest(21, 41, 1_000 + 2 * FIVE_MIN);
        let flush = agg.ingest(25, 45, 1_000 + DEFAULT_WINDOW_MS).unwrap();

        // 66 / 3 = 22, 126 / 3 = 42
        assert_eq!(flush.pm25_avg, 22);
        assert_eq!(flush.pm10_avg, 42);
        assert_eq!(flush.samples, 3);
        assert_eq!(flush.index, compute_index(22, 42));
    }

    #[test]
    fn flush_resets_window() {
        let mut agg = WindowedAggregator::new(0, DEFAULT_WINDOW_MS);
        agg.ingest(10, 10, FIVE_MIN);
        let now = DEFAULT_WINDOW_MS + 5;
        assert!(agg.ingest(10, 10, now).is_some());

        let s = agg.state();
        assert_eq!(s.sample_count, 0);
        assert_eq!(s.pm25_sum, 0);
        assert_eq!(s.pm10_sum, 0);
        assert_eq!(s.window_start, now);

        // The next window runs a full period from the flush.
        assert_eq!(agg.ingest(10, 10, now + FIVE_MIN), None);
    }

    #[test]
    fn averages_truncate() {
        let mut agg = WindowedAggregator::new(0, DEFAULT_WINDOW_MS);
        agg.ingest(10, 0, 1);
        let flush = agg.ingest(11, 1, DEFAULT_WINDOW_MS).unwrap();
        assert_eq!(flush.pm25_avg, 10);
        assert_eq!(flush.pm10_avg, 0);
    }

    #[test]
    fn clock_wrap_flushes_partial_window() {
        let start = Millis::MAX - FIVE_MIN;
        let mut agg = WindowedAggregator::new(start, DEFAULT_WINDOW_MS);
        assert_eq!(agg.ingest(30, 30, start + 1_000), None);

        // Only ~10 minutes have passed, but the counter wrapped.
        let flush = agg.ingest(30, 30, FIVE_MIN).unwrap();
        assert_eq!(flush.samples, 2);
        assert_eq!(flush.index, compute_index(30, 30));
        assert_eq!(agg.state().window_start, FIVE_MIN);
    }

    #[test]
    fn sample_at_window_start_flushes() {
        let mut agg = WindowedAggregator::new(0, DEFAULT_WINDOW_MS);
        let flush = agg.ingest(15, 15, 0).unwrap();
        assert_eq!(flush.samples, 1);
        assert_eq!(flush.index, 25);
    }

    #[test]
    fn custom_window_length() {
        let mut agg = WindowedAggregator::new(0, 10_000);
        assert_eq!(agg.ingest(1, 1, 9_999), None);
        assert!(agg.ingest(1, 1, 10_000).is_some());
    }
}
