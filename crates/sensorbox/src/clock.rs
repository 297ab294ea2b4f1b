//! Wrapping millisecond clock.
//!
//! There is no real-time clock on the box.  Time is a `u32` count of
//! milliseconds since boot that wraps after ~49.7 days, so every comparison
//! goes through wrapping subtraction rather than `<`/`>` on raw values.

use std::time::Instant;

/// Milliseconds since boot, wrapping at `u32::MAX`.
pub type Millis = u32;

/// Deadlines further than this in the "past" are read as still in the future.
/// Half the counter range, as with any serial-number comparison.
const DUE_WINDOW: Millis = Millis::MAX / 2;

/// Source of the current wrapping clock value.
pub trait Clock {
    fn now_ms(&self) -> Millis;
}

/// Elapsed milliseconds from `since` to `now`, correct across one wrap.
pub fn elapsed(now: Millis, since: Millis) -> Millis {
    now.wrapping_sub(since)
}

/// Whether `deadline` has been reached at `now`.
///
/// A deadline is due iff the wrapping distance from it to `now` is less than
/// half the counter range.  A deadline missed by more than that reads as not
/// yet due until the counter comes round again.
pub fn is_due(now: Millis, deadline: Millis) -> bool {
    elapsed(now, deadline) < DUE_WINDOW
}

/// Clock counting from process start, truncated to 32 bits.
#[derive(Debug, Clone, Copy)]
pub struct BootClock {
    boot: Instant,
}

impl BootClock {
    pub fn new() -> Self {
        Self {
            boot: Instant::now(),
        }
    }
}

impl Default for BootClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for BootClock {
    fn now_ms(&self) -> Millis {
        // Truncation is the wrap.
        self.boot.elapsed().as_millis() as Millis
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const HOUR: Millis = 3_600_000;

    #[test]
    fn elapsed_without_wrap() {
        assert_eq!(elapsed(5_000, 2_000), 3_000);
    }

    #[test]
    fn elapsed_across_wrap() {
        let since = Millis::MAX - 999;
        assert_eq!(elapsed(500, since), 1_500);
    }

    #[test]
    fn deadline_at_now_is_due() {
        assert!(is_due(0, 0));
        assert!(is_due(HOUR, HOUR));
    }

    #[test]
    fn future_deadline_is_not_due() {
        assert!(!is_due(HOUR - 1, HOUR));
        assert!(!is_due(0, 12 * HOUR));
    }

    #[test]
    fn deadline_past_wrap_is_not_due_before_wrap() {
        // Deadline set 1h before the wrap lands just after it.
        let now = Millis::MAX - 1_000;
        let deadline = now.wrapping_add(HOUR);
        assert!(deadline < now);
        assert!(!is_due(now, deadline));
        assert!(is_due(deadline.wrapping_add(1), deadline));
    }

    #[test]
    fn long_missed_deadline_reads_as_future() {
        let deadline = 1_000;
        assert!(!is_due(deadline + DUE_WINDOW, deadline));
        assert!(is_due(deadline + DUE_WINDOW - 1, deadline));
    }

    #[test]
    fn boot_clock_starts_near_zero() {
        let clock = BootClock::new();
        assert!(clock.now_ms() < 1_000);
    }
}
