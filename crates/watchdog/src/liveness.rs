//! Heartbeat tracking for one sensor box.

use std::time::{Duration, Instant};

/// What gets published on the status topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    On,
    Off,
}

impl Status {
    pub fn payload(self) -> &'static str {
        match self {
            Status::On => "ON",
            Status::Off => "OFF",
        }
    }
}

/// Remembers when the box was last heard from.
#[derive(Debug, Clone)]
pub struct Liveness {
    last_seen: Option<Instant>,
    stale_after: Duration,
}

impl Liveness {
    pub fn new(stale_after: Duration) -> Self {
        Self {
            last_seen: None,
            stale_after,
        }
    }

    pub fn observe(&mut self, at: Instant) {
        self.last_seen = Some(at);
    }

    pub fn last_seen(&self) -> Option<Instant> {
        self.last_seen
    }

    /// `Off` until the first heartbeat, and again once the last one is
    /// more than `stale_after` old.
    pub fn status(&self, now: Instant) -> Status {
        match self.last_seen {
            Some(seen) if now.saturating_duration_since(seen) <= self.stale_after => Status::On,
            _ => Status::Off,
        }
    }
}

// ===========================================================================
// Tests
// ===========================================================================
