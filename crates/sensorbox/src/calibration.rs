//! VOC calibration timing: baseline persistence and humidity compensation.
//!
//! Two independent timers run off the wrapping boot clock.  Each is a
//! one-shot deadline that becomes periodic once it has fired; a deadline is
//! only recomputed when its timer fires.

use tracing::{debug, info, warn};

use crate::clock::{is_due, Millis};
use crate::error::{AcquisitionError, PersistenceError};
use crate::humidity::compute_absolute_humidity;
use crate::sensors::{Baseline, ClimateReading, VocSensor};
use crate::storage::BaselineStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CalibrationTiming {
    /// Delay before the first baseline save; the sensor needs this long
    /// before its baseline is worth keeping.
    pub baseline_warmup_ms: Millis,
    pub baseline_period_ms: Millis,
    pub humidity_period_ms: Millis,
}

impl Default for CalibrationTiming {
    fn default() -> Self {
        Self {
            baseline_warmup_ms: 12 * 3_600_000,
            baseline_period_ms: 3_600_000,
            humidity_period_ms: 6 * 3_600_000,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeriodicTimer {
    deadline: Millis,
    period: Millis,
}

impl PeriodicTimer {
    pub fn new(first_deadline: Millis, period: Millis) -> Self {
        Self {
            deadline: first_deadline,
            period,
        }
    }

    pub fn deadline(&self) -> Millis {
        self.deadline
    }

    pub fn due(&self, now: Millis) -> bool {
        is_due(now, self.deadline)
    }

    pub fn rearm(&mut self, now: Millis) {
        self.deadline = now.wrapping_add(self.period);
    }
}

#[derive(Debug)]
pub enum BaselineOutcome {
    NotDue,
    Saved(Baseline),
    /// The sensor had no baseline to give (or an all-zero one).
    Unavailable,
    Failed(PersistenceError),
}

#[derive(Debug)]
pub enum HumidityOutcome {
    NotDue,
    /// Compensation applied, in mg/m³.
    Applied(u32),
    /// No temperature/humidity this cycle; left due for the next one.
    NoSample,
    Failed(AcquisitionError),
}

#[derive(Debug, Clone)]
pub struct CalibrationScheduler {
    baseline: PeriodicTimer,
    humidity: PeriodicTimer,
}

impl CalibrationScheduler {
    pub fn new(boot: Millis, timing: CalibrationTiming) -> Self {
        Self {
            baseline: PeriodicTimer::new(
                boot.wrapping_add(timing.baseline_warmup_ms),
                timing.baseline_period_ms,
            ),
            humidity: PeriodicTimer::new(boot, timing.humidity_period_ms),
        }
    }

    pub fn baseline_timer(&self) -> PeriodicTimer {
        self.baseline
    }

    pub fn humidity_timer(&self) -> PeriodicTimer {
        self.humidity
    }

    /// Save the sensor's current baseline if the persistence timer is due.
    ///
    /// The timer rearms whenever it fires, whatever the outcome; a failed
    /// save waits for the next scheduled one.
    pub fn persist_baseline(
        &mut self,
        now: Millis,
        voc: &mut dyn VocSensor,
        store: &mut dyn BaselineStore,
    ) -> BaselineOutcome {
        if !self.baseline.due(now) {
            return BaselineOutcome::NotDue;
        }
        self.baseline.rearm(now);

        let Some(baseline) = voc.baseline().filter(Baseline::is_valid) else {
            debug!("voc sensor has no baseline to persist");
            return BaselineOutcome::Unavailable;
        };

        match store.save_baseline(baseline) {
            Ok(()) => {
                info!(eco2 = baseline.eco2, tvoc = baseline.tvoc, "baseline persisted");
                BaselineOutcome::Saved(baseline)
            }
            Err(e) => {
                warn!("baseline persist failed: {e}");
                BaselineOutcome::Failed(e)
            }
        }
    }

    /// Push absolute humidity to the VOC sensor if the refresh timer is due.
    pub fn refresh_humidity(
        &mut self,
        now: Millis,
        climate: Option<ClimateReading>,
        voc: &mut dyn VocSensor,
    ) -> HumidityOutcome {
        if !self.humidity.due(now) {
            return HumidityOutcome::NotDue;
        }
        let Some(c) = climate else {
            return HumidityOutcome::NoSample;
        };
        self.humidity.rearm(now);

        let mg_per_m3 = compute_absolute_humidity(c.temperature_c, c.humidity_pct);
        match voc.set_humidity_compensation(mg_per_m3) {
            Ok(()) => {
                debug!(mg_per_m3, "humidity compensation refreshed");
                HumidityOutcome::Applied(mg_per_m3)
            }
            Err(e) => HumidityOutcome::Failed(e),
        }
    }
}

// ===========================================================================
// Tests
// ===========================================================================
