//! Simulated sensors for running the firmware on a development host.
//!
//! Models realistic indoor-air behaviour:
//! - Temporal coherence via random walk with mean reversion
//! - Per-reading electronic noise
//! - Occasional spikes (someone cooking, a door opening)
//! - Diurnal temperature cycle counted in wake cycles
//! - Acquisition failures in the flaky scenario
//! - A VOC sensor whose baseline drifts and can be restored

use std::fmt;

use crate::error::{AcquisitionError, Source};
use crate::sensors::{
    AirValues, Barometer, BarometerReading, Baseline, ClimateReading, ClimateSensor,
    ParticulateReading, ParticulateSensor, SensorSuite, VocReading, VocSensor,
};

// ---------------------------------------------------------------------------
// Gaussian approximation (no extra dependency)
// ---------------------------------------------------------------------------

/// Approximate a sample from N(0,1) using the Irwin-Hall method:
/// sum of 12 uniform [0,1) values minus 6.
fn approx_std_normal() -> f64 {
    let mut sum: f64 = 0.0;
    for _ in 0..12 {
        sum += fastrand::f64();
    }
    sum - 6.0
}

/// Sample from N(mean, sigma).
fn gaussian(mean: f64, sigma: f64) -> f64 {
    mean + sigma * approx_std_normal()
}

// ---------------------------------------------------------------------------
// Scenario presets
// ---------------------------------------------------------------------------

/// Pre-configured simulation profiles selectable via `[sim] scenario`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scenario {
    /// Low particulates, rare spikes, every sensor answers.  The hourly
    /// index settles in the "very low" band.
    Clean,
    /// Particulates around the "high" band with frequent spikes.
    Polluted,
    /// Clean air but ~10% of acquisitions fail and drivers sometimes need
    /// a second init attempt.  Exercises the error channel.
    Flaky,
}

impl Scenario {
    pub fn from_str_lossy(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "polluted" => Self::Polluted,
            "flaky" => Self::Flaky,
            _ => Self::Clean, // default
        }
    }

    fn params(self) -> Params {
        match self {
            Scenario::Clean => Params {
                pm25_center: 8.0,
                pm_spike_prob: 0.02,
                failure_prob: 0.0,
            },
            Scenario::Polluted => Params {
                pm25_center: 70.0,
                pm_spike_prob: 0.10,
                failure_prob: 0.0,
            },
            Scenario::Flaky => Params {
                pm25_center: 8.0,
                pm_spike_prob: 0.02,
                failure_prob: 0.10,
            },
        }
    }
}

impl fmt::Display for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Clean => write!(f, "clean"),
            Self::Polluted => write!(f, "polluted"),
            Self::Flaky => write!(f, "flaky"),
        }
    }
}

struct Params {
    pm25_center: f64,
    pm_spike_prob: f32,
    failure_prob: f32,
}

/// Build a full sensor suite for `scenario`.
pub fn suite(scenario: Scenario) -> SensorSuite {
    let p = scenario.params();
    SensorSuite {
        particulate: Box::new(SimParticulate::new(&p)),
        climate: Box::new(SimClimate::new(p.failure_prob)),
        barometer: Box::new(SimBarometer::new(p.failure_prob)),
        voc: Box::new(SimVoc::new(p.failure_prob)),
    }
}

// ---------------------------------------------------------------------------
// Random walk
// ---------------------------------------------------------------------------

/// One slowly-varying physical quantity.
#[derive(Debug, Clone)]
struct Walk {
    value: f64,
    center: f64,
    sigma: f64,
    reversion: f64,
    min: f64,
    max: f64,
}

impl Walk {
    fn new(center: f64, sigma: f64, reversion: f64, min: f64, max: f64) -> Self {
        Self {
            value: (center + gaussian(0.0, sigma)).clamp(min, max),
            center,
            sigma,
            reversion,
            min,
            max,
        }
    }

    fn step(&mut self) -> f64 {
        let pull = self.reversion * (self.center - self.value);
        self.value = (self.value + pull + gaussian(0.0, self.sigma)).clamp(self.min, self.max);
        self.value
    }
}

/// Roll against `prob`; on a hit, fail with a timeout from `source`.
fn maybe_fail(source: Source, prob: f32) -> Result<(), AcquisitionError> {
    if fastrand::f32() < prob {
        return Err(AcquisitionError::Timeout(source, 5_000));
    }
    Ok(())
}

/// Wake cycles per simulated day (5-minute cycle).
const TICKS_PER_DAY: f64 = 288.0;

// ---------------------------------------------------------------------------
// Particulate
// ---------------------------------------------------------------------------

pub struct SimParticulate {
    pm25: Walk,
    /// Coarse fraction: PM10 minus PM2.5.
    coarse: Walk,
    spike_prob: f32,
    failure_prob: f32,
}

impl SimParticulate {
    fn new(p: &Params) -> Self {
        let c = p.pm25_center;
        Self {
            pm25: Walk::new(c, c * 0.08, 0.1, 0.0, 900.0),
            coarse: Walk::new(c * 0.5, c * 0.05, 0.1, 0.0, 900.0),
            spike_prob: p.pm_spike_prob,
            failure_prob: p.failure_prob,
        }
    }
}

impl ParticulateSensor for SimParticulate {
    fn init(&mut self) -> Result<(), AcquisitionError> {
        maybe_fail(Source::Particulate, self.failure_prob / 2.0)
    }

    fn acquire(&mut self) -> Result<ParticulateReading, AcquisitionError> {
        maybe_fail(Source::Particulate, self.failure_prob)?;

        let spike = if fastrand::f32() < self.spike_prob {
            gaussian(0.0, self.pm25.center * 2.0).abs()
        } else {
            0.0
        };
        let pm25 = (self.pm25.step() + spike + gaussian(0.0, 1.0)).max(0.0);
        let pm10 = pm25 + self.coarse.step();
        let pm1 = pm25 * 0.7;

        // Frames carry whole µg/m³.
        Ok(ParticulateReading {
            pm1_0: pm1.round() as u16,
            pm2_5: pm25.round() as u16,
            pm10: pm10.round() as u16,
        })
    }
}

// ---------------------------------------------------------------------------
// Climate and barometer
// ---------------------------------------------------------------------------

pub struct SimClimate {
    temperature: Walk,
    humidity: Walk,
    tick: u64,
    failure_prob: f32,
}

impl SimClimate {
    fn new(failure_prob: f32) -> Self {
        Self {
            temperature: Walk::new(21.0, 0.15, 0.05, -10.0, 45.0),
            humidity: Walk::new(45.0, 1.0, 0.05, 5.0, 95.0),
            tick: 0,
            failure_prob,
        }
    }
}

/// Temperature swing over the simulated day, peaking mid-afternoon.
fn diurnal(tick: u64, amplitude: f64) -> f64 {
    let phase = 2.0 * std::f64::consts::PI * (tick as f64) / TICKS_PER_DAY;
    amplitude * phase.sin()
}

impl ClimateSensor for SimClimate {
    fn init(&mut self) -> Result<(), AcquisitionError> {
        maybe_fail(Source::Climate, self.failure_prob / 2.0)
    }

    fn acquire(&mut self) -> Result<ClimateReading, AcquisitionError> {
        maybe_fail(Source::Climate, self.failure_prob)?;
        self.tick += 1;
        let t = self.temperature.step() + diurnal(self.tick, 2.0);
        Ok(ClimateReading {
            temperature_c: (t + gaussian(0.0, 0.05)) as f32,
            humidity_pct: self.humidity.step() as f32,
        })
    }
}

pub struct SimBarometer {
    pressure: Walk,
    temperature: Walk,
    tick: u64,
    failure_prob: f32,
}

impl SimBarometer {
    fn new(failure_prob: f32) -> Self {
        Self {
            pressure: Walk::new(101_325.0, 15.0, 0.02, 95_000.0, 106_000.0),
            // Reads a little warm: the chip sits next to the board's regulator.
            temperature: Walk::new(21.8, 0.15, 0.05, -10.0, 45.0),
            tick: 0,
            failure_prob,
        }
    }
}

impl Barometer for SimBarometer {
    fn init(&mut self) -> Result<(), AcquisitionError> {
        maybe_fail(Source::Barometer, self.failure_prob / 2.0)
    }

    fn acquire(&mut self) -> Result<BarometerReading, AcquisitionError> {
        maybe_fail(Source::Barometer, self.failure_prob)?;
        self.tick += 1;
        Ok(BarometerReading {
            pressure_pa: self.pressure.step().round() as i32,
            temperature_c: (self.temperature.step() + diurnal(self.tick, 2.0)) as f32,
        })
    }
}

// ---------------------------------------------------------------------------
// VOC
// ---------------------------------------------------------------------------

/// Factory baseline the sensor starts from when nothing is restored.
const FACTORY_BASELINE: Baseline = Baseline {
    eco2: 0x8973,
    tvoc: 0x8aae,
};

pub struct SimVoc {
    baseline: Baseline,
    compensation: Option<u32>,
    raw_h2: Walk,
    raw_ethanol: Walk,
    tvoc: Walk,
    failure_prob: f32,
}

impl SimVoc {
    fn new(failure_prob: f32) -> Self {
        Self {
            baseline: FACTORY_BASELINE,
            compensation: None,
            raw_h2: Walk::new(13_200.0, 8.0, 0.05, 0.0, 65_535.0),
            raw_ethanol: Walk::new(18_600.0, 12.0, 0.05, 0.0, 65_535.0),
            tvoc: Walk::new(20.0, 4.0, 0.1, 0.0, 60_000.0),
            failure_prob,
        }
    }

    /// Last humidity compensation written, in mg/m³.
    pub fn compensation(&self) -> Option<u32> {
        self.compensation
    }
}

impl VocSensor for SimVoc {
    fn init(&mut self) -> Result<(), AcquisitionError> {
        maybe_fail(Source::Voc, self.failure_prob / 2.0)
    }

    fn measure(&mut self) -> Result<VocReading, AcquisitionError> {
        maybe_fail(Source::Voc, self.failure_prob)?;

        // The algorithm nudges its baseline a little every measurement.
        self.baseline.eco2 = self.baseline.eco2.wrapping_add(fastrand::u16(0..3));
        self.baseline.tvoc = self.baseline.tvoc.wrapping_add(fastrand::u16(0..3));

        let tvoc = self.tvoc.step();
        let air = if fastrand::f32() < self.failure_prob {
            Err(AcquisitionError::BadFrame(Source::Voc, "crc mismatch".into()))
        } else {
            Ok(AirValues {
                tvoc_ppb: tvoc.round() as u16,
                // eCO2 tracks TVOC above the 400 ppm floor.
                eco2_ppm: (400.0 + tvoc * 2.0).round() as u16,
            })
        };

        Ok(VocReading {
            raw_h2: self.raw_h2.step().round() as u16,
            raw_ethanol: self.raw_ethanol.step().round() as u16,
            air,
        })
    }

    fn baseline(&mut self) -> Option<Baseline> {
        Some(self.baseline)
    }

    fn set_baseline(&mut self, baseline: Baseline) -> Result<(), AcquisitionError> {
        if !baseline.is_valid() {
            return Err(AcquisitionError::Driver(Source::Voc, "zero baseline".into()));
        }
        self.baseline = baseline;
        Ok(())
    }

    fn set_humidity_compensation(&mut self, mg_per_m3: u32) -> Result<(), AcquisitionError> {
        self.compensation = Some(mg_per_m3);
        Ok(())
    }
}

// ===========================================================================
// Tests
// ===========================================================================
