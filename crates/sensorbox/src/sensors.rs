//! Typed readings and the acquisition interfaces the controller drives.
//!
//! Drivers are synchronous and bounded by their own timeouts (a particulate
//! frame, for instance, is abandoned after a few seconds).  Wire protocols
//! live behind these traits; the controller only sees readings or errors.

use crate::error::AcquisitionError;

/// Particulate concentrations in µg/m³ (atmospheric environment).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ParticulateReading {
    pub pm1_0: u16,
    pub pm2_5: u16,
    pub pm10: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ClimateReading {
    pub temperature_c: f32,
    pub humidity_pct: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BarometerReading {
    pub pressure_pa: i32,
    pub temperature_c: f32,
}

/// Derived indoor-air values from the VOC sensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AirValues {
    pub tvoc_ppb: u16,
    pub eco2_ppm: u16,
}

#[derive(Debug)]
pub struct VocReading {
    pub raw_h2: u16,
    pub raw_ethanol: u16,
    /// The derived measurement can fail on its own after the raw one worked.
    pub air: Result<AirValues, AcquisitionError>,
}

/// VOC-sensor drift-compensation state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Baseline {
    pub eco2: u16,
    pub tvoc: u16,
}

impl Baseline {
    /// The sensor rejects an all-zero baseline.
    pub fn is_valid(&self) -> bool {
        self.eco2 != 0 || self.tvoc != 0
    }
}

pub trait ParticulateSensor {
    fn init(&mut self) -> Result<(), AcquisitionError>;
    fn acquire(&mut self) -> Result<ParticulateReading, AcquisitionError>;
}

/// Temperature / relative humidity sensor.
pub trait ClimateSensor {
    fn init(&mut self) -> Result<(), AcquisitionError>;
    fn acquire(&mut self) -> Result<ClimateReading, AcquisitionError>;
}

/// Pressure sensor with its own temperature channel.
pub trait Barometer {
    fn init(&mut self) -> Result<(), AcquisitionError>;
    fn acquire(&mut self) -> Result<BarometerReading, AcquisitionError>;
}

pub trait VocSensor {
    fn init(&mut self) -> Result<(), AcquisitionError>;
    fn measure(&mut self) -> Result<VocReading, AcquisitionError>;
    fn baseline(&mut self) -> Option<Baseline>;
    fn set_baseline(&mut self, baseline: Baseline) -> Result<(), AcquisitionError>;
    fn set_humidity_compensation(&mut self, mg_per_m3: u32) -> Result<(), AcquisitionError>;
}

/// Every sensor on the box.
pub struct SensorSuite {
    pub particulate: Box<dyn ParticulateSensor>,
    pub climate: Box<dyn ClimateSensor>,
    pub barometer: Box<dyn Barometer>,
    pub voc: Box<dyn VocSensor>,
}

/// One wake cycle's worth of readings.  Missing entries failed to acquire.
#[derive(Debug, Default)]
pub struct Sample {
    pub particulate: Option<ParticulateReading>,
    pub climate: Option<ClimateReading>,
    pub barometer: Option<BarometerReading>,
    pub voc: Option<VocReading>,
}

impl Sample {
    /// Temperature averaged over both sources when both answered.
    pub fn temperature_c(&self) -> Option<f32> {
        match (self.climate, self.barometer) {
            (Some(c), Some(b)) => Some((c.temperature_c + b.temperature_c) / 2.0),
            (Some(c), None) => Some(c.temperature_c),
            (None, Some(b)) => Some(b.temperature_c),
            (None, None) => None,
        }
    }

    /// Merged temperature plus relative humidity, for humidity compensation.
    pub fn climate_merged(&self) -> Option<ClimateReading> {
        let humidity_pct = self.climate?.humidity_pct;
        Some(ClimateReading {
            temperature_c: self.temperature_c()?,
            humidity_pct,
        })
    }

    /// Pressure rounded down to a multiple of 10 Pa.
    pub fn pressure_pa(&self) -> Option<i32> {
        self.barometer.map(|b| b.pressure_pa - b.pressure_pa % 10)
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn climate(t: f32, rh: f32) -> ClimateReading {
        ClimateReading {
            temperature_c: t,
            humidity_pct: rh,
        }
    }

    fn baro(p: i32, t: f32) -> BarometerReading {
        BarometerReading {
            pressure_pa: p,
            temperature_c: t,
        }
    }

    #[test]
    fn temperature_averages_two_sources() {
        let s = Sample {
            climate: Some(climate(20.0, 50.0)),
            barometer: Some(baro(101_325, 22.0)),
            ..Sample::default()
        };
        assert_eq!(s.temperature_c(), Some(21.0));
    }

    #[test]
    fn temperature_falls_back_to_single_source() {
        let s = Sample {
            barometer: Some(baro(101_325, 22.0)),
            ..Sample::default()
        };
        assert_eq!(s.temperature_c(), Some(22.0));
        assert_eq!(s.climate_merged(), None);

        let s = Sample {
            climate: Some(climate(19.5, 40.0)),
            ..Sample::default()
        };
        assert_eq!(s.climate_merged(), Some(climate(19.5, 40.0)));
    }

    #[test]
    fn merged_climate_uses_averaged_temperature() {
        let s = Sample {
            climate: Some(climate(20.0, 55.0)),
            barometer: Some(baro(100_000, 24.0)),
            ..Sample::default()
        };
        assert_eq!(s.climate_merged(), Some(climate(22.0, 55.0)));
    }

    #[test]
    fn pressure_rounds_down_to_ten() {
        let s = Sample {
            barometer: Some(baro(101_327, 20.0)),
            ..Sample::default()
        };
        assert_eq!(s.pressure_pa(), Some(101_320));
        assert_eq!(Sample::default().pressure_pa(), None);
    }

    #[test]
    fn zero_baseline_is_invalid() {
        assert!(!Baseline { eco2: 0, tvoc: 0 }.is_valid());
        assert!(Baseline { eco2: 0, tvoc: 7 }.is_valid());
    }
}
