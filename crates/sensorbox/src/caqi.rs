//! Common Air Quality Index (CAQI) from particulate concentrations.
//!
//! Each pollutant is mapped through its own piecewise-linear band table onto
//! the shared 0–100 index scale; the final index is the worse of the two.

/// Index value reported for anything above the last band.
pub const CAQI_MAX: i32 = 100;

/// One band of a pollutant table.
///
/// `gate` is the raw concentration up to which this band applies.  The
/// interpolation range (`input`) is kept separate from the gate because the
/// PM10 table interpolates over wider ranges than it gates on.
#[derive(Debug, Clone, Copy)]
struct Band {
    gate: u32,
    input: (i64, i64),
    output: (i64, i64),
}

const fn band(gate: u32, input: (i64, i64), output: (i64, i64)) -> Band {
    Band {
        gate,
        input,
        output,
    }
}

const PM25_BANDS: [Band; 4] = [
    band(15, (0, 15), (0, 25)),
    band(30, (16, 30), (26, 50)),
    band(55, (31, 55), (51, 75)),
    band(110, (56, 110), (76, 100)),
];

const PM10_BANDS: [Band; 4] = [
    band(15, (0, 25), (0, 25)),
    band(30, (26, 50), (26, 50)),
    band(55, (51, 90), (51, 75)),
    band(110, (91, 180), (76, 100)),
];

/// Integer linear re-mapping, truncating toward zero.
fn map_range(x: i64, input: (i64, i64), output: (i64, i64)) -> i64 {
    (x - input.0) * (output.1 - output.0) / (input.1 - input.0) + output.0
}

fn sub_index(bands: &[Band], concentration: u32) -> i32 {
    bands
        .iter()
        .find(|b| concentration <= b.gate)
        .map(|b| map_range(i64::from(concentration), b.input, b.output) as i32)
        .unwrap_or(CAQI_MAX)
}

/// PM2.5 sub-index.
pub fn pm25_index(pm25: u32) -> i32 {
    sub_index(&PM25_BANDS, pm25)
}

/// PM10 sub-index.
pub fn pm10_index(pm10: u32) -> i32 {
    sub_index(&PM10_BANDS, pm10)
}

/// Air-quality index for averaged PM2.5 / PM10 concentrations (µg/m³).
pub fn compute_index(pm25_avg: u32, pm10_avg: u32) -> i32 {
    pm25_index(pm25_avg).max(pm10_index(pm10_avg))
}

// ===========================================================================
// Tests
// ===========================================================================
