//! Absolute humidity for VOC-sensor compensation.

/// Convert relative humidity (%) at `temperature_c` into absolute humidity in
/// mg/m³, using the Magnus approximation from the SGP30 integration notes.
///
/// The temperature must keep `243.12 + T` and `273.15 + T` away from zero;
/// the climate sensors only report -40..85 °C so callers never get close.
pub fn compute_absolute_humidity(temperature_c: f32, relative_humidity_pct: f32) -> u32 {
    let t = temperature_c;
    let vapour = (relative_humidity_pct / 100.0) * 6.112 * ((17.62 * t) / (243.12 + t)).exp();
    let grams_per_m3 = 216.7 * (vapour / (273.15 + t));

    // `as` saturates: negative or NaN inputs land on 0.
    (1000.0 * grams_per_m3) as u32
}

// ===========================================================================
// Tests
// ===========================================================================
