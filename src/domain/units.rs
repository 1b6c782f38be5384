//! Height Unit Conversion
//!
//! The desk reports and accepts positions as unsigned offsets above its
//! lowest point, in units of 0.1 mm. Speed is a signed value in the same
//! fixed-point scale per second.

/// Lowest reachable height in meters
pub const MIN_HEIGHT_M: f64 = 0.62;
/// Highest reachable height in meters
pub const MAX_HEIGHT_M: f64 = 1.27;

/// Lowest reachable height in millimeters
pub const MIN_HEIGHT_MM: f64 = MIN_HEIGHT_M * 1000.0;
/// Highest reachable height in millimeters
pub const MAX_HEIGHT_MM: f64 = MAX_HEIGHT_M * 1000.0;

/// Distance covered by a single manual step (1 cm)
pub const HEIGHT_STEP_MM: f64 = 10.0;

/// Raw units per meter
const RAW_PER_METER: f64 = 10_000.0;

/// Convert a raw position to meters
pub fn raw_to_meters(raw: u16) -> f64 {
    f64::from(raw) / RAW_PER_METER + MIN_HEIGHT_M
}

/// Convert meters to a raw position, rounding to the nearest 0.1 mm.
///
/// Values below the desk's range saturate at 0.
pub fn meters_to_raw(meters: f64) -> u16 {
    ((meters - MIN_HEIGHT_M) * RAW_PER_METER)
        .round()
        .clamp(0.0, f64::from(u16::MAX)) as u16
}

/// Convert a raw speed to meters per second
pub fn raw_speed_to_mps(raw: i16) -> f64 {
    f64::from(raw) / RAW_PER_METER
}

/// Whether a height in meters lies inside the desk's range
pub fn in_range(meters: f64) -> bool {
    (MIN_HEIGHT_M..=MAX_HEIGHT_M).contains(&meters)
}

/// Clamp a height in millimeters to the desk's range
pub fn clamp_mm(mm: f64) -> f64 {
    mm.clamp(MIN_HEIGHT_MM, MAX_HEIGHT_MM)
}
