//! Pure normalizers shared by the feature builders.

/// Convert an ISO8601 clock string like "PT11M32.00S" to total seconds.
///
/// The stats provider uses this format for time remaining in the period.
/// Anything that does not carry the `PT...M...S` markers maps to 0: real
/// feeds contain malformed or empty clock fields and we deliberately absorb
/// them instead of failing the whole build. Lenient by policy, not an error.
pub fn clock_to_seconds(clock: &str) -> i64 {
    let Some(rest) = clock.strip_prefix("PT") else {
        return 0;
    };
    let Some((minutes, seconds)) = rest.split_once('M') else {
        return 0;
    };
    let minutes: i64 = match minutes.parse() {
        Ok(m) => m,
        Err(_) => return 0,
    };
    let seconds: f64 = match seconds.trim_end_matches('S').parse() {
        Ok(s) => s,
        Err(_) => return 0,
    };
    minutes * 60 + seconds as i64
}

/// Coarse shot-location bucket from distance in feet. Boundaries are inclusive
/// on the lower bucket, so a 24-footer is still a corner three.
pub fn shot_bucket(distance_ft: Option<f64>) -> &'static str {
    let Some(d) = distance_ft else {
        return "no_shot";
    };
    if d <= 3.0 {
        "restricted_area"
    } else if d <= 14.0 {
        "paint"
    } else if d <= 18.0 {
        "midrange"
    } else if d <= 24.0 {
        "corner_three"
    } else {
        "non_corner_three"
    }
}
