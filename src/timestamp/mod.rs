//! Clock-string codec for transcript offsets (`H:MM:SS.fff` <-> seconds)

const MILLIS_PER_HOUR: u64 = 3_600_000;
const MILLIS_PER_MINUTE: u64 = 60_000;

/// Decode a clock string into fractional seconds, rounded to the millisecond.
///
/// Malformed input is not rejected: any missing or unparsable component
/// turns the result into `NaN`, which then flows through `encode`.
pub fn decode(clock: &str) -> f64 {
    let mut parts = clock.split(':');
    let hours = parts.next().map(parse_whole).unwrap_or(f64::NAN);
    let minutes = parts.next().map(parse_whole).unwrap_or(f64::NAN);
    let seconds = parts
        .next()
        .and_then(|s| s.trim().parse::<f64>().ok())
        .unwrap_or(f64::NAN);

    let total = hours * 3600.0 + minutes * 60.0 + seconds;
    (total * 1000.0).round() / 1000.0
}

/// Encode seconds as a zero-padded `HH:MM:SS.mmm` clock string.
pub fn encode(seconds: f64) -> String {
    if !seconds.is_finite() {
        return "NaN:NaN:NaN.NaN".to_string();
    }

    let total_ms = (seconds.max(0.0) * 1000.0).round() as u64;
    let hours = total_ms / MILLIS_PER_HOUR;
    let minutes = (total_ms % MILLIS_PER_HOUR) / MILLIS_PER_MINUTE;
    let secs = (total_ms % MILLIS_PER_MINUTE) / 1000;
    let millis = total_ms % 1000;

    format!("{:02}:{:02}:{:02}.{:03}", hours, minutes, secs, millis)
}

/// Re-encode an upstream offset into the canonical clock form.
pub fn normalize(clock: &str) -> String {
    encode(decode(clock))
}

// Hours and minutes are integral; a stray fraction is dropped.
fn parse_whole(part: &str) -> f64 {
    let part = part.trim();
    let digits = part.split('.').next().unwrap_or(part);
    digits.parse::<u64>().map(|v| v as f64).unwrap_or(f64::NAN)
}
