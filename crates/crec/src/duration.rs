//! Human-duration parsing for `window:`, `slide:`, `for:` and `interval:`
//! values.
//!
//! Accepts the units `ns`, `us` (or `µs`), `ms`, `s`, `m`, `h`, in compound
//! (`1m30s`) and fractional (`1.5s`) forms. A bare `0` is allowed; any other
//! bare number, empty string, or unknown unit is rejected.

use std::time::Duration;

/// Parse a duration string. Returns `None` on any malformed input; callers
/// wrap the failure with position information.
pub fn parse(s: &str) -> Option<Duration> {
    if s.is_empty() {
        return None;
    }
    if s == "0" {
        return Some(Duration::ZERO);
    }

    let mut total_nanos: f64 = 0.0;
    let mut rest = s;

    while !rest.is_empty() {
        let digits_end = rest
            .find(|c: char| !c.is_ascii_digit() && c != '.')
            .unwrap_or(rest.len());
        let (num, after) = rest.split_at(digits_end);
        if num.is_empty() {
            return None;
        }
        let value: f64 = num.parse().ok()?;

        let (unit_nanos, unit_len) = match_unit(after)?;
        total_nanos += value * unit_nanos;
        rest = &after[unit_len..];
    }

    if !total_nanos.is_finite() || total_nanos < 0.0 {
        return None;
    }
    Some(Duration::from_nanos(total_nanos as u64))
}

/// Longest-match the unit at the head of `rest`, returning its length in
/// nanoseconds and its byte length.
fn match_unit(rest: &str) -> Option<(f64, usize)> {
    const NANOS_PER_MS: f64 = 1_000_000.0;
    const NANOS_PER_SEC: f64 = 1_000_000_000.0;

    if rest.starts_with("ns") {
        Some((1.0, 2))
    } else if rest.starts_with("us") {
        Some((1_000.0, 2))
    } else if rest.starts_with("µs") {
        Some((1_000.0, "µs".len()))
    } else if rest.starts_with("ms") {
        Some((NANOS_PER_MS, 2))
    } else if rest.starts_with('s') {
        Some((NANOS_PER_SEC, 1))
    } else if rest.starts_with('m') {
        Some((60.0 * NANOS_PER_SEC, 1))
    } else if rest.starts_with('h') {
        Some((3600.0 * NANOS_PER_SEC, 1))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_units() {
        assert_eq!(parse("30s"), Some(Duration::from_secs(30)));
        assert_eq!(parse("1m"), Some(Duration::from_secs(60)));
        assert_eq!(parse("2h"), Some(Duration::from_secs(7200)));
        assert_eq!(parse("250ms"), Some(Duration::from_millis(250)));
        assert_eq!(parse("10us"), Some(Duration::from_micros(10)));
        assert_eq!(parse("7ns"), Some(Duration::from_nanos(7)));
    }

    #[test]
    fn test_parse_compound() {
        assert_eq!(parse("1m30s"), Some(Duration::from_secs(90)));
        assert_eq!(parse("1h30m10s"), Some(Duration::from_secs(5410)));
    }

    #[test]
    fn test_parse_fractional() {
        assert_eq!(parse("1.5s"), Some(Duration::from_millis(1500)));
        assert_eq!(parse("0.5m"), Some(Duration::from_secs(30)));
    }

    #[test]
    fn test_parse_zero() {
        assert_eq!(parse("0"), Some(Duration::ZERO));
        assert_eq!(parse("0s"), Some(Duration::ZERO));
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert_eq!(parse(""), None);
        assert_eq!(parse("10"), None); // missing unit
        assert_eq!(parse("s"), None); // missing count
        assert_eq!(parse("10x"), None); // unknown unit
        assert_eq!(parse("10d"), None); // days not accepted
        assert_eq!(parse("ten seconds"), None);
    }
}
