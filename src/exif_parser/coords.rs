//! Pure coordinate math shared by every GPS resolver.

use crate::error::CoordinateError;

pub fn rational_to_float(numerator: i64, denominator: i64) -> Result<f64, CoordinateError> {
    if denominator == 0 {
        return Err(CoordinateError::ZeroDenominator(numerator));
    }
    Ok(numerator as f64 / denominator as f64)
}

/// Returns true when the reference letter is South or West.
///
/// Accepts `"S"`, `b"S"`, `"south"`, `" w"`: only the first non-blank
/// character counts, compared case-insensitively.
pub fn is_negative_hemisphere(hemisphere_ref: impl AsRef<[u8]>) -> bool {
    hemisphere_ref
        .as_ref()
        .iter()
        .find(|b| !b.is_ascii_whitespace() && **b != 0)
        .map(|b| matches!(b.to_ascii_uppercase(), b'S' | b'W'))
        .unwrap_or(false)
}

/// Degrees/minutes/seconds to signed decimal degrees.
pub fn dms_to_decimal(degrees: f64, minutes: f64, seconds: f64, hemisphere_ref: impl AsRef<[u8]>) -> f64 {
    let decimal = degrees + (minutes / 60.0) + (seconds / 3600.0);
    if is_negative_hemisphere(hemisphere_ref) {
        -decimal.abs()
    } else {
        decimal
    }
}

/// Parses `"num/den"` or a plain number. A zero denominator is unusable;
/// an empty one (`"5/"`) counts as 1.
pub(crate) fn parse_fraction(text: &str) -> Option<f64> {
    let text = text.trim().trim_matches(|c| c == '"' || c == '\'');
    match text.split_once('/') {
        Some((num, den)) => {
            let num: i64 = num.trim().parse().ok()?;
            let den: i64 = match den.trim() {
                "" => 1,
                d => d.parse().ok()?,
            };
            rational_to_float(num, den).ok()
        }
        None => text.parse::<f64>().ok().filter(|v| v.is_finite()),
    }
}

/// Parses a textual DMS triplet such as `"[40, 26, 4603/100]"`.
///
/// Returns `None` when fewer than two components are present or any present
/// component does not parse. Missing seconds default to 0.
pub fn parse_dms_triplet(text: &str) -> Option<(f64, f64, f64)> {
    let cleaned: String = text
        .trim()
        .chars()
        .filter(|c| !matches!(c, '[' | ']' | '"' | '\''))
        .collect();

    let parts: Vec<&str> = cleaned.split(',').map(str::trim).collect();
    if parts.len() < 2 || parts.iter().take(3).any(|p| p.is_empty()) {
        return None;
    }

    let degrees = parse_fraction(parts[0])?;
    let minutes = parse_fraction(parts[1])?;
    let seconds = match parts.get(2) {
        Some(p) => parse_fraction(p)?,
        None => 0.0,
    };
    Some((degrees, minutes, seconds))
}
