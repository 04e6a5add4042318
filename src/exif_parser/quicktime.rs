use regex::bytes::Regex;
use std::sync::OnceLock;

use super::container::find_bytes;
use crate::constants::{QUICKTIME_LOCATION_KEY, QUICKTIME_SCAN_WINDOW};
use crate::geo::GeoCoordinate;

// ±DD.DDDD±DDD.DDDD[±AAA.AAA][/]
const ISO6709_PATTERN: &str = r"([+\-]\d+(?:\.\d+)?)([+\-]\d+(?:\.\d+)?)(?:[+\-]\d+(?:\.\d+)?)?/?";

fn iso6709_regex() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| match Regex::new(ISO6709_PATTERN) {
            Ok(re) => Some(re),
            Err(e) => {
                tracing::error!(error = %e, "ISO6709 pattern failed to compile");
                None
            }
        })
        .as_ref()
}

/// Parses the first `±lat±lon[±alt]` run in an ISO6709 string.
pub fn parse_iso6709(text: &[u8]) -> Option<GeoCoordinate> {
    let caps = iso6709_regex()?.captures(text)?;
    let number = |i: usize| -> Option<f64> { std::str::from_utf8(caps.get(i)?.as_bytes()).ok()?.parse().ok() };
    let lat = number(1)?;
    let lon = number(2)?;
    GeoCoordinate::new(lon, lat)
}

/// Apple QuickTime location path over raw bytes: finds the
/// `com.apple.quicktime.location.ISO6709` key and parses the bounded window
/// that follows it.
pub fn quicktime_gps_from_bytes(bytes: &[u8]) -> Option<GeoCoordinate> {
    let start = find_bytes(bytes, QUICKTIME_LOCATION_KEY)?;
    let end = (start + QUICKTIME_SCAN_WINDOW).min(bytes.len());
    let coordinate = parse_iso6709(&bytes[start..end]);
    if coordinate.is_none() {
        tracing::debug!("QuickTime location key without a usable ISO6709 value");
    }
    coordinate
}
