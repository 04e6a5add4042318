use exif::Tag;

use super::coords::{dms_to_decimal, rational_to_float};
use super::tags::{decode_embedded, DecodedTagSet, Directory, TagValue};
use crate::geo::GeoCoordinate;

/// Numeric components of a GPS value tag as floats.
/// `None` when any present component is unusable (zero denominator).
fn components(value: &TagValue) -> Option<Vec<f64>> {
    match value {
        TagValue::Rational(parts) => parts
            .iter()
            .map(|&(num, den)| match rational_to_float(num, den) {
                Ok(v) => Some(v),
                Err(e) => {
                    tracing::debug!(error = %e, "unusable GPS component");
                    None
                }
            })
            .collect(),
        TagValue::Integer(parts) => Some(parts.iter().map(|&v| v as f64).collect()),
        TagValue::Float(parts) => Some(parts.clone()),
        TagValue::Ascii(_) | TagValue::Bytes(_) => None,
    }
}

fn axis(tags: &DecodedTagSet, value_tag: Tag, ref_tag: Tag) -> Option<f64> {
    let value = tags.field(Directory::Gps, value_tag)?;
    let hemisphere = tags.field(Directory::Gps, ref_tag)?.as_text()?;

    let parts = components(value)?;
    let degrees = *parts.first()?;
    let minutes = parts.get(1).copied().unwrap_or(0.0);
    let seconds = parts.get(2).copied().unwrap_or(0.0);
    Some(dms_to_decimal(degrees, minutes, seconds, hemisphere))
}

/// Reads a coordinate from the GPS directory of a decoded tag set.
///
/// All four of latitude, latitude ref, longitude and longitude ref must be
/// present; a partial set is treated as no coordinate.
pub fn resolve_gps(tags: &DecodedTagSet) -> Option<GeoCoordinate> {
    let lat = axis(tags, Tag::GPSLatitude, Tag::GPSLatitudeRef)?;
    let lon = axis(tags, Tag::GPSLongitude, Tag::GPSLongitudeRef)?;

    let coordinate = GeoCoordinate::new(lon, lat);
    if coordinate.is_none() {
        tracing::debug!(lon, lat, "EXIF GPS coordinate out of range");
    }
    coordinate
}

/// Structured EXIF path over raw image bytes.
pub fn gps_from_bytes(bytes: &[u8]) -> Option<GeoCoordinate> {
    let tags = decode_embedded(bytes)?;
    resolve_gps(&tags)
}
