use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use super::container::find_bytes_ignore_case;
use super::coords::is_negative_hemisphere;
use crate::constants::{XMP_CLOSE_TAG, XMP_OPEN_TAG};
use crate::geo::GeoCoordinate;

/// Returns the `<x:xmpmeta ...> ... </x:xmpmeta>` packet embedded anywhere in
/// the bytes, decoded lossily as UTF-8.
pub fn find_packet(bytes: &[u8]) -> Option<String> {
    let start = find_bytes_ignore_case(bytes, XMP_OPEN_TAG)?;
    let close = find_bytes_ignore_case(&bytes[start..], XMP_CLOSE_TAG)?;
    let end = start + close + XMP_CLOSE_TAG.len();
    Some(String::from_utf8_lossy(&bytes[start..end]).into_owned())
}

#[derive(Debug, Default)]
struct GpsProperties {
    lat: Option<String>,
    lat_ref: Option<String>,
    lon: Option<String>,
    lon_ref: Option<String>,
}

impl GpsProperties {
    fn slot(&mut self, local_name: &[u8]) -> Option<&mut Option<String>> {
        match local_name {
            b"GPSLatitude" => Some(&mut self.lat),
            b"GPSLatitudeRef" => Some(&mut self.lat_ref),
            b"GPSLongitude" => Some(&mut self.lon),
            b"GPSLongitudeRef" => Some(&mut self.lon_ref),
            _ => None,
        }
    }

    /// `rdf:Description exif:GPSLatitude="..."` shorthand form.
    fn read_attributes(&mut self, element: &BytesStart<'_>) {
        for attr in element.attributes().flatten() {
            let Ok(value) = attr.unescape_value() else {
                continue;
            };
            if let Some(slot) = self.slot(attr.key.local_name().as_ref()) {
                slot.get_or_insert_with(|| value.trim().to_string());
            }
        }
    }
}

fn read_properties(packet: &str) -> Option<GpsProperties> {
    let mut reader = Reader::from_str(packet);
    reader.config_mut().trim_text(true);

    let mut props = GpsProperties::default();
    let mut current: Option<Vec<u8>> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => {
                props.read_attributes(e);
                let name = e.local_name().as_ref().to_vec();
                current = props.slot(&name).is_some().then_some(name);
            }
            Ok(Event::Empty(ref e)) => props.read_attributes(e),
            Ok(Event::Text(ref e)) => {
                if let Some(name) = &current {
                    let text = match e.decode() {
                        Ok(text) => text.trim().to_string(),
                        Err(err) => {
                            tracing::debug!(error = %err, "undecodable XMP text");
                            continue;
                        }
                    };
                    if let Some(slot) = props.slot(name) {
                        if !text.is_empty() {
                            slot.get_or_insert(text);
                        }
                    }
                }
            }
            Ok(Event::End(_)) => current = None,
            Ok(Event::Eof) => break,
            Err(e) => {
                tracing::debug!(error = %e, "malformed XMP packet");
                return None;
            }
            _ => {}
        }
    }
    Some(props)
}

fn parse_number(text: &str) -> Option<f64> {
    text.trim()
        .replace(',', ".")
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
}

/// Parses an XMP GPS value: `"40.4461"`, `"-79.98"`, `"40,4461N"`, or the
/// `DDD,MM.mmmK` / `DDD,MM,SSK` forms. A trailing letter or a separate
/// reference of `S`/`W` makes the result negative.
pub fn parse_coordinate(value: &str, reference: Option<&str>) -> Option<f64> {
    let value = value.trim();
    let (body, suffix) = match value.char_indices().last() {
        Some((i, c)) if c.is_ascii_alphabetic() => (value[..i].trim(), Some(c)),
        _ => (value, None),
    };

    let commas = body.matches(',').count();
    let magnitude = if commas >= 2 || (commas == 1 && body.contains('.')) {
        let mut parts = body.split(',').map(str::trim);
        let degrees: f64 = parts.next()?.parse().ok()?;
        let minutes: f64 = parts.next()?.parse().ok()?;
        let seconds: f64 = match parts.next() {
            Some(s) => s.parse().ok()?,
            None => 0.0,
        };
        degrees + minutes / 60.0 + seconds / 3600.0
    } else {
        parse_number(body)?
    };

    let negative = suffix.is_some_and(|c| is_negative_hemisphere([c as u8]))
        || reference.is_some_and(|r| is_negative_hemisphere(r));
    Some(if negative { -magnitude.abs() } else { magnitude })
}

pub fn resolve_packet(packet: &str) -> Option<GeoCoordinate> {
    let props = read_properties(packet)?;
    let lat = parse_coordinate(props.lat.as_deref()?, props.lat_ref.as_deref())?;
    let lon = parse_coordinate(props.lon.as_deref()?, props.lon_ref.as_deref())?;
    GeoCoordinate::new(lon, lat)
}

/// XMP path over raw image bytes.
pub fn xmp_gps_from_bytes(bytes: &[u8]) -> Option<GeoCoordinate> {
    let packet = find_packet(bytes)?;
    let coordinate = resolve_packet(&packet);
    if coordinate.is_none() {
        tracing::debug!("XMP packet present without usable GPS");
    }
    coordinate
}
