//! Tolerant EXIF walker rendering tags as `"GPS GPSLatitude" -> "[40, 26, 46]"`.
//!
//! Reads IFD entries directly from their offsets instead of trusting the IFD
//! chain, so blobs with a bad magic number, dangling next-IFD pointers or
//! truncated entry tables still yield whatever tags are reachable.

use std::collections::{BTreeMap, HashSet};

use super::container::{jpeg_app1_exif, scan_exif_marker};
use super::coords::{dms_to_decimal, parse_dms_triplet};
use super::tags::{tag_label, DecodedTagSet, Directory, TagValue};
use crate::geo::GeoCoordinate;

/// Text rendering of every reachable tag, keyed `"{group} {label}"`.
pub type TextTags = BTreeMap<String, String>;

#[derive(Debug, Clone, Copy)]
enum ByteOrder {
    LittleEndian,
    BigEndian,
}

const EXIF_POINTER: u16 = 0x8769;
const GPS_POINTER: u16 = 0x8825;
const INTEROP_POINTER: u16 = 0xA005;

struct Walker<'a> {
    tiff: &'a [u8],
    order: ByteOrder,
    visited: HashSet<usize>,
    tags: DecodedTagSet,
}

impl<'a> Walker<'a> {
    fn u16_at(&self, pos: usize) -> Option<u16> {
        let b = self.tiff.get(pos..pos + 2)?;
        Some(match self.order {
            ByteOrder::LittleEndian => u16::from_le_bytes([b[0], b[1]]),
            ByteOrder::BigEndian => u16::from_be_bytes([b[0], b[1]]),
        })
    }

    fn u32_at(&self, pos: usize) -> Option<u32> {
        let b = self.tiff.get(pos..pos + 4)?;
        Some(match self.order {
            ByteOrder::LittleEndian => u32::from_le_bytes([b[0], b[1], b[2], b[3]]),
            ByteOrder::BigEndian => u32::from_be_bytes([b[0], b[1], b[2], b[3]]),
        })
    }

    /// Walks one IFD and returns the next-IFD offset when it is in bounds.
    fn walk_ifd(&mut self, offset: usize, directory: Directory) -> Option<usize> {
        if offset < 8 || !self.visited.insert(offset) {
            return None;
        }
        let count = usize::from(self.u16_at(offset)?);
        let mut pos = offset + 2;
        let mut pointers = Vec::new();

        for _ in 0..count {
            if pos + 12 > self.tiff.len() {
                tracing::debug!(?directory, "IFD entry table truncated");
                return None;
            }
            let tag = self.u16_at(pos)?;
            match (directory, tag) {
                (Directory::Primary, EXIF_POINTER) => {
                    pointers.push((self.u32_at(pos + 8)? as usize, Directory::Exif));
                }
                (Directory::Primary, GPS_POINTER) => {
                    pointers.push((self.u32_at(pos + 8)? as usize, Directory::Gps));
                }
                (Directory::Exif, INTEROP_POINTER) => {
                    pointers.push((self.u32_at(pos + 8)? as usize, Directory::Interop));
                }
                _ => match self.read_value(pos) {
                    Some(value) => self.tags.insert(directory, tag, value),
                    None => tracing::debug!(?directory, tag, "skipping unreadable entry"),
                },
            }
            pos += 12;
        }

        for (sub_offset, sub_directory) in pointers {
            self.walk_ifd(sub_offset, sub_directory);
        }

        let next = self.u32_at(pos)? as usize;
        (next != 0 && next < self.tiff.len()).then_some(next)
    }

    fn read_value(&self, entry: usize) -> Option<TagValue> {
        let kind = self.u16_at(entry + 2)?;
        let count = self.u32_at(entry + 4)? as usize;
        let unit = match kind {
            1 | 2 | 6 | 7 => 1,
            3 | 8 => 2,
            4 | 9 | 11 => 4,
            5 | 10 | 12 => 8,
            _ => return None,
        };
        let size = count.checked_mul(unit)?;
        let start = if size <= 4 {
            entry + 8
        } else {
            self.u32_at(entry + 8)? as usize
        };
        let raw = self.tiff.get(start..start.checked_add(size)?)?;

        let value = match kind {
            1 | 7 => TagValue::Bytes(raw.to_vec()),
            2 => {
                let text = raw.split(|&b| b == 0).next().unwrap_or_default();
                TagValue::Ascii(vec![String::from_utf8_lossy(text).trim().to_string()])
            }
            6 => TagValue::Integer(raw.iter().map(|&b| i64::from(b as i8)).collect()),
            3 | 8 => TagValue::Integer(
                (0..count)
                    .filter_map(|i| self.u16_at(start + i * 2))
                    .map(|v| if kind == 8 { i64::from(v as i16) } else { i64::from(v) })
                    .collect(),
            ),
            4 | 9 => TagValue::Integer(
                (0..count)
                    .filter_map(|i| self.u32_at(start + i * 4))
                    .map(|v| if kind == 9 { i64::from(v as i32) } else { i64::from(v) })
                    .collect(),
            ),
            5 | 10 => TagValue::Rational(
                (0..count)
                    .filter_map(|i| {
                        let num = self.u32_at(start + i * 8)?;
                        let den = self.u32_at(start + i * 8 + 4)?;
                        Some(if kind == 10 {
                            (i64::from(num as i32), i64::from(den as i32))
                        } else {
                            (i64::from(num), i64::from(den))
                        })
                    })
                    .collect(),
            ),
            11 => TagValue::Float(
                (0..count)
                    .filter_map(|i| self.u32_at(start + i * 4))
                    .map(|bits| f64::from(f32::from_bits(bits)))
                    .collect(),
            ),
            12 => TagValue::Float(
                (0..count)
                    .filter_map(|i| {
                        let hi = u64::from(self.u32_at(start + i * 8)?);
                        let lo = u64::from(self.u32_at(start + i * 8 + 4)?);
                        let bits = match self.order {
                            ByteOrder::BigEndian => (hi << 32) | lo,
                            ByteOrder::LittleEndian => (lo << 32) | hi,
                        };
                        Some(f64::from_bits(bits))
                    })
                    .collect(),
            ),
            _ => return None,
        };
        Some(value)
    }
}

/// Walks a TIFF-structured blob without requiring a valid magic number or
/// a well-formed IFD chain.
pub fn walk_tiff(tiff: &[u8]) -> Option<DecodedTagSet> {
    let order = match tiff.get(0..2)? {
        b"II" => ByteOrder::LittleEndian,
        b"MM" => ByteOrder::BigEndian,
        _ => return None,
    };
    let mut walker = Walker {
        tiff,
        order,
        visited: HashSet::new(),
        tags: DecodedTagSet::new(),
    };
    if walker.u16_at(2)? != 42 {
        tracing::debug!("TIFF magic number mismatch, walking anyway");
    }

    let ifd0 = walker.u32_at(4)? as usize;
    if let Some(ifd1) = walker.walk_ifd(ifd0, Directory::Primary) {
        walker.walk_ifd(ifd1, Directory::Thumbnail);
    }
    Some(walker.tags)
}

/// Locates the EXIF blob without the structured container reader.
fn locate_tiff(bytes: &[u8]) -> Option<&[u8]> {
    if bytes.starts_with(b"II") || bytes.starts_with(b"MM") {
        return Some(bytes);
    }
    jpeg_app1_exif(bytes)
        .filter(|blob| blob.starts_with(b"II") || blob.starts_with(b"MM"))
        .or_else(|| scan_exif_marker(bytes))
}

/// Tolerant decode of the EXIF block embedded in raw image bytes.
pub fn walk_embedded(bytes: &[u8]) -> Option<DecodedTagSet> {
    walk_tiff(locate_tiff(bytes)?)
}

fn group_name(directory: Directory) -> &'static str {
    match directory {
        Directory::Primary => "Image",
        Directory::Exif => "EXIF",
        Directory::Gps => "GPS",
        Directory::Interop => "Interoperability",
        Directory::Thumbnail => "Thumbnail",
    }
}

pub fn render(tags: &DecodedTagSet) -> TextTags {
    tags.iter()
        .map(|(dir, number, value)| {
            (format!("{} {}", group_name(dir), tag_label(dir, number)), value.to_string())
        })
        .collect()
}

/// Text rendering of the EXIF block in raw image bytes.
pub fn text_tags(bytes: &[u8]) -> Option<TextTags> {
    walk_embedded(bytes).map(|tags| render(&tags))
}

fn text_axis(tags: &TextTags, value_key: &str, ref_key: &str) -> Option<f64> {
    let (degrees, minutes, seconds) = parse_dms_triplet(tags.get(value_key)?)?;
    let hemisphere = tags.get(ref_key)?;
    Some(dms_to_decimal(degrees, minutes, seconds, hemisphere))
}

/// Coordinate from text-rendered GPS tags.
pub fn resolve_text_gps(tags: &TextTags) -> Option<GeoCoordinate> {
    let lat = text_axis(tags, "GPS GPSLatitude", "GPS GPSLatitudeRef")?;
    let lon = text_axis(tags, "GPS GPSLongitude", "GPS GPSLongitudeRef")?;
    GeoCoordinate::new(lon, lat)
}

pub fn text_gps_from_bytes(bytes: &[u8]) -> Option<GeoCoordinate> {
    resolve_text_gps(&text_tags(bytes)?)
}
