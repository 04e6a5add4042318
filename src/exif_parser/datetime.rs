use chrono::{DateTime, NaiveDateTime, Utc};
use exif::Tag;

use super::tags::{DecodedTagSet, Directory};
use super::text::TextTags;
use crate::constants::{EXIF_DATETIME_FORMAT, EXIF_DATETIME_LEN};

/// Capture time read from metadata. EXIF stores local wall-clock time; it is
/// stamped UTC as-is and offset tags are not applied.
pub type CaptureTimestamp = DateTime<Utc>;

/// Parses the first 19 characters of an EXIF `YYYY:MM:DD HH:MM:SS` value.
/// Sub-second and offset suffixes are ignored.
pub fn parse_exif_datetime(raw: &str) -> Option<CaptureTimestamp> {
    let head = raw.trim_start().get(..EXIF_DATETIME_LEN)?;
    match NaiveDateTime::parse_from_str(head, EXIF_DATETIME_FORMAT) {
        Ok(naive) => Some(naive.and_utc()),
        Err(e) => {
            tracing::debug!(raw, error = %e, "malformed EXIF timestamp");
            None
        }
    }
}

/// DateTimeOriginal, then DateTimeDigitized, then the primary DateTime.
/// The first present value decides; a malformed one yields `None`.
pub fn timestamp_from_tags(tags: &DecodedTagSet) -> Option<CaptureTimestamp> {
    let raw = [
        (Directory::Exif, Tag::DateTimeOriginal),
        (Directory::Exif, Tag::DateTimeDigitized),
        (Directory::Primary, Tag::DateTime),
    ]
    .into_iter()
    .filter_map(|(dir, tag)| tags.field(dir, tag)?.as_text())
    .find(|text| !text.trim().is_empty())?;

    if let Some(offset) = tags.field(Directory::Exif, Tag::OffsetTimeOriginal).and_then(|v| v.as_text()) {
        tracing::debug!(%offset, "capture offset present but not applied");
    }
    parse_exif_datetime(&raw)
}

pub fn timestamp_from_text(tags: &TextTags) -> Option<CaptureTimestamp> {
    let raw = ["EXIF DateTimeOriginal", "EXIF DateTimeDigitized", "Image DateTime"]
        .into_iter()
        .filter_map(|key| tags.get(key))
        .find(|text| !text.trim().is_empty())?;
    parse_exif_datetime(raw)
}
