//! Metadata extraction: EXIF (strict and tolerant), XMP, QuickTime ISO6709,
//! capture timestamps and flattened tag maps.

pub mod container;
pub mod coords;
pub mod datetime;
pub mod flatten;
pub mod gps;
pub mod quicktime;
pub mod tags;
pub mod text;
pub mod xmp;

pub use container::embedded_exif;
pub use coords::{dms_to_decimal, parse_dms_triplet, rational_to_float};
pub use datetime::{parse_exif_datetime, CaptureTimestamp};
pub use flatten::{flatten_metadata, FlatMetadata};
pub use gps::{gps_from_bytes, resolve_gps};
pub use quicktime::quicktime_gps_from_bytes;
pub use tags::{decode_embedded, decode_tiff, DecodedTagSet, Directory, TagValue};
pub use text::{resolve_text_gps, text_gps_from_bytes, text_tags, TextTags};
pub use xmp::xmp_gps_from_bytes;
