//! Strict TIFF/EXIF decoding into a flat, directory-keyed tag set.
//!
//! Decoding is delegated to `kamadak-exif` with `continue_on_error` enabled,
//! so a single broken field is dropped instead of failing the whole blob.
//! Everything downstream (GPS, timestamps, flattening) reads [`DecodedTagSet`]
//! rather than `exif::Exif` directly, which lets the tolerant walker in
//! [`super::text`] produce the same structure.

use exif::{Context, Field, In, Reader, Tag, Value};
use std::collections::BTreeMap;
use std::fmt;

/// Image file directory a tag was read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Directory {
    Primary,
    Exif,
    Gps,
    Interop,
    Thumbnail,
}

impl Directory {
    /// Name used in flattened metadata keys.
    pub fn name(&self) -> &'static str {
        match self {
            Directory::Primary => "0th",
            Directory::Exif => "Exif",
            Directory::Gps => "GPS",
            Directory::Interop => "Interop",
            Directory::Thumbnail => "1st",
        }
    }

    pub(crate) fn context(&self) -> Context {
        match self {
            Directory::Primary | Directory::Thumbnail => Context::Tiff,
            Directory::Exif => Context::Exif,
            Directory::Gps => Context::Gps,
            Directory::Interop => Context::Interop,
        }
    }

    fn of_field(field: &Field) -> Option<Directory> {
        match field.tag.context() {
            Context::Exif => Some(Directory::Exif),
            Context::Gps => Some(Directory::Gps),
            Context::Interop => Some(Directory::Interop),
            _ if field.ifd_num == In::PRIMARY => Some(Directory::Primary),
            _ if field.ifd_num == In::THUMBNAIL => Some(Directory::Thumbnail),
            _ => None,
        }
    }
}

/// Raw tag value, independent of the TIFF field type it was stored with.
#[derive(Debug, Clone, PartialEq)]
pub enum TagValue {
    Integer(Vec<i64>),
    /// (numerator, denominator) pairs, kept verbatim; zero denominators included.
    Rational(Vec<(i64, i64)>),
    Ascii(Vec<String>),
    Bytes(Vec<u8>),
    Float(Vec<f64>),
}

// Opaque byte blobs longer than this are summarized instead of listed
const MAX_LISTED_BYTES: usize = 64;

impl TagValue {
    /// First string for ASCII values, raw bytes as text for BYTE/UNDEFINED.
    pub fn as_text(&self) -> Option<String> {
        match self {
            TagValue::Ascii(v) => v.first().cloned(),
            TagValue::Bytes(b) => Some(String::from_utf8_lossy(b).trim_end_matches('\0').to_string()),
            _ => None,
        }
    }

    fn from_exif(value: &Value) -> Option<TagValue> {
        let value = match value {
            Value::Byte(v) => TagValue::Bytes(v.clone()),
            Value::Undefined(v, _) => TagValue::Bytes(v.clone()),
            Value::Ascii(v) => TagValue::Ascii(
                v.iter()
                    .map(|s| String::from_utf8_lossy(s).trim_end_matches('\0').to_string())
                    .collect(),
            ),
            Value::Short(v) => TagValue::Integer(v.iter().map(|&x| i64::from(x)).collect()),
            Value::Long(v) => TagValue::Integer(v.iter().map(|&x| i64::from(x)).collect()),
            Value::SByte(v) => TagValue::Integer(v.iter().map(|&x| i64::from(x)).collect()),
            Value::SShort(v) => TagValue::Integer(v.iter().map(|&x| i64::from(x)).collect()),
            Value::SLong(v) => TagValue::Integer(v.iter().map(|&x| i64::from(x)).collect()),
            Value::Rational(v) => {
                TagValue::Rational(v.iter().map(|r| (i64::from(r.num), i64::from(r.denom))).collect())
            }
            Value::SRational(v) => {
                TagValue::Rational(v.iter().map(|r| (i64::from(r.num), i64::from(r.denom))).collect())
            }
            Value::Float(v) => TagValue::Float(v.iter().map(|&x| f64::from(x)).collect()),
            Value::Double(v) => TagValue::Float(v.clone()),
            _ => return None,
        };
        Some(value)
    }
}

fn list<T: fmt::Display>(f: &mut fmt::Formatter<'_>, items: &[T]) -> fmt::Result {
    if items.len() == 1 {
        return write!(f, "{}", items[0]);
    }
    write!(f, "[")?;
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{item}")?;
    }
    write!(f, "]")
}

/// Renders values the way EXIF dump tools print them: `[40, 26, 4603/100]`,
/// `N`, `72`.
impl fmt::Display for TagValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TagValue::Integer(v) => list(f, v),
            TagValue::Float(v) => list(f, v),
            TagValue::Rational(v) => {
                let parts: Vec<String> = v
                    .iter()
                    .map(|&(n, d)| if d == 1 { n.to_string() } else { format!("{n}/{d}") })
                    .collect();
                list(f, &parts)
            }
            TagValue::Ascii(v) => write!(f, "{}", v.join(", ")),
            TagValue::Bytes(b) => {
                let trimmed: &[u8] = match b.iter().rposition(|&x| x != 0) {
                    Some(end) => &b[..=end],
                    None => &[],
                };
                let printable = !trimmed.is_empty() && trimmed.iter().all(|c| c.is_ascii_graphic() || *c == b' ');
                if printable {
                    write!(f, "{}", String::from_utf8_lossy(trimmed))
                } else if b.len() > MAX_LISTED_BYTES {
                    write!(f, "[{} bytes]", b.len())
                } else {
                    list(f, b)
                }
            }
        }
    }
}

/// Human label for a tag: the EXIF name when known, the decimal id otherwise.
pub fn tag_label(directory: Directory, number: u16) -> String {
    let tag = Tag(directory.context(), number);
    if tag.description().is_some() {
        tag.to_string()
    } else {
        number.to_string()
    }
}

/// Decoded tags keyed by (directory, tag id).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DecodedTagSet {
    entries: BTreeMap<(Directory, u16), TagValue>,
}

impl DecodedTagSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, directory: Directory, number: u16, value: TagValue) {
        self.entries.insert((directory, number), value);
    }

    pub fn get(&self, directory: Directory, number: u16) -> Option<&TagValue> {
        self.entries.get(&(directory, number))
    }

    pub fn field(&self, directory: Directory, tag: Tag) -> Option<&TagValue> {
        self.get(directory, tag.number())
    }

    pub fn iter(&self) -> impl Iterator<Item = (Directory, u16, &TagValue)> {
        self.entries.iter().map(|(&(dir, num), v)| (dir, num, v))
    }

    pub fn directory(&self, directory: Directory) -> impl Iterator<Item = (u16, &TagValue)> {
        self.iter()
            .filter(move |(dir, _, _)| *dir == directory)
            .map(|(_, num, v)| (num, v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn from_exif(exif: &exif::Exif) -> Self {
        let mut set = DecodedTagSet::new();
        for field in exif.fields() {
            let Some(directory) = Directory::of_field(field) else {
                continue;
            };
            match TagValue::from_exif(&field.value) {
                Some(value) => set.insert(directory, field.tag.number(), value),
                None => tracing::debug!(tag = %field.tag, "skipping field with unknown value type"),
            }
        }
        set
    }
}

/// Decodes a TIFF-structured blob (no `Exif\0\0` prefix).
///
/// `None` means the blob is not decodable at all; callers move on to the next
/// metadata source.
pub fn decode_tiff(blob: &[u8]) -> Option<DecodedTagSet> {
    let mut reader = Reader::new();
    reader.continue_on_error(true);

    let exif = match reader.read_raw(blob.to_vec()) {
        Ok(exif) => exif,
        Err(exif::Error::PartialResult(partial)) => {
            let (exif, errors) = partial.into_inner();
            tracing::debug!(skipped = errors.len(), "TIFF blob decoded partially");
            exif
        }
        Err(e) => {
            tracing::debug!(error = %e, "TIFF blob not decodable");
            return None;
        }
    };

    Some(DecodedTagSet::from_exif(&exif))
}

/// Locates the embedded EXIF blob in an image container and decodes it.
pub fn decode_embedded(bytes: &[u8]) -> Option<DecodedTagSet> {
    let blob = super::container::embedded_exif(bytes)?;
    decode_tiff(&blob)
}
