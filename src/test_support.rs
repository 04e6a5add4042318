//! Hand-built image and metadata fixtures for tests.
//!
//! Depends only on the `image` crate so integration tests can pull it in
//! with `#[path]`.
#![allow(dead_code)]

use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::{ExtendedColorType, ImageEncoder, RgbImage, RgbaImage};

#[derive(Debug, Clone, Copy)]
pub enum TiffOrder {
    Little,
    Big,
}

impl TiffOrder {
    fn u16(self, v: u16) -> [u8; 2] {
        match self {
            TiffOrder::Little => v.to_le_bytes(),
            TiffOrder::Big => v.to_be_bytes(),
        }
    }

    fn u32(self, v: u32) -> [u8; 4] {
        match self {
            TiffOrder::Little => v.to_le_bytes(),
            TiffOrder::Big => v.to_be_bytes(),
        }
    }
}

const ASCII: u16 = 2;
const SHORT: u16 = 3;
const LONG: u16 = 4;
const RATIONAL: u16 = 5;

struct Entry {
    tag: u16,
    kind: u16,
    count: u32,
    data: Vec<u8>,
}

impl Entry {
    fn ascii(tag: u16, text: &str) -> Self {
        let mut data = text.as_bytes().to_vec();
        data.push(0);
        Entry { tag, kind: ASCII, count: data.len() as u32, data }
    }

    fn short(tag: u16, value: u16, order: TiffOrder) -> Self {
        Entry { tag, kind: SHORT, count: 1, data: order.u16(value).to_vec() }
    }

    fn long(tag: u16, value: u32, order: TiffOrder) -> Self {
        Entry { tag, kind: LONG, count: 1, data: order.u32(value).to_vec() }
    }

    fn rationals(tag: u16, values: &[(u32, u32)], order: TiffOrder) -> Self {
        let mut data = Vec::with_capacity(values.len() * 8);
        for &(num, den) in values {
            data.extend_from_slice(&order.u32(num));
            data.extend_from_slice(&order.u32(den));
        }
        Entry { tag, kind: RATIONAL, count: values.len() as u32, data }
    }

    fn external_len(&self) -> usize {
        if self.data.len() > 4 {
            self.data.len() + self.data.len() % 2
        } else {
            0
        }
    }
}

fn ifd_len(entries: &[Entry]) -> usize {
    2 + 12 * entries.len() + 4 + entries.iter().map(Entry::external_len).sum::<usize>()
}

/// Serializes one IFD whose first byte sits at `base` (relative to the TIFF
/// header). Out-of-line values follow the entry table.
fn encode_ifd(entries: &mut [Entry], base: usize, order: TiffOrder) -> Vec<u8> {
    entries.sort_by_key(|e| e.tag);
    let mut out = Vec::new();
    let mut data_area = Vec::new();
    let mut data_offset = base + 2 + 12 * entries.len() + 4;

    out.extend_from_slice(&order.u16(entries.len() as u16));
    for entry in entries.iter() {
        out.extend_from_slice(&order.u16(entry.tag));
        out.extend_from_slice(&order.u16(entry.kind));
        out.extend_from_slice(&order.u32(entry.count));
        if entry.data.len() <= 4 {
            let mut inline = entry.data.clone();
            inline.resize(4, 0);
            out.extend_from_slice(&inline);
        } else {
            out.extend_from_slice(&order.u32(data_offset as u32));
            data_area.extend_from_slice(&entry.data);
            if entry.data.len() % 2 == 1 {
                data_area.push(0);
            }
            data_offset += entry.external_len();
        }
    }
    out.extend_from_slice(&order.u32(0));
    out.extend_from_slice(&data_area);
    out
}

/// GPS directory contents; `None` leaves the tag out.
#[derive(Debug, Clone)]
pub struct GpsFixture {
    pub lat_ref: Option<&'static str>,
    pub lat: Option<Vec<(u32, u32)>>,
    pub lon_ref: Option<&'static str>,
    pub lon: Option<Vec<(u32, u32)>>,
}

impl GpsFixture {
    /// 40°26'46"N 79°58'56"W
    pub fn pittsburgh() -> Self {
        GpsFixture {
            lat_ref: Some("N"),
            lat: Some(vec![(40, 1), (26, 1), (46, 1)]),
            lon_ref: Some("W"),
            lon: Some(vec![(79, 1), (58, 1), (56, 1)]),
        }
    }

    /// 33°52'04"S 151°12'36"E
    pub fn sydney() -> Self {
        GpsFixture {
            lat_ref: Some("S"),
            lat: Some(vec![(33, 1), (52, 1), (4, 1)]),
            lon_ref: Some("E"),
            lon: Some(vec![(151, 1), (12, 1), (36, 1)]),
        }
    }

    fn entries(&self, order: TiffOrder) -> Vec<Entry> {
        let mut entries = Vec::new();
        if let Some(r) = self.lat_ref {
            entries.push(Entry::ascii(0x0001, r));
        }
        if let Some(v) = &self.lat {
            entries.push(Entry::rationals(0x0002, v, order));
        }
        if let Some(r) = self.lon_ref {
            entries.push(Entry::ascii(0x0003, r));
        }
        if let Some(v) = &self.lon {
            entries.push(Entry::rationals(0x0004, v, order));
        }
        entries
    }
}

/// Builder for a TIFF-structured EXIF blob (no `Exif\0\0` prefix).
#[derive(Debug, Clone)]
pub struct ExifFixture {
    pub make: Option<&'static str>,
    pub datetime: Option<&'static str>,
    pub datetime_original: Option<&'static str>,
    pub datetime_digitized: Option<&'static str>,
    pub offset_time_original: Option<&'static str>,
    pub gps: Option<GpsFixture>,
    /// Extra SHORT tags written into the primary directory.
    pub extra_primary: Vec<(u16, u16)>,
}

impl Default for ExifFixture {
    fn default() -> Self {
        ExifFixture {
            make: Some("FixtureCam"),
            datetime: Some("2023:06:01 12:00:00"),
            datetime_original: Some("2023:06:01 10:30:00"),
            datetime_digitized: None,
            offset_time_original: None,
            gps: None,
            extra_primary: Vec::new(),
        }
    }
}

impl ExifFixture {
    pub fn with_gps(gps: GpsFixture) -> Self {
        ExifFixture {
            gps: Some(gps),
            ..ExifFixture::default()
        }
    }

    pub fn pittsburgh() -> Self {
        Self::with_gps(GpsFixture::pittsburgh())
    }

    pub fn tiff(&self, order: TiffOrder) -> Vec<u8> {
        let mut primary = Vec::new();
        if let Some(make) = self.make {
            primary.push(Entry::ascii(0x010F, make));
        }
        if let Some(dt) = self.datetime {
            primary.push(Entry::ascii(0x0132, dt));
        }
        for &(tag, value) in &self.extra_primary {
            primary.push(Entry::short(tag, value, order));
        }

        let mut exif = Vec::new();
        if let Some(dt) = self.datetime_original {
            exif.push(Entry::ascii(0x9003, dt));
        }
        if let Some(dt) = self.datetime_digitized {
            exif.push(Entry::ascii(0x9004, dt));
        }
        if let Some(offset) = self.offset_time_original {
            exif.push(Entry::ascii(0x9011, offset));
        }

        let mut gps = self.gps.as_ref().map(|g| g.entries(order)).unwrap_or_default();
        let has_exif = !exif.is_empty();
        let has_gps = self.gps.is_some();

        // Pointer entries are inline LONGs, so they do not change IFD sizes
        if has_exif {
            primary.push(Entry::long(0x8769, 0, order));
        }
        if has_gps {
            primary.push(Entry::long(0x8825, 0, order));
        }
        let exif_offset = 8 + ifd_len(&primary);
        let gps_offset = exif_offset + if has_exif { ifd_len(&exif) } else { 0 };
        for entry in primary.iter_mut() {
            match entry.tag {
                0x8769 => entry.data = order.u32(exif_offset as u32).to_vec(),
                0x8825 => entry.data = order.u32(gps_offset as u32).to_vec(),
                _ => {}
            }
        }

        let mut out = match order {
            TiffOrder::Little => b"II".to_vec(),
            TiffOrder::Big => b"MM".to_vec(),
        };
        out.extend_from_slice(&order.u16(42));
        out.extend_from_slice(&order.u32(8));
        out.extend_from_slice(&encode_ifd(&mut primary, 8, order));
        if has_exif {
            out.extend_from_slice(&encode_ifd(&mut exif, exif_offset, order));
        }
        if has_gps {
            out.extend_from_slice(&encode_ifd(&mut gps, gps_offset, order));
        }
        out
    }
}

fn gradient(width: u32, height: u32) -> RgbImage {
    RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([(x * 255 / width.max(1)) as u8, (y * 255 / height.max(1)) as u8, 128])
    })
}

/// Deterministic high-entropy pixels; JPEG compresses these poorly.
pub fn noise_rgba(width: u32, height: u32) -> RgbaImage {
    let mut state: u32 = 0x2545_F491;
    RgbaImage::from_fn(width, height, |_, _| {
        state ^= state << 13;
        state ^= state >> 17;
        state ^= state << 5;
        let [r, g, b, a] = state.to_le_bytes();
        image::Rgba([r, g, b, a | 0x80])
    })
}

pub fn plain_jpeg(width: u32, height: u32) -> Vec<u8> {
    let img = gradient(width, height);
    let mut out = Vec::new();
    JpegEncoder::new_with_quality(&mut out, 90)
        .write_image(img.as_raw(), width, height, ExtendedColorType::Rgb8)
        .expect("encode fixture jpeg");
    out
}

pub fn png_from_rgba(img: &RgbaImage) -> Vec<u8> {
    let mut out = Vec::new();
    PngEncoder::new(&mut out)
        .write_image(img.as_raw(), img.width(), img.height(), ExtendedColorType::Rgba8)
        .expect("encode fixture png");
    out
}

/// Inserts an APP1 segment right after SOI (and APP0 when present).
pub fn insert_app1(jpeg: &[u8], payload: &[u8]) -> Vec<u8> {
    let mut at = 2;
    if jpeg.len() > 6 && jpeg[2] == 0xFF && jpeg[3] == 0xE0 {
        at = 4 + usize::from(u16::from_be_bytes([jpeg[4], jpeg[5]]));
    }
    let mut out = Vec::with_capacity(jpeg.len() + payload.len() + 4);
    out.extend_from_slice(&jpeg[..at]);
    out.extend_from_slice(&[0xFF, 0xE1]);
    out.extend_from_slice(&((payload.len() + 2) as u16).to_be_bytes());
    out.extend_from_slice(payload);
    out.extend_from_slice(&jpeg[at..]);
    out
}

pub fn jpeg_with_exif(tiff: &[u8]) -> Vec<u8> {
    let mut payload = b"Exif\0\0".to_vec();
    payload.extend_from_slice(tiff);
    insert_app1(&plain_jpeg(16, 16), &payload)
}

/// An XMP packet with the given `exif:GPS*` element values.
pub fn xmp_packet(lat: &str, lat_ref: Option<&str>, lon: &str, lon_ref: Option<&str>) -> String {
    let mut props = format!("<exif:GPSLatitude>{lat}</exif:GPSLatitude>\n<exif:GPSLongitude>{lon}</exif:GPSLongitude>\n");
    if let Some(r) = lat_ref {
        props.push_str(&format!("<exif:GPSLatitudeRef>{r}</exif:GPSLatitudeRef>\n"));
    }
    if let Some(r) = lon_ref {
        props.push_str(&format!("<exif:GPSLongitudeRef>{r}</exif:GPSLongitudeRef>\n"));
    }
    format!(
        r#"<?xpacket begin="" id="W5M0MpCehiHzreSzNTczkc9d"?>
<x:xmpmeta xmlns:x="adobe:ns:meta/" x:xmptk="Fixture">
<rdf:RDF xmlns:rdf="http://www.w3.org/1999/02/22-rdf-syntax-ns#">
<rdf:Description rdf:about="" xmlns:exif="http://ns.adobe.com/exif/1.0/">
{props}</rdf:Description>
</rdf:RDF>
</x:xmpmeta>
<?xpacket end="w"?>"#
    )
}

pub fn jpeg_with_xmp(packet: &str) -> Vec<u8> {
    let mut payload = b"http://ns.adobe.com/xap/1.0/\0".to_vec();
    payload.extend_from_slice(packet.as_bytes());
    insert_app1(&plain_jpeg(16, 16), &payload)
}

/// Bytes shaped like a QuickTime `keys`/`ilst` pair carrying an ISO6709 string.
pub fn quicktime_with_location(iso6709: &str) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(&[0, 0, 0, 0x18]);
    out.extend_from_slice(b"ftypqt  \0\0\0\0qt  ");
    out.extend_from_slice(&[0, 0, 0, 0x30]);
    out.extend_from_slice(b"keys\0\0\0\0\0\0\0\x01");
    out.extend_from_slice(&[0, 0, 0, 0x2c]);
    out.extend_from_slice(b"mdta");
    out.extend_from_slice(b"com.apple.quicktime.location.ISO6709");
    out.extend_from_slice(&[0, 0, 0, 0x20]);
    out.extend_from_slice(b"ilst\0\0\0\x18data\0\0\0\x01\0\0\0\0");
    out.extend_from_slice(iso6709.as_bytes());
    out.extend_from_slice(&[0u8; 16]);
    out
}
