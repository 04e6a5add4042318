use std::io::Cursor;

use crate::constants::EXIF_HEADER;

pub(crate) fn find_bytes(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}

pub(crate) fn find_bytes_ignore_case(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    haystack
        .windows(needle.len())
        .position(|w| w.eq_ignore_ascii_case(needle))
}

pub(crate) fn is_jpeg(data: &[u8]) -> bool {
    data.len() >= 3 && data[0] == 0xFF && data[1] == 0xD8 && data[2] == 0xFF
}

fn is_tiff_header(data: &[u8]) -> bool {
    data.starts_with(b"II*\0") || data.starts_with(b"MM\0*")
}

/// Payload of the first `Exif\0\0` APP1 segment, header stripped.
pub(crate) fn jpeg_app1_exif(data: &[u8]) -> Option<&[u8]> {
    if data.len() < 4 || data[0..2] != [0xFF, 0xD8] {
        return None;
    }

    let mut pos = 2;
    while pos + 4 <= data.len() {
        if data[pos] != 0xFF {
            return None;
        }
        let marker = data[pos + 1];
        match marker {
            // Fill byte before a marker
            0xFF => {
                pos += 1;
                continue;
            }
            // Standalone markers carry no length
            0x01 | 0xD0..=0xD8 => {
                pos += 2;
                continue;
            }
            // Entropy-coded data follows SOS; metadata never comes after it
            0xD9 | 0xDA => return None,
            _ => {}
        }

        let length = usize::from(u16::from_be_bytes([data[pos + 2], data[pos + 3]]));
        if length < 2 {
            return None;
        }
        let end = (pos + 2 + length).min(data.len());
        let payload = &data[pos + 4..end];
        if marker == 0xE1 && payload.starts_with(EXIF_HEADER) {
            return Some(&payload[EXIF_HEADER.len()..]);
        }
        pos += 2 + length;
    }
    None
}

/// Finds an `Exif` marker followed closely by a TIFF header. Covers HEIF item
/// payloads and containers neither the JPEG walk nor kamadak-exif recognise.
pub(crate) fn scan_exif_marker(data: &[u8]) -> Option<&[u8]> {
    let mut from = 0;
    while let Some(found) = find_bytes(&data[from..], b"Exif") {
        let start = from + found + 4;
        let window_end = (start + 8).min(data.len());
        if let Some(tiff_start) = (start..window_end).find(|&i| is_tiff_header(&data[i..])) {
            return Some(&data[tiff_start..]);
        }
        from = start;
    }
    None
}

fn kamadak_container_exif(data: &[u8]) -> Option<Vec<u8>> {
    let mut reader = exif::Reader::new();
    reader.continue_on_error(true);
    match reader.read_from_container(&mut Cursor::new(data)) {
        Ok(exif) => Some(exif.buf().to_vec()),
        Err(exif::Error::PartialResult(partial)) => {
            let (exif, _errors) = partial.into_inner();
            Some(exif.buf().to_vec())
        }
        Err(e) => {
            tracing::debug!(error = %e, "no EXIF found by container reader");
            None
        }
    }
}

/// Extracts the TIFF-structured EXIF blob embedded in an image file.
///
/// Tries the JPEG APP1 walk first, then kamadak-exif container detection
/// (PNG, WebP, HEIF, TIFF), then a raw marker scan.
pub fn embedded_exif(data: &[u8]) -> Option<Vec<u8>> {
    if let Some(blob) = jpeg_app1_exif(data) {
        if is_tiff_header(blob) {
            return Some(blob.to_vec());
        }
    }
    if let Some(blob) = kamadak_container_exif(data) {
        return Some(blob);
    }
    scan_exif_marker(data).map(<[u8]>::to_vec)
}
