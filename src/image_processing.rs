use image::codecs::jpeg::JpegEncoder;
use image::{ExtendedColorType, ImageEncoder, ImageError, ImageReader, RgbImage};
use serde::Serialize;
use std::io::Cursor;

use crate::constants::{EXIF_HEADER, JPEG_MIME_TYPE, JPEG_MIN_QUALITY, JPEG_QUALITY_STEP, JPEG_START_QUALITY};
use crate::error::CompressError;

// Largest payload one APP1 segment can carry (16-bit length includes itself)
const MAX_APP1_PAYLOAD: usize = u16::MAX as usize - 2;

/// Re-encoded image. `bytes` may exceed the budget when even the floor
/// quality could not reach it.
#[derive(Debug, Clone, Serialize)]
pub struct CompressionResult {
    #[serde(skip)]
    pub bytes: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub mime_type: &'static str,
    pub quality: u8,
}

/// Encoder quality schedule: start, decrement, floor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QualityLadder {
    start: u8,
    step: u8,
    floor: u8,
}

impl Default for QualityLadder {
    fn default() -> Self {
        Self {
            start: JPEG_START_QUALITY,
            step: JPEG_QUALITY_STEP,
            floor: JPEG_MIN_QUALITY,
        }
    }
}

impl QualityLadder {
    /// Values are clamped to 1..=100 with `floor <= start` and a step of at
    /// least 1, so the ladder always terminates.
    pub fn new(start: u8, step: u8, floor: u8) -> Self {
        let start = start.clamp(1, 100);
        Self {
            start,
            step: step.max(1),
            floor: floor.clamp(1, start),
        }
    }

    pub fn start(&self) -> u8 {
        self.start
    }

    /// Every quality the ladder visits, highest first, ending at the floor.
    pub fn qualities(&self) -> impl Iterator<Item = u8> {
        let (step, floor) = (self.step, self.floor);
        std::iter::successors(Some(self.start), move |&q| {
            (q > floor).then(|| q.saturating_sub(step).max(floor))
        })
    }
}

/// Re-encodes images as JPEG under a byte budget by walking a quality ladder.
#[derive(Debug, Clone, Copy, Default)]
pub struct AdaptiveCompressor {
    ladder: QualityLadder,
}

impl AdaptiveCompressor {
    pub fn new(ladder: QualityLadder) -> Self {
        Self { ladder }
    }

    pub fn ladder(&self) -> QualityLadder {
        self.ladder
    }

    /// Decodes once, flattens to RGB and encodes at decreasing quality until
    /// the output fits `target_bytes` or the floor is reached.
    ///
    /// `metadata` is a TIFF-structured EXIF blob attached verbatim to every
    /// attempt. Only undecodable input is an error.
    pub fn compress_to_budget(
        &self,
        original: &[u8],
        target_bytes: usize,
        metadata: Option<&[u8]>,
    ) -> Result<CompressionResult, CompressError> {
        if target_bytes == 0 {
            return Err(CompressError::ZeroBudget);
        }

        let reader = ImageReader::new(Cursor::new(original))
            .with_guessed_format()
            .map_err(|e| CompressError::Undecodable(ImageError::IoError(e)))?;
        let rgb = reader.decode().map_err(CompressError::Undecodable)?.to_rgb8();
        let (width, height) = rgb.dimensions();

        let exif = metadata.filter(|blob| fits_one_segment(blob));

        let mut last = None;
        for quality in self.ladder.qualities() {
            let bytes = encode_jpeg(&rgb, quality, exif)?;
            tracing::debug!(quality, size = bytes.len(), target_bytes, "JPEG encode attempt");
            let fits = bytes.len() <= target_bytes;
            last = Some((bytes, quality));
            if fits {
                break;
            }
        }

        let (bytes, quality) = last.ok_or(CompressError::ZeroBudget)?;
        if bytes.len() > target_bytes {
            tracing::warn!(
                size = bytes.len(),
                target_bytes,
                quality,
                "budget unreachable at the quality floor, returning best effort"
            );
        }

        Ok(CompressionResult {
            bytes,
            width,
            height,
            mime_type: JPEG_MIME_TYPE,
            quality,
        })
    }
}

/// Compresses with the default 92/6/10 ladder.
pub fn compress_to_budget(
    original: &[u8],
    target_bytes: usize,
    metadata: Option<&[u8]>,
) -> Result<CompressionResult, CompressError> {
    AdaptiveCompressor::default().compress_to_budget(original, target_bytes, metadata)
}

fn fits_one_segment(tiff: &[u8]) -> bool {
    if tiff.is_empty() {
        return false;
    }
    if EXIF_HEADER.len() + tiff.len() > MAX_APP1_PAYLOAD {
        tracing::warn!(size = tiff.len(), "EXIF block too large for one APP1 segment, dropping it");
        return false;
    }
    true
}

/// The encoder writes `exif` as an `Exif\0\0` APP1 segment.
fn encode_jpeg(rgb: &RgbImage, quality: u8, exif: Option<&[u8]>) -> Result<Vec<u8>, CompressError> {
    let mut out = Vec::new();
    let mut encoder = JpegEncoder::new_with_quality(&mut out, quality);
    if let Some(blob) = exif {
        if let Err(e) = encoder.set_exif_metadata(blob.to_vec()) {
            tracing::warn!(error = %e, "encoder refused EXIF block, writing without it");
        }
    }
    encoder
        .write_image(rgb.as_raw(), rgb.width(), rgb.height(), ExtendedColorType::Rgb8)
        .map_err(|source| CompressError::Encode { quality, source })?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exif_parser::{embedded_exif, gps_from_bytes};
    use crate::test_support::{noise_rgba, plain_jpeg, png_from_rgba, ExifFixture, TiffOrder};

    #[test]
    fn default_ladder_runs_from_92_to_10() {
        let q: Vec<u8> = QualityLadder::default().qualities().collect();
        assert_eq!(q.first(), Some(&92));
        assert_eq!(q.last(), Some(&10));
        assert!(q.windows(2).all(|w| w[0] - w[1] <= 6 && w[0] > w[1]));
        assert_eq!(q.len(), 15);
    }

    #[test]
    fn ladder_is_clamped() {
        let q: Vec<u8> = QualityLadder::new(200, 0, 250).qualities().collect();
        assert_eq!(q, vec![100]);
        let q: Vec<u8> = QualityLadder::new(50, 30, 10).qualities().collect();
        assert_eq!(q, vec![50, 20, 10]);
    }

    #[test]
    fn generous_budget_keeps_start_quality() {
        let jpeg = plain_jpeg(32, 24);
        let result = compress_to_budget(&jpeg, 10 * 1024 * 1024, None).unwrap();
        assert_eq!(result.quality, 92);
        assert_eq!((result.width, result.height), (32, 24));
        assert_eq!(result.mime_type, "image/jpeg");
    }

    #[test]
    fn unreachable_budget_returns_floor_encode() {
        let png = png_from_rgba(&noise_rgba(64, 64));
        let result = compress_to_budget(&png, 1, None).unwrap();
        assert_eq!(result.quality, 10);
        assert!(result.bytes.len() > 1);
        assert_eq!((result.width, result.height), (64, 64));
        assert_eq!(result.mime_type, JPEG_MIME_TYPE);
    }

    #[test]
    fn tight_budget_lowers_quality_and_fits() {
        let png = png_from_rgba(&noise_rgba(96, 96));
        let high = compress_to_budget(&png, usize::MAX, None).unwrap();
        let floor = AdaptiveCompressor::new(QualityLadder::new(10, 6, 10))
            .compress_to_budget(&png, usize::MAX, None)
            .unwrap();
        let target = (high.bytes.len() + floor.bytes.len()) / 2;

        let result = compress_to_budget(&png, target, None).unwrap();
        assert!(result.bytes.len() <= target);
        assert!(result.quality < 92 && result.quality > 10);
    }

    #[test]
    fn metadata_survives_every_attempt() {
        let blob = ExifFixture::pittsburgh().tiff(TiffOrder::Little);
        let png = png_from_rgba(&noise_rgba(48, 48));
        let result = compress_to_budget(&png, 1, Some(&blob)).unwrap();

        assert_eq!(embedded_exif(&result.bytes), Some(blob));
        assert!(gps_from_bytes(&result.bytes).is_some());
    }

    #[test]
    fn metadata_segment_follows_soi() {
        let blob = ExifFixture::default().tiff(TiffOrder::Big);
        let bytes = encode_jpeg(&RgbImage::new(8, 8), 80, Some(&blob)).unwrap();
        assert_eq!(&bytes[..2], &[0xFF, 0xD8]);
        assert_eq!(embedded_exif(&bytes), Some(blob));

        let bare = encode_jpeg(&RgbImage::new(8, 8), 80, None).unwrap();
        assert!(embedded_exif(&bare).is_none());
        assert!(!fits_one_segment(&[]));
    }

    #[test]
    fn oversized_metadata_is_dropped() {
        let blob = vec![0u8; 70_000];
        let result = compress_to_budget(&plain_jpeg(8, 8), usize::MAX, Some(&blob)).unwrap();
        assert!(embedded_exif(&result.bytes).is_none());
    }

    #[test]
    fn undecodable_input_and_zero_budget_fail() {
        assert!(matches!(
            compress_to_budget(b"not an image", 1000, None),
            Err(CompressError::Undecodable(_))
        ));
        assert!(matches!(
            compress_to_budget(&plain_jpeg(4, 4), 0, None),
            Err(CompressError::ZeroBudget)
        ));
    }
}
