//! Ordered GPS fallback chain plus capture timestamp resolution.

use serde::Serialize;
use std::fmt;

use crate::exif_parser::datetime::{timestamp_from_tags, timestamp_from_text};
use crate::exif_parser::{
    decode_embedded, gps_from_bytes, quicktime_gps_from_bytes, text_gps_from_bytes, text_tags,
    xmp_gps_from_bytes, CaptureTimestamp,
};
use crate::geo::GeoCoordinate;

/// One way of pulling a coordinate out of raw image bytes.
pub trait LocationSource: Send + Sync {
    fn name(&self) -> &'static str;

    /// `None` covers both "not present" and "present but unusable".
    fn try_resolve(&self, bytes: &[u8]) -> Option<GeoCoordinate>;
}

pub struct ExifGpsSource;
pub struct TextTagSource;
pub struct XmpSource;
pub struct QuickTimeSource;

impl LocationSource for ExifGpsSource {
    fn name(&self) -> &'static str {
        "exif"
    }

    fn try_resolve(&self, bytes: &[u8]) -> Option<GeoCoordinate> {
        gps_from_bytes(bytes)
    }
}

impl LocationSource for TextTagSource {
    fn name(&self) -> &'static str {
        "exif-text"
    }

    fn try_resolve(&self, bytes: &[u8]) -> Option<GeoCoordinate> {
        text_gps_from_bytes(bytes)
    }
}

impl LocationSource for XmpSource {
    fn name(&self) -> &'static str {
        "xmp"
    }

    fn try_resolve(&self, bytes: &[u8]) -> Option<GeoCoordinate> {
        xmp_gps_from_bytes(bytes)
    }
}

impl LocationSource for QuickTimeSource {
    fn name(&self) -> &'static str {
        "quicktime"
    }

    fn try_resolve(&self, bytes: &[u8]) -> Option<GeoCoordinate> {
        quicktime_gps_from_bytes(bytes)
    }
}

/// Which input a coordinate came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceImage {
    Original,
    Derivative,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ResolvedLocation {
    pub coordinate: GeoCoordinate,
    pub source: SourceImage,
    pub stage: &'static str,
}

impl fmt::Display for ResolvedLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} via {} ({:?})", self.coordinate, self.stage, self.source)
    }
}

/// Location and timestamp for one image; either may be absent.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Resolution {
    pub location: Option<ResolvedLocation>,
    pub captured_at: Option<CaptureTimestamp>,
}

impl Resolution {
    pub fn coordinate(&self) -> Option<GeoCoordinate> {
        self.location.map(|l| l.coordinate)
    }
}

/// Resolver stages tried in order; the first success wins.
pub struct GpsFallbackPipeline {
    original: Vec<Box<dyn LocationSource>>,
    derivative: Vec<Box<dyn LocationSource>>,
}

impl Default for GpsFallbackPipeline {
    /// Structured EXIF, tolerant EXIF, XMP, QuickTime on the original; both
    /// EXIF paths on the derivative.
    fn default() -> Self {
        Self::builder()
            .original(ExifGpsSource)
            .original(TextTagSource)
            .original(XmpSource)
            .original(QuickTimeSource)
            .derivative(ExifGpsSource)
            .derivative(TextTagSource)
            .build()
    }
}

#[derive(Default)]
pub struct PipelineBuilder {
    original: Vec<Box<dyn LocationSource>>,
    derivative: Vec<Box<dyn LocationSource>>,
}

impl PipelineBuilder {
    pub fn original(mut self, source: impl LocationSource + 'static) -> Self {
        self.original.push(Box::new(source));
        self
    }

    pub fn derivative(mut self, source: impl LocationSource + 'static) -> Self {
        self.derivative.push(Box::new(source));
        self
    }

    pub fn build(self) -> GpsFallbackPipeline {
        GpsFallbackPipeline {
            original: self.original,
            derivative: self.derivative,
        }
    }
}

fn first_match(
    sources: &[Box<dyn LocationSource>],
    bytes: &[u8],
    image: SourceImage,
) -> Option<ResolvedLocation> {
    sources.iter().find_map(|source| {
        let found = source.try_resolve(bytes);
        tracing::debug!(stage = source.name(), ?image, found = found.is_some(), "GPS stage");
        found.map(|coordinate| ResolvedLocation {
            coordinate,
            source: image,
            stage: source.name(),
        })
    })
}

impl GpsFallbackPipeline {
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::default()
    }

    pub fn stage_names(&self) -> Vec<&'static str> {
        self.original.iter().map(|s| s.name()).collect()
    }

    pub fn resolve_location(&self, original: &[u8], derivative: Option<&[u8]>) -> Option<ResolvedLocation> {
        first_match(&self.original, original, SourceImage::Original)
            .or_else(|| first_match(&self.derivative, derivative?, SourceImage::Derivative))
    }

    pub fn resolve_location_and_timestamp(&self, original: &[u8], derivative: Option<&[u8]>) -> Resolution {
        let location = self.resolve_location(original, derivative);
        match &location {
            Some(found) => tracing::info!(%found, "GPS resolved"),
            None => tracing::warn!("no GPS coordinate in any metadata source"),
        }
        Resolution {
            location,
            captured_at: resolve_timestamp(original, derivative),
        }
    }
}

/// Structured decode of the original, then its text rendering, then the
/// derivative's structured decode.
pub fn resolve_timestamp(original: &[u8], derivative: Option<&[u8]>) -> Option<CaptureTimestamp> {
    decode_embedded(original)
        .and_then(|tags| timestamp_from_tags(&tags))
        .or_else(|| text_tags(original).and_then(|tags| timestamp_from_text(&tags)))
        .or_else(|| decode_embedded(derivative?).and_then(|tags| timestamp_from_tags(&tags)))
}

/// Runs the default pipeline.
pub fn resolve_location_and_timestamp(original: &[u8], derivative: Option<&[u8]>) -> Resolution {
    GpsFallbackPipeline::default().resolve_location_and_timestamp(original, derivative)
}
