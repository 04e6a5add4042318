//! Photo geolocation pipeline: GPS and capture-time extraction across EXIF,
//! XMP and QuickTime metadata, plus JPEG re-encoding to a byte budget.

pub mod constants;
pub mod database;
pub mod error;
pub mod exif_parser;
pub mod fetch;
pub mod geo;
pub mod image_processing;
pub mod pipeline;
pub mod processing;
pub mod settings;
pub mod utils;

#[cfg(test)]
pub(crate) mod test_support;

pub use database::{Database, PhotoRecord, RecordStore, RecordSummary};
pub use error::{CompressError, CoordinateError, FetchError, IngestError, StoreError};
pub use fetch::{ByteFetcher, LocalFetcher};
pub use geo::GeoCoordinate;
pub use image_processing::{compress_to_budget, AdaptiveCompressor, CompressionResult, QualityLadder};
pub use pipeline::{resolve_location_and_timestamp, GpsFallbackPipeline, LocationSource, Resolution};
pub use processing::{IngestRequest, Ingestor, ProcessingStats, SearchQuery};
pub use settings::Settings;
