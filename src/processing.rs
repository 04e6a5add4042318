use chrono::Utc;
use ignore::Walk;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use uuid::Uuid;

use crate::database::{PhotoRecord, RecordStore};
use crate::error::IngestError;
use crate::exif_parser::{embedded_exif, flatten_metadata};
use crate::fetch::ByteFetcher;
use crate::geo::GeoCoordinate;
use crate::image_processing::AdaptiveCompressor;
use crate::pipeline::GpsFallbackPipeline;
use crate::settings::Settings;
use crate::utils::has_supported_extension;

/// One photo to ingest. Manual coordinates apply only when both are given.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IngestRequest {
    pub key: String,
    pub path: String,
    pub lon: Option<f64>,
    pub lat: Option<f64>,
}

/// Lookup by key, or by radius around a point.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchQuery {
    pub key: Option<String>,
    pub lon: Option<f64>,
    pub lat: Option<f64>,
    pub radius_m: Option<u32>,
}

fn manual_location(lon: Option<f64>, lat: Option<f64>) -> Result<Option<GeoCoordinate>, IngestError> {
    match (lon, lat) {
        (Some(lon), Some(lat)) => GeoCoordinate::new(lon, lat)
            .map(Some)
            .ok_or(IngestError::InvalidCoordinate { lon, lat }),
        _ => Ok(None),
    }
}

/// Fetch, compress, resolve and store photos.
pub struct Ingestor<F, S> {
    fetcher: F,
    store: S,
    compressor: AdaptiveCompressor,
    pipeline: GpsFallbackPipeline,
    max_image_size_bytes: usize,
    default_search_radius_m: u32,
}

impl<F: ByteFetcher, S: RecordStore> Ingestor<F, S> {
    pub fn new(settings: &Settings, fetcher: F, store: S) -> Self {
        Self {
            fetcher,
            store,
            compressor: settings.compressor(),
            pipeline: settings.pipeline(),
            max_image_size_bytes: settings.max_image_size_bytes,
            default_search_radius_m: settings.default_search_radius_m,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn ingest(&self, request: &IngestRequest) -> Result<PhotoRecord, IngestError> {
        let bytes = self.fetcher.fetch(&request.path)?;
        self.ingest_bytes(&request.key, &bytes, request.lon, request.lat)
    }

    /// Compresses the original under the size budget (keeping its EXIF
    /// block), resolves location and capture time, and stores the record.
    /// Manual coordinates win over metadata; neither is `NoLocation`.
    pub fn ingest_bytes(
        &self,
        key: &str,
        original: &[u8],
        lon: Option<f64>,
        lat: Option<f64>,
    ) -> Result<PhotoRecord, IngestError> {
        let manual = manual_location(lon, lat)?;

        let exif_blob = embedded_exif(original);
        let compressed = self
            .compressor
            .compress_to_budget(original, self.max_image_size_bytes, exif_blob.as_deref())?;
        let metadata = flatten_metadata(&compressed.bytes);
        let resolution = self
            .pipeline
            .resolve_location_and_timestamp(original, Some(&compressed.bytes));

        let location = match (manual, resolution.coordinate()) {
            (Some(manual), _) => manual,
            (None, Some(found)) => found,
            (None, None) => return Err(IngestError::NoLocation),
        };

        let record = PhotoRecord {
            id: Uuid::new_v4().to_string(),
            key: key.to_string(),
            location,
            mime_type: compressed.mime_type.to_string(),
            size_bytes: compressed.bytes.len(),
            width: compressed.width,
            height: compressed.height,
            metadata,
            data: compressed.bytes,
            captured_at: resolution.captured_at,
            created_at: Utc::now(),
        };
        self.store.insert(record.clone())?;

        tracing::info!(
            id = %record.id,
            key,
            %location,
            size = record.size_bytes,
            manual = manual.is_some(),
            "photo stored"
        );
        Ok(record)
    }

    pub fn get(&self, id: &str) -> Result<PhotoRecord, IngestError> {
        self.store
            .get(id)?
            .ok_or_else(|| IngestError::RecordNotFound(id.to_string()))
    }

    pub fn search(&self, query: &SearchQuery) -> Result<Vec<PhotoRecord>, IngestError> {
        if let Some(key) = query.key.as_deref().filter(|k| !k.trim().is_empty()) {
            return Ok(self.store.find_by_key(key)?);
        }

        let center = manual_location(query.lon, query.lat)?
            .ok_or(IngestError::InvalidQuery("provide a key or both lon and lat"))?;
        let radius = query.radius_m.unwrap_or(self.default_search_radius_m);
        Ok(self.store.find_within(&center, f64::from(radius))?)
    }

    /// Ingests every supported image below `folder` in parallel. Bytes are
    /// read through the fetcher with paths relative to `folder`, so the
    /// fetcher must be rooted there. `key` defaults to that relative path.
    pub fn scan_folder(&self, folder: &Path, key: Option<&str>) -> anyhow::Result<ProcessingStats> {
        if !folder.is_dir() {
            anyhow::bail!("Photos directory not found: {}", folder.display());
        }
        tracing::info!(folder = %folder.display(), "scanning photos directory");

        let files: Vec<PathBuf> = Walk::new(folder)
            .filter_map(|entry| entry.ok())
            .filter(|e| e.file_type().is_some_and(|ft| ft.is_file()))
            .map(|e| e.into_path())
            .filter(|p| has_supported_extension(p))
            .collect();

        let start_time = Instant::now();
        let outcomes: Vec<Outcome> = files
            .par_iter()
            .map(|path| {
                let relative = path.strip_prefix(folder).unwrap_or(path).to_string_lossy().to_string();
                let key = key.unwrap_or(&relative);
                let bytes = match self.fetcher.fetch(&relative) {
                    Ok(bytes) => bytes,
                    Err(e) => {
                        tracing::warn!(path = %path.display(), error = %e, "unreadable file");
                        return Outcome::Failed;
                    }
                };
                match self.ingest_bytes(key, &bytes, None, None) {
                    Ok(_) => Outcome::Stored,
                    Err(IngestError::NoLocation) => {
                        tracing::debug!(path = %path.display(), "no GPS data");
                        Outcome::NoGps
                    }
                    Err(e) => {
                        tracing::warn!(path = %path.display(), error = %e, "ingest failed");
                        Outcome::Failed
                    }
                }
            })
            .collect();

        let stats = ProcessingStats {
            total_files: files.len(),
            stored: outcomes.iter().filter(|o| **o == Outcome::Stored).count(),
            no_gps: outcomes.iter().filter(|o| **o == Outcome::NoGps).count(),
            failed: outcomes.iter().filter(|o| **o == Outcome::Failed).count(),
            elapsed: start_time.elapsed(),
        };
        tracing::info!(%stats, "scan finished");
        Ok(stats)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Stored,
    NoGps,
    Failed,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ProcessingStats {
    pub total_files: usize,
    pub stored: usize,
    pub no_gps: usize,
    pub failed: usize,
    pub elapsed: Duration,
}

impl ProcessingStats {
    pub fn avg_time_per_file_ms(&self) -> f64 {
        if self.total_files == 0 {
            return 0.0;
        }
        self.elapsed.as_secs_f64() * 1000.0 / self.total_files as f64
    }
}

impl fmt::Display for ProcessingStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} files: {} stored, {} without GPS, {} failed in {:.2}s ({:.1} ms/file)",
            self.total_files,
            self.stored,
            self.no_gps,
            self.failed,
            self.elapsed.as_secs_f64(),
            self.avg_time_per_file_ms()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::Database;
    use crate::error::FetchError;
    use crate::test_support::{jpeg_with_exif, plain_jpeg, ExifFixture, TiffOrder};
    use std::collections::HashMap;

    struct MemoryFetcher(HashMap<String, Vec<u8>>);

    impl ByteFetcher for MemoryFetcher {
        fn fetch(&self, path: &str) -> Result<Vec<u8>, FetchError> {
            self.0.get(path).cloned().ok_or_else(|| FetchError::NotFound(path.to_string()))
        }
    }

    fn fixtures() -> HashMap<String, Vec<u8>> {
        HashMap::from([
            (
                "gps.jpg".to_string(),
                jpeg_with_exif(&ExifFixture::pittsburgh().tiff(TiffOrder::Little)),
            ),
            ("plain.jpg".to_string(), plain_jpeg(16, 16)),
            ("text.txt".to_string(), b"hello".to_vec()),
        ])
    }

    fn ingestor() -> Ingestor<MemoryFetcher, Database> {
        Ingestor::new(&Settings::default(), MemoryFetcher(fixtures()), Database::new())
    }

    fn request(path: &str, lon: Option<f64>, lat: Option<f64>) -> IngestRequest {
        IngestRequest {
            key: "trip".to_string(),
            path: path.to_string(),
            lon,
            lat,
        }
    }

    #[test]
    fn exif_location_is_stored_with_metadata() {
        let ing = ingestor();
        let record = ing.ingest(&request("gps.jpg", None, None)).unwrap();
        assert!((record.location.lat - 40.4461).abs() < 1e-3);
        assert_eq!(record.mime_type, "image/jpeg");
        assert_eq!(record.size_bytes, record.data.len());
        assert_eq!(record.metadata.get("0th.Make").map(String::as_str), Some("FixtureCam"));
        assert!(record.captured_at.is_some());
        assert_eq!(ing.store().count().unwrap(), 1);
    }

    #[test]
    fn manual_coordinates_win() {
        let ing = ingestor();
        let record = ing.ingest(&request("gps.jpg", Some(2.35), Some(48.85))).unwrap();
        assert_eq!((record.location.lon, record.location.lat), (2.35, 48.85));

        let record = ing.ingest(&request("plain.jpg", Some(-1.0), Some(1.0))).unwrap();
        assert_eq!(record.location.lon, -1.0);
    }

    #[test]
    fn missing_location_and_bad_input() {
        let ing = ingestor();
        assert!(matches!(ing.ingest(&request("plain.jpg", None, None)), Err(IngestError::NoLocation)));
        assert!(matches!(ing.ingest(&request("plain.jpg", Some(1.0), None)), Err(IngestError::NoLocation)));
        assert!(matches!(
            ing.ingest(&request("plain.jpg", Some(200.0), Some(0.0))),
            Err(IngestError::InvalidCoordinate { .. })
        ));
        assert!(matches!(ing.ingest(&request("text.txt", None, None)), Err(IngestError::Compress(_))));
        assert!(matches!(ing.ingest(&request("nope.jpg", None, None)), Err(IngestError::Fetch(_))));
        assert_eq!(ing.store().count().unwrap(), 0);
    }

    #[test]
    fn search_by_key_or_radius() {
        let ing = ingestor();
        ing.ingest(&request("gps.jpg", None, None)).unwrap();

        let by_key = ing
            .search(&SearchQuery {
                key: Some("trip".into()),
                ..SearchQuery::default()
            })
            .unwrap();
        assert_eq!(by_key.len(), 1);

        let near = SearchQuery {
            lon: Some(-79.9822),
            lat: Some(40.4462),
            ..SearchQuery::default()
        };
        assert_eq!(ing.search(&near).unwrap().len(), 1);

        let far = SearchQuery {
            lon: Some(-79.0),
            lat: Some(40.0),
            radius_m: Some(1_000),
            ..SearchQuery::default()
        };
        assert!(ing.search(&far).unwrap().is_empty());

        assert!(matches!(ing.search(&SearchQuery::default()), Err(IngestError::InvalidQuery(_))));
    }

    #[test]
    fn get_returns_stored_record_or_not_found() {
        let ing = ingestor();
        let stored = ing.ingest(&request("gps.jpg", None, None)).unwrap();

        let fetched = ing.get(&stored.id).unwrap();
        assert_eq!(fetched, stored);
        assert_eq!(fetched.summary().id, stored.id);
        assert!(matches!(ing.get("no-such-id"), Err(IngestError::RecordNotFound(id)) if id == "no-such-id"));
    }

    #[test]
    fn scan_reads_through_the_fetcher() {
        // On disk both files are junk; the fetcher serves the real images
        let dir = tempfile::Builder::new().prefix("photogeo-scan").tempdir().unwrap();
        std::fs::write(dir.path().join("gps.jpg"), b"junk").unwrap();
        std::fs::write(dir.path().join("plain.jpg"), b"junk").unwrap();
        std::fs::write(dir.path().join("missing.jpg"), b"junk").unwrap();

        let ing = ingestor();
        let stats = ing.scan_folder(dir.path(), None).unwrap();
        assert_eq!((stats.total_files, stats.stored, stats.no_gps, stats.failed), (3, 1, 1, 1));
        assert_eq!(ing.store().find_by_key("gps.jpg").unwrap().len(), 1);
    }

    #[test]
    fn stats_average() {
        let stats = ProcessingStats {
            total_files: 4,
            elapsed: Duration::from_millis(200),
            ..ProcessingStats::default()
        };
        assert!((stats.avg_time_per_file_ms() - 50.0).abs() < 1e-9);
        assert_eq!(ProcessingStats::default().avg_time_per_file_ms(), 0.0);
    }
}
