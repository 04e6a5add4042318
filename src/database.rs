use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;
use std::sync::{Arc, RwLock};

use crate::error::StoreError;
use crate::exif_parser::FlatMetadata;
use crate::geo::GeoCoordinate;

const SNAPSHOT_VERSION: u32 = 1;

/// A stored photo: compressed bytes plus resolved location and metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhotoRecord {
    pub id: String,
    pub key: String,
    pub location: GeoCoordinate,
    pub mime_type: String,
    pub size_bytes: usize,
    pub width: u32,
    pub height: u32,
    pub metadata: FlatMetadata,
    pub data: Vec<u8>,
    pub captured_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Record without the image payload, for listings and JSON output.
#[derive(Debug, Clone, Serialize)]
pub struct RecordSummary {
    pub id: String,
    pub key: String,
    pub lon: f64,
    pub lat: f64,
    pub mime_type: String,
    pub size_bytes: usize,
    pub width: u32,
    pub height: u32,
    pub captured_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distance_m: Option<f64>,
}

impl PhotoRecord {
    pub fn summary(&self) -> RecordSummary {
        RecordSummary {
            id: self.id.clone(),
            key: self.key.clone(),
            lon: self.location.lon,
            lat: self.location.lat,
            mime_type: self.mime_type.clone(),
            size_bytes: self.size_bytes,
            width: self.width,
            height: self.height,
            captured_at: self.captured_at,
            created_at: self.created_at,
            distance_m: None,
        }
    }
}

/// Storage seam for ingested photos.
pub trait RecordStore: Send + Sync {
    /// Inserts, replacing any record with the same id.
    fn insert(&self, record: PhotoRecord) -> Result<(), StoreError>;

    fn get(&self, id: &str) -> Result<Option<PhotoRecord>, StoreError>;

    /// Records stored under `key`, newest first.
    fn find_by_key(&self, key: &str) -> Result<Vec<PhotoRecord>, StoreError>;

    /// Records within `radius_m` meters of `center` (great-circle distance),
    /// nearest first.
    fn find_within(&self, center: &GeoCoordinate, radius_m: f64) -> Result<Vec<PhotoRecord>, StoreError>;

    fn count(&self) -> Result<usize, StoreError>;
}

#[derive(Serialize, Deserialize)]
struct Snapshot {
    version: u32,
    records: Vec<PhotoRecord>,
}

/// In-memory record store with bincode snapshots.
#[derive(Clone, Default)]
pub struct Database {
    records: Arc<RwLock<Vec<PhotoRecord>>>,
}

impl Database {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn save_to_disk(&self, path: &Path) -> Result<(), StoreError> {
        let records = self.records.read().map_err(|_| StoreError::Poisoned)?;
        let snapshot = Snapshot {
            version: SNAPSHOT_VERSION,
            records: records.clone(),
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            crate::utils::ensure_directory_exists(parent)?;
        }

        let file = File::create(path)?;
        bincode::serialize_into(BufWriter::new(file), &snapshot)?;
        tracing::debug!(path = %path.display(), records = snapshot.records.len(), "snapshot saved");
        Ok(())
    }

    /// Replaces the in-memory records with a snapshot. Returns `Ok(false)`
    /// when there is no usable snapshot (missing, corrupt, other version).
    pub fn load_from_disk(&self, path: &Path) -> Result<bool, StoreError> {
        if !path.exists() {
            return Ok(false);
        }

        let file = File::open(path)?;
        let snapshot: Snapshot = match bincode::deserialize_from(BufReader::new(file)) {
            Ok(s) => s,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "snapshot corrupted or incompatible, ignoring");
                return Ok(false);
            }
        };

        if snapshot.version != SNAPSHOT_VERSION {
            tracing::warn!(
                found = snapshot.version,
                expected = SNAPSHOT_VERSION,
                "snapshot version mismatch, ignoring"
            );
            return Ok(false);
        }

        let count = snapshot.records.len();
        *self.records.write().map_err(|_| StoreError::Poisoned)? = snapshot.records;
        tracing::info!(path = %path.display(), records = count, "snapshot loaded");
        Ok(true)
    }
}

impl RecordStore for Database {
    fn insert(&self, record: PhotoRecord) -> Result<(), StoreError> {
        let mut records = self.records.write().map_err(|_| StoreError::Poisoned)?;
        match records.iter_mut().find(|r| r.id == record.id) {
            Some(existing) => *existing = record,
            None => records.push(record),
        }
        Ok(())
    }

    fn get(&self, id: &str) -> Result<Option<PhotoRecord>, StoreError> {
        let records = self.records.read().map_err(|_| StoreError::Poisoned)?;
        Ok(records.iter().find(|r| r.id == id).cloned())
    }

    fn find_by_key(&self, key: &str) -> Result<Vec<PhotoRecord>, StoreError> {
        let records = self.records.read().map_err(|_| StoreError::Poisoned)?;
        let mut found: Vec<PhotoRecord> = records.iter().filter(|r| r.key == key).cloned().collect();
        found.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(found)
    }

    fn find_within(&self, center: &GeoCoordinate, radius_m: f64) -> Result<Vec<PhotoRecord>, StoreError> {
        let records = self.records.read().map_err(|_| StoreError::Poisoned)?;
        let mut found: Vec<(f64, PhotoRecord)> = records
            .iter()
            .map(|r| (center.distance_m(&r.location), r))
            .filter(|(d, _)| *d <= radius_m)
            .map(|(d, r)| (d, r.clone()))
            .collect();
        found.sort_by(|a, b| a.0.total_cmp(&b.0));
        Ok(found.into_iter().map(|(_, r)| r).collect())
    }

    fn count(&self) -> Result<usize, StoreError> {
        Ok(self.records.read().map_err(|_| StoreError::Poisoned)?.len())
    }
}
