use thiserror::Error;

/// Numeric faults in coordinate math. Callers treat them as "value unusable".
#[derive(Debug, Error, Clone, Copy, PartialEq)]
pub enum CoordinateError {
    #[error("rational {0}/0 has a zero denominator")]
    ZeroDenominator(i64),

    #[error("coordinate out of range: lon={lon}, lat={lat}")]
    OutOfRange { lon: f64, lat: f64 },
}

/// The compressor's only hard failure: bytes that are not an image at all.
#[derive(Debug, Error)]
pub enum CompressError {
    #[error("input is not a decodable image: {0}")]
    Undecodable(#[source] image::ImageError),

    #[error("JPEG encode failed at quality {quality}: {source}")]
    Encode {
        quality: u8,
        #[source]
        source: image::ImageError,
    },

    #[error("target budget must be positive")]
    ZeroBudget,
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("invalid source path: {0}")]
    InvalidPath(String),

    #[error("source file not found: {0}")]
    NotFound(String),

    #[error("IO error reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("record store lock poisoned")]
    Poisoned,

    #[error("snapshot IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("snapshot encoding error: {0}")]
    Encoding(#[from] bincode::Error),
}

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("fetch failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("compression failed: {0}")]
    Compress(#[from] CompressError),

    #[error("store failed: {0}")]
    Store(#[from] StoreError),

    #[error("photo has no GPS metadata; provide lon/lat for it")]
    NoLocation,

    #[error("no stored photo with id {0}")]
    RecordNotFound(String),

    #[error("coordinate out of range: lon={lon}, lat={lat}")]
    InvalidCoordinate { lon: f64, lat: f64 },

    #[error("invalid query: {0}")]
    InvalidQuery(&'static str),
}
