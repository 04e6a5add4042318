// Storage budget
pub const DEFAULT_MAX_IMAGE_SIZE_BYTES: usize = 1_048_576;
pub const DEFAULT_SEARCH_RADIUS_M: u32 = 200;

// JPEG quality ladder: 92, 86, ..., 14, then the floor
pub const JPEG_START_QUALITY: u8 = 92;
pub const JPEG_QUALITY_STEP: u8 = 6;
pub const JPEG_MIN_QUALITY: u8 = 10;
pub const JPEG_MIME_TYPE: &str = "image/jpeg";

// Container markers
pub const EXIF_HEADER: &[u8] = b"Exif\0\0";
pub const XMP_OPEN_TAG: &[u8] = b"<x:xmpmeta";
pub const XMP_CLOSE_TAG: &[u8] = b"</x:xmpmeta>";
pub const QUICKTIME_LOCATION_KEY: &[u8] = b"com.apple.quicktime.location.ISO6709";
// Bytes inspected after the QuickTime key, the key included
pub const QUICKTIME_SCAN_WINDOW: usize = 512;

// EXIF timestamps are "YYYY:MM:DD HH:MM:SS"; suffixes past 19 chars are ignored
pub const EXIF_DATETIME_FORMAT: &str = "%Y:%m:%d %H:%M:%S";
pub const EXIF_DATETIME_LEN: usize = 19;

// Mean Earth radius (IUGG) used by the haversine radius search
pub const EARTH_RADIUS_M: f64 = 6_371_008.8;

// Formats the compressor can decode; HEIC/HEIF only go through `inspect`
pub const SUPPORTED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "tif", "tiff", "webp", "bmp", "gif"];
