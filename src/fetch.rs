use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use crate::error::FetchError;

/// Source of raw image bytes keyed by a path.
pub trait ByteFetcher: Send + Sync {
    fn fetch(&self, path: &str) -> Result<Vec<u8>, FetchError>;
}

/// Reads files below a fixed base directory.
#[derive(Debug, Clone)]
pub struct LocalFetcher {
    base_path: PathBuf,
}

impl LocalFetcher {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    /// Maps a relative key to a path inside the base directory. Absolute
    /// paths and `..` components are rejected.
    fn resolve(&self, key: &str) -> Result<PathBuf, FetchError> {
        let key = key.trim();
        if key.is_empty() {
            return Err(FetchError::InvalidPath("empty path".to_string()));
        }

        let relative = Path::new(key);
        for component in relative.components() {
            match component {
                Component::Normal(_) | Component::CurDir => {}
                Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                    return Err(FetchError::InvalidPath(key.to_string()));
                }
            }
        }
        Ok(self.base_path.join(relative))
    }
}

impl ByteFetcher for LocalFetcher {
    fn fetch(&self, path: &str) -> Result<Vec<u8>, FetchError> {
        let full = self.resolve(path)?;
        match std::fs::read(&full) {
            Ok(bytes) => {
                tracing::debug!(path, size = bytes.len(), "fetched source bytes");
                Ok(bytes)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Err(FetchError::NotFound(path.to_string())),
            Err(source) => Err(FetchError::Io {
                path: path.to_string(),
                source,
            }),
        }
    }
}
