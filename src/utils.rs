use std::path::{Path, PathBuf};

const APP_DIR_NAME: &str = "PhotoGeo";

/// Returns the cross-platform directory for application data
pub fn get_app_data_dir() -> PathBuf {
    if cfg!(target_os = "macos") {
        let home_dir = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
        PathBuf::from(home_dir)
            .join("Library")
            .join("Application Support")
            .join(APP_DIR_NAME)
    } else if cfg!(target_os = "windows") {
        match std::env::var("APPDATA") {
            Ok(appdata) => PathBuf::from(appdata).join(APP_DIR_NAME),
            Err(_) => PathBuf::from(".").join(APP_DIR_NAME),
        }
    } else if let Ok(xdg_data_home) = std::env::var("XDG_DATA_HOME") {
        PathBuf::from(xdg_data_home).join(APP_DIR_NAME)
    } else {
        let home_dir = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
        PathBuf::from(home_dir).join(".local").join("share").join(APP_DIR_NAME)
    }
}

/// Ensures the directory exists, creating it if necessary
pub fn ensure_directory_exists(path: &Path) -> Result<(), std::io::Error> {
    if !path.exists() {
        std::fs::create_dir_all(path)?;
    }
    Ok(())
}

/// Default location of the configuration file
pub fn get_config_path() -> PathBuf {
    get_app_data_dir().join("photogeo.ini")
}

/// Default location of the record store snapshot
pub fn get_store_path() -> PathBuf {
    get_app_data_dir().join("records_v1.bin")
}

/// Lowercased extension check against the supported image list
pub fn has_supported_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| crate::constants::SUPPORTED_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_filter_is_case_insensitive() {
        assert!(has_supported_extension(Path::new("a/IMG_0001.JPG")));
        assert!(has_supported_extension(Path::new("b.png")));
        assert!(!has_supported_extension(Path::new("notes.txt")));
        assert!(!has_supported_extension(Path::new("no_extension")));
    }

    #[test]
    fn default_paths_live_in_app_dir() {
        let dir = get_app_data_dir();
        assert!(get_config_path().starts_with(&dir));
        assert!(get_store_path().starts_with(&dir));
    }
}
