use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use crate::constants::{
    DEFAULT_MAX_IMAGE_SIZE_BYTES, DEFAULT_SEARCH_RADIUS_M, JPEG_MIN_QUALITY, JPEG_QUALITY_STEP, JPEG_START_QUALITY,
};
use crate::image_processing::{AdaptiveCompressor, QualityLadder};
use crate::pipeline::GpsFallbackPipeline;

const ENV_PREFIX: &str = "PHOTOGEO_";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    pub max_image_size_bytes: usize,
    pub default_search_radius_m: u32,
    pub jpeg_start_quality: u8,
    pub jpeg_quality_step: u8,
    pub jpeg_min_quality: u8,
    /// Base directory the local fetcher resolves relative paths against
    pub source_base_path: PathBuf,
    /// Record store snapshot file
    pub store_path: PathBuf,
    pub log_level: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            max_image_size_bytes: DEFAULT_MAX_IMAGE_SIZE_BYTES,
            default_search_radius_m: DEFAULT_SEARCH_RADIUS_M,
            jpeg_start_quality: JPEG_START_QUALITY,
            jpeg_quality_step: JPEG_QUALITY_STEP,
            jpeg_min_quality: JPEG_MIN_QUALITY,
            source_base_path: PathBuf::from("."),
            store_path: crate::utils::get_store_path(),
            log_level: "info".to_string(),
        }
    }
}

fn parse_into<T: std::str::FromStr>(slot: &mut T, key: &str, value: &str) {
    match value.parse::<T>() {
        Ok(v) => *slot = v,
        Err(_) => tracing::warn!(key, value, "ignoring invalid setting"),
    }
}

impl Settings {
    /// Loads a config file, then applies `PHOTOGEO_*` overrides.
    pub fn load_from(config_path: &Path) -> Result<Self> {
        let mut settings = Self::read_file(config_path)?;
        settings.apply_overrides(|key| std::env::var(key).ok());
        Ok(settings)
    }

    /// Reads `key = value` lines; `#` starts a comment line. A missing file
    /// yields the defaults.
    pub fn read_file(config_path: &Path) -> Result<Self> {
        let mut settings = Settings::default();
        if !config_path.exists() {
            return Ok(settings);
        }

        let file = File::open(config_path)
            .with_context(|| format!("Failed to open config file {}", config_path.display()))?;
        let reader = BufReader::new(file);
        let mut config_map = HashMap::new();

        for line in reader.lines() {
            let line = line.context("Failed to read line from config")?;
            let line = line.trim();
            if line.starts_with('#') || line.is_empty() {
                continue;
            }
            if let Some((key, value)) = line.split_once('=') {
                config_map.insert(key.trim().to_string(), value.trim().trim_matches('"').to_string());
            }
        }

        for (key, value) in &config_map {
            settings.set(key, value);
        }
        Ok(settings)
    }

    /// Applies `PHOTOGEO_<KEY>` values from `lookup` over the current values.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        for key in Self::KEYS {
            let var = format!("{ENV_PREFIX}{}", key.to_ascii_uppercase());
            if let Some(value) = lookup(&var) {
                self.set(key, value.trim());
            }
        }
    }

    const KEYS: [&'static str; 8] = [
        "max_image_size_bytes",
        "default_search_radius_m",
        "jpeg_start_quality",
        "jpeg_quality_step",
        "jpeg_min_quality",
        "source_base_path",
        "store_path",
        "log_level",
    ];

    fn set(&mut self, key: &str, value: &str) {
        match key {
            "max_image_size_bytes" => parse_into(&mut self.max_image_size_bytes, key, value),
            "default_search_radius_m" => parse_into(&mut self.default_search_radius_m, key, value),
            "jpeg_start_quality" => parse_into(&mut self.jpeg_start_quality, key, value),
            "jpeg_quality_step" => parse_into(&mut self.jpeg_quality_step, key, value),
            "jpeg_min_quality" => parse_into(&mut self.jpeg_min_quality, key, value),
            "source_base_path" => self.source_base_path = PathBuf::from(value),
            "store_path" => self.store_path = PathBuf::from(value),
            "log_level" => self.log_level = value.to_string(),
            _ => tracing::debug!(key, "unknown setting"),
        }
    }

    pub fn save_to(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            crate::utils::ensure_directory_exists(parent).context("Creating config directory")?;
        }

        let mut content = String::new();
        content.push_str("# PhotoGeo Configuration File\n");
        content.push_str(&format!("max_image_size_bytes = {}\n", self.max_image_size_bytes));
        content.push_str(&format!("default_search_radius_m = {}\n", self.default_search_radius_m));
        content.push_str(&format!("jpeg_start_quality = {}\n", self.jpeg_start_quality));
        content.push_str(&format!("jpeg_quality_step = {}\n", self.jpeg_quality_step));
        content.push_str(&format!("jpeg_min_quality = {}\n", self.jpeg_min_quality));
        content.push_str(&format!("source_base_path = \"{}\"\n", self.source_base_path.display()));
        content.push_str(&format!("store_path = \"{}\"\n", self.store_path.display()));
        content.push_str(&format!("log_level = {}\n", self.log_level));

        std::fs::write(config_path, content).context("Failed to write to config file")?;
        Ok(())
    }

    pub fn quality_ladder(&self) -> QualityLadder {
        QualityLadder::new(self.jpeg_start_quality, self.jpeg_quality_step, self.jpeg_min_quality)
    }

    pub fn compressor(&self) -> AdaptiveCompressor {
        AdaptiveCompressor::new(self.quality_ladder())
    }

    pub fn pipeline(&self) -> GpsFallbackPipeline {
        GpsFallbackPipeline::default()
    }
}
