#![allow(dead_code)]

#[path = "../../src/test_support.rs"]
pub mod test_support;

use std::path::Path;

pub fn tempdir() -> tempfile::TempDir {
    tempfile::Builder::new()
        .prefix("photogeo-test")
        .tempdir()
        .expect("create temp dir")
}

pub fn write(dir: &Path, relative: &str, bytes: &[u8]) {
    let path = dir.join(relative);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).expect("create parent dir");
    }
    std::fs::write(path, bytes).expect("write fixture");
}
