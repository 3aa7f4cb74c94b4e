//! Model and training-data cache shared by the engines

use crate::error::OdometerError;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

const CACHE_DIR_NAME: &str = "odometer-ocr";

/// Per-user cache directory for downloaded engine assets
pub fn cache_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(CACHE_DIR_NAME)
}

/// Return `dir/filename`, downloading it from `url` first if it is not cached
pub fn ensure_downloaded(url: &str, dir: &Path, filename: &str) -> Result<PathBuf, OdometerError> {
    std::fs::create_dir_all(dir).map_err(|e| {
        OdometerError::InitializationError(format!(
            "Failed to create cache directory {:?}: {}",
            dir, e
        ))
    })?;

    let path = dir.join(filename);
    if path.exists() {
        tracing::info!("Using cached {} from {:?}", filename, path);
        return Ok(path);
    }

    tracing::info!("Downloading {} (this may take a moment)...", filename);
    download_file(url, &path)?;
    tracing::info!("Downloaded {} to {:?}", filename, path);

    Ok(path)
}

/// Download to a temporary name and rename, so an interrupted download is
/// never mistaken for a cached file
fn download_file(url: &str, path: &Path) -> Result<(), OdometerError> {
    let response = ureq::get(url).call().map_err(|e| {
        OdometerError::InitializationError(format!("Failed to download {}: {}", url, e))
    })?;

    let buffer = response.into_body().read_to_vec().map_err(|e| {
        OdometerError::InitializationError(format!("Failed to read response body: {}", e))
    })?;

    let partial = path.with_extension("part");
    let mut file = File::create(&partial).map_err(|e| {
        OdometerError::InitializationError(format!("Failed to create {:?}: {}", partial, e))
    })?;
    file.write_all(&buffer).map_err(|e| {
        OdometerError::InitializationError(format!("Failed to write {:?}: {}", partial, e))
    })?;

    std::fs::rename(&partial, path).map_err(|e| {
        OdometerError::InitializationError(format!("Failed to move {:?} into place: {}", path, e))
    })
}
