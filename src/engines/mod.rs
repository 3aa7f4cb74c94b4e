//! Recognition engine implementations
//!
//! Each engine implements `TextRecognizer` and is compiled in behind its own
//! feature flag. `none` is always available and loads nothing.

#[cfg(any(feature = "engine-ocrs", feature = "engine-tesseract"))]
mod download;

#[cfg(feature = "engine-ocrs")]
pub mod ocrs;

#[cfg(feature = "engine-tesseract")]
pub mod tesseract;

use crate::config::Config;
use crate::engine::TextRecognizer;
use crate::error::OdometerError;
use std::sync::Arc;

/// Engine name meaning "run without recognition"
pub const NO_ENGINE: &str = "none";

#[cfg(feature = "engine-ocrs")]
pub const DEFAULT_ENGINE: &str = "ocrs";
#[cfg(all(not(feature = "engine-ocrs"), feature = "engine-tesseract"))]
pub const DEFAULT_ENGINE: &str = "tesseract";
#[cfg(not(any(feature = "engine-ocrs", feature = "engine-tesseract")))]
pub const DEFAULT_ENGINE: &str = NO_ENGINE;

/// Engines compiled into this binary, `none` included
pub fn available() -> Vec<&'static str> {
    let mut names = Vec::new();
    #[cfg(feature = "engine-ocrs")]
    names.push("ocrs");
    #[cfg(feature = "engine-tesseract")]
    names.push("tesseract");
    names.push(NO_ENGINE);
    names
}

/// Build the configured engine, downloading models if needed
///
/// Blocking. Returns `Ok(None)` for `none`.
pub fn load(config: &Config) -> Result<Option<Arc<dyn TextRecognizer>>, OdometerError> {
    match config.engine.as_str() {
        NO_ENGINE => Ok(None),
        #[cfg(feature = "engine-ocrs")]
        "ocrs" => Ok(Some(Arc::new(ocrs::OcrsRecognizer::new()?))),
        #[cfg(feature = "engine-tesseract")]
        "tesseract" => Ok(Some(Arc::new(tesseract::TesseractRecognizer::new(
            config.tessdata_path.as_deref(),
        )?))),
        other => Err(OdometerError::InitializationError(format!(
            "Engine '{}' is not available in this build (available: {})",
            other,
            available().join(", ")
        ))),
    }
}
