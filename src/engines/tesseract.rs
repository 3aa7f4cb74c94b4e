//! Tesseract engine implementation
//!
//! Statically linked Tesseract via `tesseract-static`. Better on noisy phone
//! photos than ocrs, and the only engine that can restrict its alphabet.
//! Downloads tessdata on first use unless a tessdata directory is configured.

use super::download;
use crate::engine::{ProgressReporter, RecognitionConfig, TextRecognizer};
use crate::error::OdometerError;
use async_trait::async_trait;
use std::path::Path;
use tesseract_static::tesseract::Tesseract;

const LANGUAGE: &str = "eng";

/// Tesseract recognizer; a fresh instance is created per call
pub struct TesseractRecognizer {
    tessdata_path: String,
}

impl TesseractRecognizer {
    /// Resolve tessdata and check that Tesseract can start with it
    ///
    /// Blocking: call from a blocking thread.
    pub fn new(tessdata_dir: Option<&Path>) -> Result<Self, OdometerError> {
        let tessdata_path = match tessdata_dir {
            Some(dir) => path_to_string(dir)?,
            None => download_tessdata()?,
        };

        Tesseract::new(Some(&tessdata_path), Some(LANGUAGE)).map_err(|e| {
            OdometerError::InitializationError(format!("Failed to initialize Tesseract: {}", e))
        })?;

        tracing::info!(
            "Tesseract engine initialized (tessdata: {}, language: {})",
            tessdata_path,
            LANGUAGE
        );

        Ok(Self { tessdata_path })
    }
}

fn download_tessdata() -> Result<String, OdometerError> {
    let dir = download::cache_dir().join("tessdata");
    let filename = format!("{}.traineddata", LANGUAGE);
    // tessdata_fast: smaller download, plenty for digits
    let url = format!(
        "https://github.com/tesseract-ocr/tessdata_fast/raw/main/{}",
        filename
    );
    download::ensure_downloaded(&url, &dir, &filename)?;
    path_to_string(&dir)
}

fn path_to_string(path: &Path) -> Result<String, OdometerError> {
    path.to_str().map(str::to_string).ok_or_else(|| {
        OdometerError::InitializationError(format!("Invalid tessdata path {:?}", path))
    })
}

fn recognize_png(
    tessdata_path: &str,
    png: &[u8],
    config: &RecognitionConfig,
    progress: &ProgressReporter,
) -> Result<String, OdometerError> {
    let failure = |stage: &str, e: &dyn std::fmt::Display| {
        OdometerError::OcrEngineFailure(format!("{}: {}", stage, e))
    };

    // Leptonica is always built with BMP support; PNG depends on the build
    let image = image::load_from_memory_with_format(png, image::ImageFormat::Png)
        .map_err(|e| failure("Failed to decode preprocessed image", &e))?
        .into_rgb8();
    let mut bmp = Vec::new();
    image
        .write_to(&mut std::io::Cursor::new(&mut bmp), image::ImageFormat::Bmp)
        .map_err(|e| failure("Failed to convert to BMP", &e))?;
    progress.report(10);

    let psm = config.page_seg_mode.tesseract_value().to_string();
    let tess = Tesseract::new(Some(tessdata_path), Some(LANGUAGE))
        .map_err(|e| failure("Failed to create Tesseract", &e))?
        .set_variable("tessedit_char_whitelist", &config.char_whitelist)
        .map_err(|e| failure("Failed to set character whitelist", &e))?
        .set_variable("tessedit_pageseg_mode", &psm)
        .map_err(|e| failure("Failed to set page segmentation mode", &e))?
        .set_image_from_mem(&bmp)
        .map_err(|e| failure("Failed to set image", &e))?;
    progress.report(25);

    let mut tess = tess
        .recognize()
        .map_err(|e| failure("Failed to recognize text", &e))?;
    progress.report(90);

    let text = tess
        .get_text()
        .map_err(|e| failure("Failed to get text", &e))?;

    tracing::debug!(
        "Tesseract mean confidence {} ({}x{})",
        tess.mean_text_conf(),
        image.width(),
        image.height()
    );

    Ok(text.trim().to_string())
}

#[async_trait]
impl TextRecognizer for TesseractRecognizer {
    fn name(&self) -> &'static str {
        "tesseract"
    }

    fn description(&self) -> &'static str {
        "Tesseract OCR - restricted to odometer characters, robust on phone photos"
    }

    async fn recognize(
        &self,
        png: &[u8],
        config: &RecognitionConfig,
        progress: &ProgressReporter,
    ) -> Result<String, OdometerError> {
        let tessdata_path = self.tessdata_path.clone();
        let png = png.to_vec();
        let config = config.clone();
        let reporter = progress.clone();

        let text = tokio::task::spawn_blocking(move || {
            recognize_png(&tessdata_path, &png, &config, &reporter)
        })
        .await
        .map_err(|e| OdometerError::OcrEngineFailure(format!("Tesseract task failed: {}", e)))??;

        progress.report(100);
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_tessdata_dir_fails_initialization() {
        let dir = std::env::temp_dir().join("odometer-ocr-no-such-tessdata");
        let result = TesseractRecognizer::new(Some(&dir));
        assert!(matches!(result, Err(OdometerError::InitializationError(_))));
    }
}
