//! OCRS engine implementation
//!
//! Pure Rust OCR engine using the ocrs library. No system dependencies required.
//! Downloads neural network models automatically on first use.

use super::download;
use crate::engine::{ProgressReporter, RecognitionConfig, TextRecognizer};
use crate::error::OdometerError;
use async_trait::async_trait;
use ocrs::{DecodeMethod, ImageSource, OcrEngine, OcrEngineParams};
use rten::Model;
use std::sync::Arc;

const DETECTION_MODEL_URL: &str =
    "https://ocrs-models.s3-accelerate.amazonaws.com/text-detection.rten";
const RECOGNITION_MODEL_URL: &str =
    "https://ocrs-models.s3-accelerate.amazonaws.com/text-recognition.rten";

/// Recognizer wrapping the ocrs library
pub struct OcrsRecognizer {
    engine: Arc<OcrEngine>,
}

impl OcrsRecognizer {
    /// Load the detection and recognition models, downloading them if needed
    ///
    /// Blocking: call from a blocking thread.
    pub fn new() -> Result<Self, OdometerError> {
        tracing::info!("Initializing ocrs engine...");

        let cache = download::cache_dir();
        let detection_model =
            load_model(DETECTION_MODEL_URL, &cache, "text-detection.rten", "detection")?;
        let recognition_model =
            load_model(RECOGNITION_MODEL_URL, &cache, "text-recognition.rten", "recognition")?;

        let engine = OcrEngine::new(OcrEngineParams {
            detection_model: Some(detection_model),
            recognition_model: Some(recognition_model),
            decode_method: DecodeMethod::Greedy,
            ..Default::default()
        })
        .map_err(|e| {
            OdometerError::InitializationError(format!("Failed to create ocrs engine: {}", e))
        })?;

        tracing::info!("ocrs engine initialized");

        Ok(Self {
            engine: Arc::new(engine),
        })
    }
}

fn load_model(
    url: &str,
    cache: &std::path::Path,
    filename: &str,
    kind: &str,
) -> Result<Model, OdometerError> {
    let path = download::ensure_downloaded(url, cache, filename)?;
    Model::load_file(&path).map_err(|e| {
        OdometerError::InitializationError(format!("Failed to load {} model: {}", kind, e))
    })
}

/// Run detection and recognition over a PNG, one output line per text line
fn recognize_png(
    engine: &OcrEngine,
    png: &[u8],
    progress: &ProgressReporter,
) -> Result<String, OdometerError> {
    let failure = |stage: &str, e: &dyn std::fmt::Display| {
        OdometerError::OcrEngineFailure(format!("{}: {}", stage, e))
    };

    let image = image::load_from_memory_with_format(png, image::ImageFormat::Png)
        .map_err(|e| failure("Failed to decode preprocessed image", &e))?
        .into_rgb8();
    let dimensions = image.dimensions();
    progress.report(10);

    let source = ImageSource::from_bytes(image.as_raw(), dimensions)
        .map_err(|e| failure("Failed to create image source", &e))?;
    let input = engine
        .prepare_input(source)
        .map_err(|e| failure("Failed to prepare input", &e))?;
    progress.report(25);

    let word_rects = engine
        .detect_words(&input)
        .map_err(|e| failure("Failed to detect words", &e))?;
    let line_rects = engine.find_text_lines(&input, &word_rects);
    progress.report(60);

    let lines = engine
        .recognize_text(&input, &line_rects)
        .map_err(|e| failure("Failed to recognize text", &e))?;
    progress.report(90);

    let text = lines
        .iter()
        .flatten()
        .map(|line| {
            line.words()
                .map(|word| word.to_string())
                .collect::<Vec<_>>()
                .join(" ")
        })
        .collect::<Vec<_>>()
        .join("\n");

    tracing::debug!(
        "ocrs found {} word(s) on {} line(s)",
        word_rects.len(),
        line_rects.len()
    );

    Ok(text)
}

#[async_trait]
impl TextRecognizer for OcrsRecognizer {
    fn name(&self) -> &'static str {
        "ocrs"
    }

    fn description(&self) -> &'static str {
        "Pure Rust OCR engine - fast, no system dependencies required"
    }

    async fn recognize(
        &self,
        png: &[u8],
        config: &RecognitionConfig,
        progress: &ProgressReporter,
    ) -> Result<String, OdometerError> {
        let engine = Arc::clone(&self.engine);
        let png = png.to_vec();
        let reporter = progress.clone();

        let text = tokio::task::spawn_blocking(move || recognize_png(&engine, &png, &reporter))
            .await
            .map_err(|e| OdometerError::OcrEngineFailure(format!("ocrs task failed: {}", e)))??;

        progress.report(100);
        Ok(config.apply_whitelist(&text))
    }
}
