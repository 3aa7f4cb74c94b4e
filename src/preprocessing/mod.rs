//! Image preprocessing for odometer photos
//!
//! Turns an uploaded photo into a clean black-and-white bitmap so the
//! recognizer sees crisp digit strokes instead of glare and sensor noise.

pub mod pipeline;
pub mod steps;

use crate::error::OdometerError;
use image::DynamicImage;

pub use pipeline::{PreprocessedImage, Preprocessor, StepTiming};

/// Decode an uploaded image payload
///
/// Undecodable payloads are reported as invalid dimensions: for this
/// pipeline there is no usable bitmap either way.
pub fn decode(bytes: &[u8]) -> Result<DynamicImage, OdometerError> {
    if bytes.is_empty() {
        return Err(OdometerError::InvalidImageDimensions(
            "empty image payload".to_string(),
        ));
    }

    image::load_from_memory(bytes).map_err(|e| {
        OdometerError::InvalidImageDimensions(format!("Failed to decode image: {}", e))
    })
}
