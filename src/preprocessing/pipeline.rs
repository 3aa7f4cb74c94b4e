use crate::error::OdometerError;
use crate::vehicle::VehicleClass;
use image::{DynamicImage, ImageFormat, RgbaImage};
use serde::Serialize;
use std::io::Cursor;
use std::time::Instant;

use super::steps;

/// Timing information for a single preprocessing step
#[derive(Debug, Clone, Serialize)]
pub struct StepTiming {
    pub name: String,
    pub time_ms: u64,
}

/// Cleaned binary image ready for the recognizer
#[derive(Debug, Clone, Serialize)]
pub struct PreprocessedImage {
    /// PNG-encoded binary image (not serialized)
    #[serde(skip)]
    pub png: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub vehicle_class: VehicleClass,
    pub threshold: u8,
    /// Black pixels after binarization
    pub black_pixels_binarized: usize,
    /// Black pixels left after speck removal
    pub black_pixels_cleaned: usize,
    /// Total preprocessing time in milliseconds
    pub total_time_ms: u64,
    /// Individual step timings
    pub steps: Vec<StepTiming>,
}

/// Odometer preprocessing: binarize, remove specks, encode
pub struct Preprocessor {
    vehicle_class: VehicleClass,
}

impl Preprocessor {
    pub fn new(vehicle_class: VehicleClass) -> Self {
        Self { vehicle_class }
    }

    /// Process a decoded image into a PNG-encoded binary bitmap
    pub fn process(&self, image: DynamicImage) -> Result<PreprocessedImage, OdometerError> {
        let start = Instant::now();
        let mut steps_timing = Vec::new();

        let (width, height) = (image.width(), image.height());
        if width == 0 || height == 0 {
            return Err(OdometerError::InvalidImageDimensions(format!(
                "{}x{} image has no pixels",
                width, height
            )));
        }

        let threshold = self.vehicle_class.threshold();
        let mut bitmap = image.into_rgba8();

        self.run_step("threshold", &mut steps_timing, || {
            steps::threshold::apply(&mut bitmap, threshold)
        });
        let black_pixels_binarized = steps::denoise::count_black(&bitmap);

        let cleaned = self.run_step("denoise", &mut steps_timing, || {
            steps::denoise::apply(&bitmap)
        });
        let black_pixels_cleaned = steps::denoise::count_black(&cleaned);

        let png = self.run_step("encode", &mut steps_timing, || encode_png(&cleaned))?;

        tracing::debug!(
            "Preprocessed {}x{} image for {} (threshold {}): {} -> {} black pixels",
            width,
            height,
            self.vehicle_class,
            threshold,
            black_pixels_binarized,
            black_pixels_cleaned
        );

        Ok(PreprocessedImage {
            png,
            width,
            height,
            vehicle_class: self.vehicle_class,
            threshold,
            black_pixels_binarized,
            black_pixels_cleaned,
            total_time_ms: start.elapsed().as_millis() as u64,
            steps: steps_timing,
        })
    }

    fn run_step<T, F>(&self, name: &str, timings: &mut Vec<StepTiming>, step_fn: F) -> T
    where
        F: FnOnce() -> T,
    {
        let step_start = Instant::now();
        let result = step_fn();
        timings.push(StepTiming {
            name: name.to_string(),
            time_ms: step_start.elapsed().as_millis() as u64,
        });
        result
    }
}

fn encode_png(bitmap: &RgbaImage) -> Result<Vec<u8>, OdometerError> {
    let mut png = Vec::new();
    bitmap
        .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
        .map_err(|e| OdometerError::PreprocessingError(format!("Failed to encode PNG: {}", e)))?;
    Ok(png)
}
