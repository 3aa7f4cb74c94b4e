//! End-to-end odometer reading: preprocess, recognize, extract
//!
//! Stateless. The engine handle comes from the host on every call.

use crate::engine::{EngineHandle, ProgressReporter, RecognitionConfig};
use crate::error::OdometerError;
use crate::extraction::{self, CandidateMatch, ReadingStatus};
use crate::preprocessing::{self, PreprocessedImage, Preprocessor};
use crate::vehicle::VehicleClass;
use serde::Serialize;
use tokio_util::sync::CancellationToken;

/// Outcome of reading one odometer photo
#[derive(Debug, Clone, Serialize)]
pub struct OdometerReading {
    /// Best candidate, if any survived range validation
    pub reading: Option<CandidateMatch>,
    pub status: ReadingStatus,
    pub vehicle_class: VehicleClass,
    pub raw_text: String,
    pub normalized_text: String,
    /// All surviving candidates, best first
    pub candidates: Vec<CandidateMatch>,
    pub engine: &'static str,
    pub preprocessing: PreprocessedImage,
}

/// Read the kilometre value from an uploaded odometer image
///
/// Fails fast with `OcrEngineUnavailable` when the engine is not ready.
/// If `cancel` fires while recognition is in flight the result is
/// discarded and `Cancelled` is returned.
pub async fn read_odometer(
    engine: &EngineHandle,
    image_bytes: &[u8],
    vehicle_class: VehicleClass,
    progress: ProgressReporter,
    cancel: &CancellationToken,
) -> Result<OdometerReading, OdometerError> {
    let recognizer = engine.acquire()?;

    let bytes = image_bytes.to_vec();
    let preprocessed = tokio::task::spawn_blocking(move || {
        let image = preprocessing::decode(&bytes)?;
        Preprocessor::new(vehicle_class).process(image)
    })
    .await
    .map_err(|e| OdometerError::Internal(format!("Preprocessing task failed: {}", e)))??;

    if cancel.is_cancelled() {
        return Err(OdometerError::Cancelled);
    }

    let config = RecognitionConfig::odometer();
    let raw_text = tokio::select! {
        biased;
        _ = cancel.cancelled() => {
            tracing::info!("Discarding in-flight recognition: request cancelled");
            return Err(OdometerError::Cancelled);
        }
        result = recognizer.recognize(&preprocessed.png, &config, &progress) => result?,
    };

    let extraction = extraction::analyze(&raw_text, vehicle_class);
    let status = extraction.status();
    let reading = extraction.best().cloned();

    match &reading {
        Some(candidate) => tracing::info!(
            "Odometer reading {} km ({}, confidence {}, pattern {})",
            candidate.value,
            vehicle_class,
            candidate.confidence,
            candidate.pattern_index
        ),
        None => tracing::info!("No odometer reading found ({})", vehicle_class),
    }

    Ok(OdometerReading {
        reading,
        status,
        vehicle_class,
        raw_text,
        normalized_text: extraction.normalized_text,
        candidates: extraction.candidates,
        engine: recognizer.name(),
        preprocessing: preprocessed,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::testing::{FakeRecognizer, StalledRecognizer};
    use crate::engine::PageSegMode;
    use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
    use std::io::Cursor;
    use std::sync::atomic::{AtomicU8, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    fn odometer_png() -> Vec<u8> {
        let img = RgbaImage::from_fn(24, 12, |x, y| {
            if (6..18).contains(&x) && (3..9).contains(&y) {
                Rgba([10, 10, 10, 255])
            } else {
                Rgba([240, 240, 240, 255])
            }
        });
        let mut png = Vec::new();
        DynamicImage::ImageRgba8(img)
            .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
            .unwrap();
        png
    }

    #[tokio::test]
    async fn test_reads_confirmed_value() {
        let fake = Arc::new(FakeRecognizer::returning("TOTAL 45231 KM"));
        let handle = EngineHandle::ready(fake.clone());

        let reading = read_odometer(
            &handle,
            &odometer_png(),
            VehicleClass::FourWheeler,
            ProgressReporter::none(),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(reading.reading.as_ref().map(|c| c.value), Some(45231));
        assert_eq!(reading.status, ReadingStatus::Confirmed);
        assert_eq!(reading.normalized_text, "T0TAL 45231 KM");
        assert_eq!(reading.engine, "fake");
        assert_eq!(reading.preprocessing.threshold, 128);

        let calls = fake.calls.lock();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].page_seg_mode, PageSegMode::SparseText);
    }

    #[tokio::test]
    async fn test_no_reading_is_not_an_error() {
        let handle = EngineHandle::ready(Arc::new(FakeRecognizer::returning("no digits here")));

        let reading = read_odometer(
            &handle,
            &odometer_png(),
            VehicleClass::TwoWheeler,
            ProgressReporter::none(),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        assert!(reading.reading.is_none());
        assert!(reading.candidates.is_empty());
        assert_eq!(reading.status, ReadingStatus::NotFound);
    }

    #[tokio::test]
    async fn test_unready_engine_fails_fast() {
        let handle = EngineHandle::uninitialized();

        let err = read_odometer(
            &handle,
            &odometer_png(),
            VehicleClass::FourWheeler,
            ProgressReporter::none(),
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, OdometerError::OcrEngineUnavailable));
    }

    #[tokio::test]
    async fn test_engine_failure_is_propagated_with_message() {
        let handle = EngineHandle::ready(Arc::new(FakeRecognizer::failing("worker crashed")));

        let err = read_odometer(
            &handle,
            &odometer_png(),
            VehicleClass::FourWheeler,
            ProgressReporter::none(),
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();

        match err {
            OdometerError::OcrEngineFailure(message) => assert_eq!(message, "worker crashed"),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_undecodable_upload_is_rejected() {
        let handle = EngineHandle::ready(Arc::new(FakeRecognizer::returning("12345")));

        let err = read_odometer(
            &handle,
            b"not an image",
            VehicleClass::FourWheeler,
            ProgressReporter::none(),
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, OdometerError::InvalidImageDimensions(_)));
    }

    #[tokio::test]
    async fn test_cancellation_discards_in_flight_recognition() {
        let handle = EngineHandle::ready(Arc::new(StalledRecognizer));
        let cancel = CancellationToken::new();

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let err = read_odometer(
            &handle,
            &odometer_png(),
            VehicleClass::ThreeWheeler,
            ProgressReporter::none(),
            &cancel,
        )
        .await
        .unwrap_err();

        assert!(matches!(err, OdometerError::Cancelled));
    }

    #[tokio::test]
    async fn test_already_cancelled_request_never_reaches_engine() {
        let fake = Arc::new(FakeRecognizer::returning("12345"));
        let handle = EngineHandle::ready(fake.clone());
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = read_odometer(
            &handle,
            &odometer_png(),
            VehicleClass::FourWheeler,
            ProgressReporter::none(),
            &cancel,
        )
        .await;

        assert!(matches!(result, Err(OdometerError::Cancelled)));
        assert!(fake.calls.lock().is_empty());
    }

    #[tokio::test]
    async fn test_progress_is_forwarded() {
        let handle = EngineHandle::ready(Arc::new(FakeRecognizer::returning("ODO 1234")));
        let last = Arc::new(AtomicU8::new(0));
        let sink = Arc::clone(&last);

        read_odometer(
            &handle,
            &odometer_png(),
            VehicleClass::TwoWheeler,
            ProgressReporter::new(Arc::new(move |p| sink.store(p, Ordering::SeqCst))),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(last.load(Ordering::SeqCst), 100);
    }
}
