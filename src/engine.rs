use crate::error::OdometerError;
use async_trait::async_trait;
use parking_lot::RwLock;
use serde::Serialize;
use std::sync::Arc;

/// Characters an odometer photo can legitimately contain: digits,
/// separators, and the letters of "km", "Total", "ODO", "Distance"...
pub const ODOMETER_CHAR_WHITELIST: &str = "0123456789.,KMkmTotalODisncer ";

/// Page segmentation strategy requested from the recognizer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PageSegMode {
    /// Find as much text as possible in no particular order
    SparseText,
    /// Treat the image as a single uniform block
    SingleBlock,
}

impl PageSegMode {
    /// Tesseract's numeric `tessedit_pageseg_mode` value
    pub fn tesseract_value(&self) -> u8 {
        match self {
            Self::SparseText => 11,
            Self::SingleBlock => 6,
        }
    }
}

/// Fixed recognition settings passed to every engine call
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecognitionConfig {
    pub char_whitelist: String,
    pub page_seg_mode: PageSegMode,
}

impl RecognitionConfig {
    pub fn odometer() -> Self {
        Self {
            char_whitelist: ODOMETER_CHAR_WHITELIST.to_string(),
            page_seg_mode: PageSegMode::SparseText,
        }
    }

    /// Drop characters outside the whitelist (for engines that cannot restrict output)
    pub fn apply_whitelist(&self, text: &str) -> String {
        text.chars()
            .filter(|c| *c == '\n' || self.char_whitelist.contains(*c))
            .collect()
    }
}

impl Default for RecognitionConfig {
    fn default() -> Self {
        Self::odometer()
    }
}

pub type ProgressFn = Arc<dyn Fn(u8) + Send + Sync>;

/// Forwards recognition progress (0-100) to an optional callback
#[derive(Clone, Default)]
pub struct ProgressReporter {
    callback: Option<ProgressFn>,
}

impl ProgressReporter {
    pub fn new(callback: ProgressFn) -> Self {
        Self {
            callback: Some(callback),
        }
    }

    pub fn none() -> Self {
        Self::default()
    }

    /// Report a percentage; values above 100 are clamped
    pub fn report(&self, percent: u8) {
        if let Some(callback) = &self.callback {
            callback(percent.min(100));
        }
    }
}

impl std::fmt::Debug for ProgressReporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressReporter")
            .field("callback", &self.callback.is_some())
            .finish()
    }
}

/// Capability to turn a cleaned odometer image into raw text
#[async_trait]
pub trait TextRecognizer: Send + Sync {
    /// Returns the engine identifier (e.g., "ocrs", "tesseract")
    fn name(&self) -> &'static str;

    /// Returns a human-readable description of the engine
    fn description(&self) -> &'static str;

    /// Recognize text in a PNG-encoded image
    async fn recognize(
        &self,
        png: &[u8],
        config: &RecognitionConfig,
        progress: &ProgressReporter,
    ) -> Result<String, OdometerError>;
}

#[derive(Clone)]
enum EngineState {
    Uninitialized,
    Ready(Arc<dyn TextRecognizer>),
    Failed(String),
    Disposed,
}

/// Lifecycle status of the engine, as reported to clients
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum EngineStatus {
    Uninitialized,
    Ready { name: String, description: String },
    Failed { reason: String },
    Disposed,
}

/// Host-owned handle to the recognition engine
///
/// The host drives the lifecycle (`uninitialized -> ready -> disposed`, or
/// `failed`); pipeline calls only ever `acquire`.
pub struct EngineHandle {
    state: RwLock<EngineState>,
}

impl EngineHandle {
    pub fn uninitialized() -> Self {
        Self {
            state: RwLock::new(EngineState::Uninitialized),
        }
    }

    pub fn ready(engine: Arc<dyn TextRecognizer>) -> Self {
        Self {
            state: RwLock::new(EngineState::Ready(engine)),
        }
    }

    /// Get the engine, failing fast when it is not ready
    pub fn acquire(&self) -> Result<Arc<dyn TextRecognizer>, OdometerError> {
        match &*self.state.read() {
            EngineState::Ready(engine) => Ok(Arc::clone(engine)),
            _ => Err(OdometerError::OcrEngineUnavailable),
        }
    }

    pub fn set_ready(&self, engine: Arc<dyn TextRecognizer>) {
        let mut state = self.state.write();
        if matches!(*state, EngineState::Disposed) {
            tracing::warn!("Ignoring {} engine: handle already disposed", engine.name());
            return;
        }
        tracing::info!("Recognition engine ready: {}", engine.name());
        *state = EngineState::Ready(engine);
    }

    pub fn mark_failed(&self, reason: impl Into<String>) {
        let mut state = self.state.write();
        if matches!(*state, EngineState::Disposed) {
            return;
        }
        *state = EngineState::Failed(reason.into());
    }

    /// Release the engine; later `acquire` calls fail
    pub fn dispose(&self) {
        *self.state.write() = EngineState::Disposed;
    }

    pub fn status(&self) -> EngineStatus {
        match &*self.state.read() {
            EngineState::Uninitialized => EngineStatus::Uninitialized,
            EngineState::Ready(engine) => EngineStatus::Ready {
                name: engine.name().to_string(),
                description: engine.description().to_string(),
            },
            EngineState::Failed(reason) => EngineStatus::Failed {
                reason: reason.clone(),
            },
            EngineState::Disposed => EngineStatus::Disposed,
        }
    }
}

impl Default for EngineHandle {
    fn default() -> Self {
        Self::uninitialized()
    }
}
