use crate::config::Config;
use crate::engine::{EngineHandle, EngineStatus, ProgressReporter, ODOMETER_CHAR_WHITELIST};
use crate::engines;
use crate::error::OdometerError;
use crate::extraction::{self, CandidateMatch, ReadingStatus, ACCEPTANCE_THRESHOLD};
use crate::odometer::read_odometer;
use crate::preprocessing::PreprocessedImage;
use crate::retry::{retry_with_backoff, PollError};
use crate::vehicle::VehicleClass;
use axum::{
    body::Bytes,
    extract::{rejection::JsonRejection, DefaultBodyLimit, Multipart, State},
    response::{IntoResponse, Json},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

/// Image types accepted from the capture client
pub const SUPPORTED_FORMATS: [&str; 4] = ["image/jpeg", "image/png", "image/heic", "image/heif"];

/// Room for multipart boundaries and the other form fields
const MULTIPART_OVERHEAD: usize = 64 * 1024;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<EngineHandle>,
    pub config: Arc<Config>,
}

/// Odometer reading response
#[derive(Debug, Serialize)]
pub struct OdometerResponse {
    pub kilometers: Option<u32>,
    pub confidence: Option<u8>,
    pub status: ReadingStatus,
    pub vehicle_type: VehicleClass,
    pub raw_text: String,
    pub normalized_text: String,
    pub candidates: Vec<CandidateMatch>,
    pub engine: &'static str,
    pub processing_time_ms: u64,
    pub preprocessing: PreprocessedImage,
}

/// Extraction-only request, for text recognized elsewhere
#[derive(Debug, Deserialize)]
pub struct ExtractRequest {
    pub text: String,
    #[serde(default)]
    pub vehicle_type: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ExtractResponse {
    pub kilometers: Option<u32>,
    pub confidence: Option<u8>,
    pub status: ReadingStatus,
    pub vehicle_type: VehicleClass,
    pub normalized_text: String,
    pub candidates: Vec<CandidateMatch>,
}

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

#[derive(Debug, Serialize)]
pub struct VehicleTypeInfo {
    pub vehicle_type: VehicleClass,
    pub threshold: u8,
    pub min_km: u32,
    pub max_km: u32,
}

/// Server info response
#[derive(Debug, Serialize)]
pub struct InfoResponse {
    pub version: String,
    pub engine: EngineStatus,
    pub available_engines: Vec<&'static str>,
    pub supported_formats: Vec<&'static str>,
    pub max_file_size_bytes: usize,
    pub acceptance_threshold: u8,
    pub char_whitelist: &'static str,
    pub vehicle_types: Vec<VehicleTypeInfo>,
}

/// Run the HTTP server
///
/// The engine loads in the background; until it is ready `/odometer`
/// answers 503 while the other routes work normally.
pub async fn run(config: Config) -> anyhow::Result<()> {
    let addr = format!("{}:{}", config.host, config.port);

    let state = AppState {
        engine: Arc::new(EngineHandle::uninitialized()),
        config: Arc::new(config),
    };

    let bootstrap = tokio::spawn(bootstrap_engine(
        Arc::clone(&state.engine),
        Arc::clone(&state.config),
    ));
    let engine = Arc::clone(&state.engine);

    let app = router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    bootstrap.abort();
    engine.dispose();
    tracing::info!("Server stopped");

    Ok(())
}

fn router(state: AppState) -> Router {
    let body_limit = state.config.max_file_size + MULTIPART_OVERHEAD;

    Router::new()
        .route("/odometer", post(handle_odometer))
        .route("/odometer/extract", post(handle_extract))
        .route("/health", get(handle_health))
        .route("/info", get(handle_info))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

/// Load the configured engine with retries and move the handle to ready or failed
async fn bootstrap_engine(engine: Arc<EngineHandle>, config: Arc<Config>) {
    if config.engine == engines::NO_ENGINE {
        tracing::info!("No recognition engine configured, image requests will report unavailable");
        return;
    }
    if !engines::available().contains(&config.engine.as_str()) {
        let reason = format!(
            "Engine '{}' is not available in this build (available: {})",
            config.engine,
            engines::available().join(", ")
        );
        tracing::error!("{}", reason);
        engine.mark_failed(reason);
        return;
    }

    let policy = config.engine_init_policy();
    let result = retry_with_backoff(&policy, "Engine initialization", |_| {
        let config = Arc::clone(&config);
        async move {
            tokio::task::spawn_blocking(move || engines::load(&config))
                .await
                .map_err(|e| OdometerError::Internal(format!("Engine loader failed: {}", e)))?
        }
    })
    .await;

    match result {
        Ok(Some(recognizer)) => engine.set_ready(recognizer),
        Ok(None) => {}
        Err(PollError::Exhausted {
            attempts,
            last_error,
        }) => {
            let reason = last_error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "engine never became ready".to_string());
            tracing::error!(
                "Giving up on engine '{}' after {} attempt(s): {}",
                config.engine,
                attempts,
                reason
            );
            engine.mark_failed(reason);
        }
    }
}

/// Handle odometer photo uploads
async fn handle_odometer(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<OdometerResponse>, OdometerError> {
    let start = Instant::now();

    let mut file_data: Option<Bytes> = None;
    let mut content_type: Option<String> = None;
    let mut vehicle_type: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| OdometerError::InvalidRequest(format!("Failed to parse multipart: {}", e)))?
    {
        let name = field.name().unwrap_or_default().to_string();

        match name.as_str() {
            "file" => {
                content_type = field.content_type().map(|s| s.to_string());
                file_data = Some(field.bytes().await.map_err(|e| {
                    OdometerError::InvalidRequest(format!("Failed to read file data: {}", e))
                })?);
            }
            "vehicle_type" => {
                vehicle_type = Some(field.text().await.map_err(|e| {
                    OdometerError::InvalidRequest(format!("Invalid vehicle_type: {}", e))
                })?);
            }
            _ => {}
        }
    }

    let data = file_data.ok_or(OdometerError::MissingFile)?;

    if data.len() > state.config.max_file_size {
        return Err(OdometerError::ImageTooLarge {
            size: data.len(),
            max: state.config.max_file_size,
        });
    }

    // Without a declared type the decoder sniffs the bytes
    if let Some(mime) = content_type.as_deref() {
        if mime != "application/octet-stream" && !SUPPORTED_FORMATS.contains(&mime) {
            return Err(OdometerError::UnsupportedFormat(mime.to_string()));
        }
    }

    let vehicle_class = resolve_vehicle_class(vehicle_type.as_deref());

    // Fires when the client goes away and this future is dropped
    let cancel = CancellationToken::new();
    let _guard = cancel.clone().drop_guard();

    let progress = ProgressReporter::new(Arc::new(|percent: u8| {
        tracing::debug!("Recognition progress: {}%", percent);
    }));

    let reading = read_odometer(&state.engine, &data, vehicle_class, progress, &cancel).await?;

    let processing_time_ms = start.elapsed().as_millis() as u64;

    tracing::info!(
        "Odometer request completed in {}ms, status: {:?}, candidates: {}",
        processing_time_ms,
        reading.status,
        reading.candidates.len()
    );

    Ok(Json(OdometerResponse {
        kilometers: reading.reading.as_ref().map(|c| c.value),
        confidence: reading.reading.as_ref().map(|c| c.confidence),
        status: reading.status,
        vehicle_type: reading.vehicle_class,
        raw_text: reading.raw_text,
        normalized_text: reading.normalized_text,
        candidates: reading.candidates,
        engine: reading.engine,
        processing_time_ms,
        preprocessing: reading.preprocessing,
    }))
}

/// Handle extraction over already-recognized text
async fn handle_extract(
    payload: Result<Json<ExtractRequest>, JsonRejection>,
) -> Result<Json<ExtractResponse>, OdometerError> {
    let Json(request) = payload.map_err(|e| OdometerError::InvalidRequest(e.body_text()))?;

    let vehicle_class = resolve_vehicle_class(request.vehicle_type.as_deref());
    let extraction = extraction::analyze(&request.text, vehicle_class);
    let status = extraction.status();
    let best = extraction.best().cloned();

    Ok(Json(ExtractResponse {
        kilometers: best.as_ref().map(|c| c.value),
        confidence: best.as_ref().map(|c| c.confidence),
        status,
        vehicle_type: vehicle_class,
        normalized_text: extraction.normalized_text,
        candidates: extraction.candidates,
    }))
}

/// Handle health check requests
async fn handle_health() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Handle info requests
async fn handle_info(State(state): State<AppState>) -> impl IntoResponse {
    Json(InfoResponse {
        version: env!("CARGO_PKG_VERSION").to_string(),
        engine: state.engine.status(),
        available_engines: engines::available(),
        supported_formats: SUPPORTED_FORMATS.to_vec(),
        max_file_size_bytes: state.config.max_file_size,
        acceptance_threshold: ACCEPTANCE_THRESHOLD,
        char_whitelist: ODOMETER_CHAR_WHITELIST,
        vehicle_types: VehicleClass::ALL
            .into_iter()
            .map(|class| VehicleTypeInfo {
                vehicle_type: class,
                threshold: class.threshold(),
                min_km: *class.valid_range().start(),
                max_km: *class.valid_range().end(),
            })
            .collect(),
    })
}

fn resolve_vehicle_class(vehicle_type: Option<&str>) -> VehicleClass {
    vehicle_type
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(VehicleClass::from_vehicle_type)
        .unwrap_or_default()
}
