use crate::config::{Config, PreprocessConfig};
use crate::engine::Language;
use crate::engines;
use crate::error::OcrError;
use crate::ocr::OcrProcessor;
use axum::{
    body::Bytes,
    extract::{multipart::MultipartError, DefaultBodyLimit, Multipart, State},
    http::{HeaderValue, StatusCode},
    response::{IntoResponse, Json},
    routing::{get, post},
    Router,
};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Room for multipart boundaries and headers on top of the file itself
const MULTIPART_OVERHEAD: usize = 64 * 1024;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub processor: Arc<OcrProcessor>,
    pub config: Arc<Config>,
}

/// OCR response
#[derive(Serialize)]
pub struct OcrResponse {
    pub text: String,
}

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Server info response
#[derive(Serialize)]
pub struct InfoResponse {
    pub version: String,
    pub engine: String,
    pub default_language: String,
    pub available_languages: Vec<String>,
    pub max_file_size_bytes: usize,
    pub preprocessing: PreprocessConfig,
}

/// Run the HTTP server
pub async fn run(config: Config) -> anyhow::Result<()> {
    let engine = engines::from_config(&config);
    let processor = OcrProcessor::new(engine, config.preprocess);
    let addr = format!("{}:{}", config.host, config.port);

    let state = AppState {
        processor: Arc::new(processor),
        config: Arc::new(config),
    };

    let app = router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Routes and middleware, separate from binding so handlers can be driven directly
pub fn router(state: AppState) -> Router {
    let body_limit = state.config.max_file_size.saturating_add(MULTIPART_OVERHEAD);
    let cors = cors_layer(&state.config.cors_origins);

    Router::new()
        .route("/ocr", post(handle_ocr))
        .route("/health", get(handle_health))
        .route("/info", get(handle_info))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let allow_origin = if origins.iter().any(|origin| origin == "*") {
        AllowOrigin::any()
    } else {
        let parsed: Vec<HeaderValue> = origins
            .iter()
            .filter_map(|origin| match HeaderValue::from_str(origin) {
                Ok(value) => Some(value),
                Err(_) => {
                    tracing::warn!("Ignoring invalid CORS origin: {}", origin);
                    None
                }
            })
            .collect();
        AllowOrigin::list(parsed)
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods(Any)
        .allow_headers(Any)
}

fn multipart_error(err: MultipartError, max: usize) -> OcrError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        OcrError::BodyTooLarge { max }
    } else {
        OcrError::InvalidRequest(format!("Failed to parse multipart: {}", err))
    }
}

/// Handle OCR requests
async fn handle_ocr(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<OcrResponse>, OcrError> {
    let start = Instant::now();
    let max_file_size = state.config.max_file_size;

    let mut file_data: Option<Bytes> = None;
    let mut content_type: Option<String> = None;
    let mut lang: Option<String> = None;

    // Parse multipart form
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(e, max_file_size))?
    {
        let name = field.name().unwrap_or_default().to_string();

        match name.as_str() {
            "image" => {
                content_type = field.content_type().map(|s| s.to_string());
                file_data = Some(
                    field
                        .bytes()
                        .await
                        .map_err(|e| multipart_error(e, max_file_size))?,
                );
            }
            "lang" => {
                lang = Some(
                    field
                        .text()
                        .await
                        .map_err(|e| OcrError::InvalidRequest(format!("Invalid lang: {}", e)))?,
                );
            }
            _ => {
                // Ignore unknown fields
            }
        }
    }

    // Validate file was provided
    let data = file_data.ok_or(OcrError::MissingFile)?;

    if data.len() > max_file_size {
        return Err(OcrError::ImageTooLarge {
            size: data.len(),
            max: max_file_size,
        });
    }

    let mime = content_type.unwrap_or_else(|| "application/octet-stream".to_string());
    if !mime.starts_with("image/") {
        return Err(OcrError::NotAnImage(mime));
    }

    let language = match lang.as_deref().map(str::trim) {
        Some(code) if !code.is_empty() => Language::parse(code)?,
        _ => state.config.default_language.clone(),
    };

    // Decoding, filtering and recognition are CPU-bound; keep them off the async workers
    let processor = state.processor.clone();
    let task_language = language.clone();
    let text = tokio::task::spawn_blocking(move || processor.process(&data, &task_language))
        .await
        .map_err(|e| OcrError::Internal(format!("OCR worker failed: {}", e)))??;

    tracing::info!(
        "OCR completed in {}ms, language: {}, text length: {}",
        start.elapsed().as_millis(),
        language,
        text.len()
    );

    Ok(Json(OcrResponse { text }))
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
        engine: state.processor.engine_name().to_string(),
        default_language: state.config.default_language.to_string(),
        available_languages: state.processor.available_languages(),
        max_file_size_bytes: state.config.max_file_size,
        preprocessing: *state.processor.preprocess_config(),
    })
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, starting graceful shutdown...");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown...");
        }
    }
}
