use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod config;
mod engine;
mod engines;
mod error;
mod ocr;
mod preprocessing;
mod server;

#[derive(Parser, Debug)]
#[command(name = "open-ocr-server")]
#[command(about = "OCR server: preprocesses uploaded images and extracts text with Tesseract")]
#[command(version)]
pub struct Args {
    /// Host address to bind to
    #[arg(long, env = "OCR_HOST", default_value = "127.0.0.1")]
    pub host: String,

    /// Port to listen on
    #[arg(long, env = "OCR_PORT", default_value = "8000")]
    pub port: u16,

    /// Language used when a request does not name one (e.g., "eng", "amh")
    #[arg(long, env = "OCR_DEFAULT_LANGUAGE", default_value = "eng")]
    pub default_language: String,

    /// Maximum upload size in bytes (default: 20MB)
    #[arg(long, env = "OCR_MAX_FILE_SIZE", default_value = "20971520")]
    pub max_file_size: usize,

    /// Path to tessdata directory (a per-user cache directory is used if not set)
    #[arg(long, env = "TESSDATA_PREFIX")]
    pub tessdata_path: Option<String>,

    /// Never download missing language data; fail the request instead
    #[arg(long, env = "OCR_NO_TESSDATA_DOWNLOAD")]
    pub no_tessdata_download: bool,

    /// Allowed CORS origins ("*" allows any origin)
    #[arg(
        long = "cors-origin",
        env = "OCR_CORS_ORIGINS",
        value_delimiter = ',',
        default_value = "http://localhost:3000"
    )]
    pub cors_origins: Vec<String>,

    /// Images whose larger side exceeds this are scaled down to it
    #[arg(long, env = "OCR_MAX_DIMENSION", default_value = "1500")]
    pub max_dimension: u32,

    /// Non-local-means filter strength
    #[arg(long, env = "OCR_DENOISE_STRENGTH", default_value = "10")]
    pub denoise_strength: f32,

    /// Non-local-means patch size in pixels
    #[arg(long, env = "OCR_DENOISE_TEMPLATE_WINDOW", default_value = "7")]
    pub denoise_template_window: u32,

    /// Non-local-means search area size in pixels
    #[arg(long, env = "OCR_DENOISE_SEARCH_WINDOW", default_value = "21")]
    pub denoise_search_window: u32,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "RUST_LOG", default_value = "info")]
    pub log_level: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| args.log_level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = config::Config::try_from(args)?;

    tracing::info!("Starting open-ocr-server v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!("Binding to {}:{}", config.host, config.port);

    server::run(config).await
}
