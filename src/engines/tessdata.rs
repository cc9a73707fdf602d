//! Tesseract language data (`*.traineddata`) lookup and on-demand download

use crate::engine::Language;
use crate::error::OcrError;
use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

const TRAINEDDATA_EXT: &str = "traineddata";
/// End-to-end limit for one model download
const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(60);
/// Largest model we accept (tessdata_best models stay well below this)
const MAX_MODEL_BYTES: u64 = 100 * 1024 * 1024;
/// How long a failed download is remembered before it is tried again
const RETRY_FAILED_AFTER: Duration = Duration::from_secs(10 * 60);

/// Source of traineddata bytes
pub trait ModelFetcher: Send + Sync {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, OcrError>;
}

/// Fetches models over HTTPS with a bounded call time and body size
pub struct HttpFetcher {
    agent: ureq::Agent,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Self {
        let agent = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .build()
            .into();
        Self { agent }
    }
}

impl ModelFetcher for HttpFetcher {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, OcrError> {
        let mut response = self
            .agent
            .get(url)
            .call()
            .map_err(|e| OcrError::Internal(format!("Failed to download {}: {}", url, e)))?;

        response
            .body_mut()
            .with_config()
            .limit(MAX_MODEL_BYTES)
            .read_to_vec()
            .map_err(|e| OcrError::Internal(format!("Failed to read tessdata response: {}", e)))
    }
}

/// Directory of traineddata files, optionally filled from the network
#[derive(Clone)]
pub struct TessdataStore {
    dir: PathBuf,
    download: bool,
    fetcher: Arc<dyn ModelFetcher>,
    /// Codes whose download failed, with the time of the failure
    failed: Arc<Mutex<HashMap<String, Instant>>>,
}

impl TessdataStore {
    pub fn new(dir: PathBuf, download: bool) -> Self {
        Self::with_fetcher(dir, download, Arc::new(HttpFetcher::new(DOWNLOAD_TIMEOUT)))
    }

    pub fn with_fetcher(dir: PathBuf, download: bool, fetcher: Arc<dyn ModelFetcher>) -> Self {
        Self {
            dir,
            download,
            fetcher,
            failed: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// `--tessdata-path` if given, otherwise a per-user cache directory
    pub fn default_dir() -> PathBuf {
        dirs::cache_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join("open-ocr")
            .join("tessdata")
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Tesseract expects the directory as a UTF-8 string
    pub fn dir_str(&self) -> Result<&str, OcrError> {
        self.dir
            .to_str()
            .ok_or_else(|| OcrError::Internal(format!("Invalid tessdata path: {:?}", self.dir)))
    }

    fn model_path(&self, code: &str) -> PathBuf {
        self.dir.join(format!("{}.{}", code, TRAINEDDATA_EXT))
    }

    /// Make sure every model named by `language` is present locally.
    ///
    /// Missing data is a per-request failure, never a startup one.
    pub fn ensure(&self, language: &Language) -> Result<(), OcrError> {
        for code in language.parts() {
            let path = self.model_path(code);
            if path.is_file() {
                continue;
            }

            if !self.download {
                return Err(OcrError::UnsupportedLanguage(format!(
                    "{} (no {:?} and downloads are disabled)",
                    code, path
                )));
            }

            if self.failed_recently(code) {
                return Err(OcrError::UnsupportedLanguage(format!(
                    "{} (download failed recently)",
                    code
                )));
            }

            tracing::info!(
                "Downloading tessdata for '{}' (this may take a moment)...",
                code
            );
            if let Err(e) = self.download_model(code, &path) {
                tracing::warn!("Could not fetch tessdata for '{}': {}", code, e.report());
                self.failed_registry().insert(code.to_string(), Instant::now());
                return Err(OcrError::UnsupportedLanguage(code.to_string()));
            }
            tracing::info!("Downloaded tessdata to {:?}", path);
        }
        Ok(())
    }

    fn failed_registry(&self) -> std::sync::MutexGuard<'_, HashMap<String, Instant>> {
        // A panic while holding the lock cannot leave the map inconsistent
        self.failed.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn failed_recently(&self, code: &str) -> bool {
        let mut failed = self.failed_registry();
        match failed.get(code) {
            Some(at) if at.elapsed() < RETRY_FAILED_AFTER => true,
            Some(_) => {
                failed.remove(code);
                false
            }
            None => false,
        }
    }

    /// Language codes with a traineddata file in the directory
    pub fn available(&self) -> Vec<String> {
        let Ok(entries) = std::fs::read_dir(&self.dir) else {
            return Vec::new();
        };

        let mut languages: Vec<String> = entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.extension().is_some_and(|ext| ext == TRAINEDDATA_EXT))
            .filter_map(|path| path.file_stem().map(|s| s.to_string_lossy().into_owned()))
            .collect();
        languages.sort();
        languages
    }

    fn download_model(&self, code: &str, target: &Path) -> Result<(), OcrError> {
        std::fs::create_dir_all(&self.dir).map_err(|e| {
            OcrError::Internal(format!("Failed to create tessdata directory: {}", e))
        })?;

        let data = self.fetcher.fetch(&tessdata_url(code))?;

        // Write next to the target and rename, so concurrent readers never see a partial file
        let mut staged = tempfile::NamedTempFile::new_in(&self.dir)
            .map_err(|e| OcrError::Internal(format!("Failed to create temp file: {}", e)))?;
        staged
            .write_all(&data)
            .map_err(|e| OcrError::Internal(format!("Failed to write tessdata file: {}", e)))?;
        staged
            .persist(target)
            .map_err(|e| OcrError::Internal(format!("Failed to store tessdata file: {}", e)))?;

        Ok(())
    }
}

/// Get tessdata download URL for a language
fn tessdata_url(code: &str) -> String {
    // Use tessdata_fast for smaller, faster downloads
    format!(
        "https://github.com/tesseract-ocr/tessdata_fast/raw/main/{}.traineddata",
        code
    )
}
