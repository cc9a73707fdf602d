use crate::engine::Language;
use crate::error::OcrError;
use crate::Args;
use serde::Serialize;
use std::path::PathBuf;

/// Server configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub default_language: Language,
    pub max_file_size: usize,
    pub tessdata_path: Option<PathBuf>,
    pub tessdata_download: bool,
    pub cors_origins: Vec<String>,
    pub preprocess: PreprocessConfig,
}

/// Tunable constants of the preprocessing pipeline
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PreprocessConfig {
    /// Larger side limit; bigger images are scaled down to exactly this
    pub max_dimension: u32,
    /// Non-local-means filter strength `h`
    pub denoise_strength: f32,
    /// Side of the patches compared by the filter
    pub template_window: u32,
    /// Side of the area searched for similar patches
    pub search_window: u32,
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            max_dimension: 1500,
            denoise_strength: 10.0,
            template_window: 7,
            search_window: 21,
        }
    }
}

impl PreprocessConfig {
    fn validate(self) -> Result<Self, OcrError> {
        if self.max_dimension == 0 {
            return Err(OcrError::InvalidConfig(
                "max dimension must be positive".to_string(),
            ));
        }
        if !self.denoise_strength.is_finite() || self.denoise_strength < 0.0 {
            return Err(OcrError::InvalidConfig(format!(
                "denoise strength must be a non-negative number, got {}",
                self.denoise_strength
            )));
        }
        if self.template_window == 0 || self.search_window < self.template_window {
            return Err(OcrError::InvalidConfig(format!(
                "denoise windows must satisfy 0 < template ({}) <= search ({})",
                self.template_window, self.search_window
            )));
        }
        Ok(self)
    }
}

impl TryFrom<Args> for Config {
    type Error = OcrError;

    fn try_from(args: Args) -> Result<Self, Self::Error> {
        let preprocess = PreprocessConfig {
            max_dimension: args.max_dimension,
            denoise_strength: args.denoise_strength,
            template_window: args.denoise_template_window,
            search_window: args.denoise_search_window,
        }
        .validate()?;

        Ok(Self {
            host: args.host,
            port: args.port,
            default_language: Language::parse(&args.default_language)?,
            max_file_size: args.max_file_size,
            tessdata_path: args.tessdata_path.map(PathBuf::from),
            tessdata_download: !args.no_tessdata_download,
            cors_origins: args
                .cors_origins
                .into_iter()
                .map(|origin| origin.trim().to_string())
                .filter(|origin| !origin.is_empty())
                .collect(),
            preprocess,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn parse(extra: &[&str]) -> Result<Config, OcrError> {
        let mut argv = vec!["open-ocr-server"];
        argv.extend_from_slice(extra);
        Config::try_from(Args::parse_from(argv))
    }

    #[test]
    fn test_defaults_match_fixed_pipeline_constants() {
        let config = parse(&[]).unwrap();
        assert_eq!(config.preprocess, PreprocessConfig::default());
        assert_eq!(config.default_language.as_str(), "eng");
        assert!(config.tessdata_download);
    }

    #[test]
    fn test_cors_origins_split_on_commas() {
        let config = parse(&["--cors-origin", "http://a.test, https://b.test"]).unwrap();
        assert_eq!(config.cors_origins, vec!["http://a.test", "https://b.test"]);
    }

    #[test]
    fn test_rejects_search_window_smaller_than_template() {
        let err = parse(&[
            "--denoise-template-window",
            "9",
            "--denoise-search-window",
            "5",
        ])
        .unwrap_err();
        assert!(matches!(err, OcrError::InvalidConfig(_)));
    }

    #[test]
    fn test_rejects_malformed_default_language() {
        let err = parse(&["--default-language", "../etc"]).unwrap_err();
        assert!(matches!(err, OcrError::UnsupportedLanguage(_)));
    }
}
