use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Message returned for every failure the caller cannot fix by changing the request
pub const GENERIC_FAILURE_MESSAGE: &str = "Failed to process image. Please try again.";

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Error, Debug)]
pub enum OcrError {
    #[error("Failed to decode image: {0}")]
    Decode(#[source] image::ImageError),

    #[error("Failed to encode processed image: {0}")]
    Encode(#[source] image::ImageError),

    #[error("Unsupported language: {0}")]
    UnsupportedLanguage(String),

    #[error("OCR engine failed to {action}: {source}")]
    Engine {
        action: &'static str,
        #[source]
        source: BoxError,
    },

    #[error("Missing file in request")]
    MissingFile,

    #[error("File must be an image (got {0})")]
    NotAnImage(String),

    #[error("Image too large: {size} bytes (max: {max} bytes)")]
    ImageTooLarge { size: usize, max: usize },

    #[error("Request body exceeds the {max} byte limit")]
    BodyTooLarge { max: usize },

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Coarse classification used by callers to decide how to present a failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Input bytes are not a valid or supported image
    Decode,
    /// The recognition engine rejected the language or failed internally
    Engine,
    /// The request itself is malformed
    Request,
    Internal,
}

impl OcrError {
    pub fn engine(action: &'static str, source: impl Into<BoxError>) -> Self {
        Self::Engine {
            action,
            source: source.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            OcrError::Decode(_) => ErrorKind::Decode,
            OcrError::UnsupportedLanguage(_) | OcrError::Engine { .. } => ErrorKind::Engine,
            OcrError::MissingFile
            | OcrError::NotAnImage(_)
            | OcrError::ImageTooLarge { .. }
            | OcrError::BodyTooLarge { .. }
            | OcrError::InvalidRequest(_) => ErrorKind::Request,
            OcrError::Encode(_) | OcrError::InvalidConfig(_) | OcrError::Internal(_) => {
                ErrorKind::Internal
            }
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            OcrError::Decode(_) => "DECODE_ERROR",
            OcrError::Encode(_) => "ENCODE_ERROR",
            OcrError::UnsupportedLanguage(_) => "UNSUPPORTED_LANGUAGE",
            OcrError::Engine { .. } => "ENGINE_ERROR",
            OcrError::MissingFile => "MISSING_FILE",
            OcrError::NotAnImage(_) => "NOT_AN_IMAGE",
            OcrError::ImageTooLarge { .. } | OcrError::BodyTooLarge { .. } => "IMAGE_TOO_LARGE",
            OcrError::InvalidRequest(_) => "INVALID_REQUEST",
            OcrError::InvalidConfig(_) => "INVALID_CONFIG",
            OcrError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Full cause chain, for operator logs only
    pub fn report(&self) -> String {
        let mut report = self.to_string();
        let mut source = std::error::Error::source(self);
        while let Some(cause) = source {
            let message = cause.to_string();
            if !report.contains(&message) {
                report.push_str(": ");
                report.push_str(&message);
            }
            source = std::error::Error::source(cause);
        }
        report
    }
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub detail: String,
    pub code: String,
}

impl IntoResponse for OcrError {
    fn into_response(self) -> Response {
        let (status, detail) = match self.kind() {
            ErrorKind::Request => {
                let status = match &self {
                    OcrError::ImageTooLarge { .. } | OcrError::BodyTooLarge { .. } => {
                        StatusCode::PAYLOAD_TOO_LARGE
                    }
                    _ => StatusCode::BAD_REQUEST,
                };
                (status, self.to_string())
            }
            ErrorKind::Decode | ErrorKind::Engine | ErrorKind::Internal => {
                tracing::error!(code = self.code(), "OCR error: {}", self.report());
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    GENERIC_FAILURE_MESSAGE.to_string(),
                )
            }
        };

        let body = Json(ErrorResponse {
            detail,
            code: self.code().to_string(),
        });

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn body_of(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn test_kinds_are_distinguishable() {
        let decode = OcrError::Decode(image::ImageError::IoError(std::io::Error::other("eof")));
        assert_eq!(decode.kind(), ErrorKind::Decode);
        assert_eq!(OcrError::engine("recognize", "boom").kind(), ErrorKind::Engine);
        assert_eq!(
            OcrError::UnsupportedLanguage("xx".to_string()).kind(),
            ErrorKind::Engine
        );
        assert_eq!(OcrError::MissingFile.kind(), ErrorKind::Request);
    }

    #[test]
    fn test_report_includes_cause_once() {
        let err = OcrError::engine("initialize", std::io::Error::other("no traineddata"));
        let report = err.report();
        assert_eq!(report.matches("no traineddata").count(), 1);
        assert!(report.starts_with("OCR engine failed to initialize"));
    }

    #[tokio::test]
    async fn test_engine_failure_hides_cause_from_caller() {
        let response = OcrError::engine("recognize", "tesseract exploded").into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = body_of(response).await;
        assert_eq!(body["detail"], GENERIC_FAILURE_MESSAGE);
        assert_eq!(body["code"], "ENGINE_ERROR");
        assert!(!body.to_string().contains("exploded"));
    }

    #[tokio::test]
    async fn test_request_errors_keep_their_message() {
        let response = OcrError::NotAnImage("text/plain".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_of(response).await;
        assert!(body["detail"]
            .as_str()
            .unwrap()
            .starts_with("File must be an image"));

        let response = OcrError::ImageTooLarge { size: 10, max: 5 }.into_response();
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }
}
