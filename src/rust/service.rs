//! Transport-neutral request handling shared by the HTTP server and the
//! Lambda handler.
//!
//! Both transports read `"text"` through [`parse_text`], run it through
//! [`EmotionService`] and only turn a [`ServiceError`] into a status code at
//! their outermost layer. The HTTP server rejects unparsable bodies as client
//! input; the Lambda handler reports them as internal faults.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

use crate::classifier::EmotionPredictor;
use crate::labels::Emotion;

pub const LIVENESS_MESSAGE: &str = "Emotion Detection API is live!";
pub const NO_TEXT_MESSAGE: &str = "No text provided";
pub const MALFORMED_BODY_MESSAGE: &str = "Request body is not valid JSON";
pub const METHOD_NOT_ALLOWED_MESSAGE: &str = "Method not allowed";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PredictResponse {
    pub emotion: Emotion,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Body has no usable `"text"` field
    MissingText,
    /// Body is present but is not JSON
    MalformedBody,
    MethodNotAllowed,
    /// Tokenization, inference or anything else on our side
    Internal,
}

/// Failure of a request, tagged with the class of fault.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceError {
    pub kind: ErrorKind,
    pub message: String,
}

impl ServiceError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn missing_text() -> Self {
        Self::new(ErrorKind::MissingText, NO_TEXT_MESSAGE)
    }

    pub fn malformed_body() -> Self {
        Self::new(ErrorKind::MalformedBody, MALFORMED_BODY_MESSAGE)
    }

    pub fn method_not_allowed() -> Self {
        Self::new(ErrorKind::MethodNotAllowed, METHOD_NOT_ALLOWED_MESSAGE)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, message)
    }

    pub fn status_code(&self) -> u16 {
        match self.kind {
            ErrorKind::MissingText | ErrorKind::MalformedBody => 400,
            ErrorKind::MethodNotAllowed => 405,
            ErrorKind::Internal => 500,
        }
    }

    pub fn to_body(&self) -> ErrorBody {
        ErrorBody {
            error: self.message.clone(),
        }
    }
}

impl fmt::Display for ServiceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({:?})", self.message, self.kind)
    }
}

impl std::error::Error for ServiceError {}

/// Immutable handle to the loaded model, cheap to clone into every request.
#[derive(Clone)]
pub struct EmotionService {
    predictor: Arc<dyn EmotionPredictor>,
}

impl EmotionService {
    pub fn new<P: EmotionPredictor + 'static>(predictor: P) -> Self {
        Self {
            predictor: Arc::new(predictor),
        }
    }

    pub fn from_shared(predictor: Arc<dyn EmotionPredictor>) -> Self {
        Self { predictor }
    }

    pub fn health(&self) -> HealthResponse {
        HealthResponse {
            message: LIVENESS_MESSAGE.to_string(),
        }
    }

    /// Handles a raw predict body. A missing or blank body reads as `{}`.
    pub fn predict_body(&self, body: Option<&[u8]>) -> Result<PredictResponse, ServiceError> {
        let text = extract_text(body)?;
        self.predict_text(&text)
    }

    pub fn predict_text(&self, text: &str) -> Result<PredictResponse, ServiceError> {
        if text.is_empty() {
            return Err(ServiceError::missing_text());
        }
        let prediction = self.predictor.predict(text).map_err(|e| {
            log::error!("Inference failed: {}", e);
            ServiceError::internal(e.to_string())
        })?;
        log::debug!("Predicted {} ({:.3})", prediction.label, prediction.score);
        Ok(PredictResponse {
            emotion: prediction.label,
        })
    }
}

/// Reads the `"text"` field of a JSON body.
///
/// `Ok(None)` covers a missing or blank body and any JSON value without a
/// non-empty string `"text"`. Only a body that fails to parse is an error.
pub fn parse_text(body: Option<&[u8]>) -> Result<Option<String>, serde_json::Error> {
    let body = match body {
        Some(bytes) if !bytes.iter().all(u8::is_ascii_whitespace) => bytes,
        _ => return Ok(None),
    };

    let value: Value = serde_json::from_slice(body)?;
    Ok(match value.get("text").and_then(Value::as_str) {
        Some(text) if !text.is_empty() => Some(text.to_string()),
        _ => None,
    })
}

/// Pulls a non-empty `"text"` string out of a JSON body, treating a body that
/// is not JSON as client input.
pub fn extract_text(body: Option<&[u8]>) -> Result<String, ServiceError> {
    parse_text(body)
        .map_err(|e| {
            log::debug!("Rejecting body that is not JSON: {}", e);
            ServiceError::malformed_body()
        })?
        .ok_or_else(ServiceError::missing_text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::{ClassifierError, Prediction};

    struct Fixed(Emotion);

    impl EmotionPredictor for Fixed {
        fn predict(&self, _text: &str) -> Result<Prediction, ClassifierError> {
            Ok(Prediction { label: self.0, score: 0.9 })
        }
    }

    struct Broken;

    impl EmotionPredictor for Broken {
        fn predict(&self, _text: &str) -> Result<Prediction, ClassifierError> {
            Err(ClassifierError::ModelError("Failed to run model: out of memory".into()))
        }
    }

    #[test]
    fn test_extract_text() {
        assert_eq!(extract_text(Some(br#"{"text": "hi"}"#)).unwrap(), "hi");
        assert_eq!(extract_text(None).unwrap_err().kind, ErrorKind::MissingText);
        assert_eq!(extract_text(Some(b"")).unwrap_err().kind, ErrorKind::MissingText);
        assert_eq!(extract_text(Some(b"  \n")).unwrap_err().kind, ErrorKind::MissingText);
        assert_eq!(extract_text(Some(b"{}")).unwrap_err().kind, ErrorKind::MissingText);
        assert_eq!(extract_text(Some(br#"{"text": ""}"#)).unwrap_err().kind, ErrorKind::MissingText);
        assert_eq!(extract_text(Some(br#"{"text": 42}"#)).unwrap_err().kind, ErrorKind::MissingText);
        assert_eq!(extract_text(Some(b"[1, 2]")).unwrap_err().kind, ErrorKind::MissingText);
        assert_eq!(extract_text(Some(b"{not json")).unwrap_err().kind, ErrorKind::MalformedBody);
    }

    #[test]
    fn test_parse_text_reports_parser_error() {
        assert_eq!(parse_text(None).unwrap(), None);
        assert_eq!(parse_text(Some(b"{}")).unwrap(), None);
        assert_eq!(parse_text(Some(br#"{"text": "hi"}"#)).unwrap().as_deref(), Some("hi"));

        let err = parse_text(Some(b"{\"text\": ")).unwrap_err();
        assert!(err.is_eof());
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(ServiceError::missing_text().status_code(), 400);
        assert_eq!(ServiceError::malformed_body().status_code(), 400);
        assert_eq!(ServiceError::method_not_allowed().status_code(), 405);
        assert_eq!(ServiceError::internal("boom").status_code(), 500);
        assert_eq!(
            serde_json::to_string(&ServiceError::missing_text().to_body()).unwrap(),
            r#"{"error":"No text provided"}"#
        );
    }

    #[test]
    fn test_predict_body() {
        let service = EmotionService::new(Fixed(Emotion::Joy));
        let response = service.predict_body(Some(br#"{"text": "I am so happy today!"}"#)).unwrap();
        assert_eq!(response.emotion, Emotion::Joy);
        assert_eq!(service.health().message, "Emotion Detection API is live!");
    }

    #[test]
    fn test_inference_failure_is_internal() {
        let service = EmotionService::new(Broken);
        let err = service.predict_text("anything").unwrap_err();
        assert_eq!(err.kind, ErrorKind::Internal);
        assert!(err.message.contains("out of memory"));
    }
}
