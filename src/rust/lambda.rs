//! Lambda front end.
//!
//! Accepts API Gateway proxy events (REST `httpMethod` or HTTP API
//! `requestContext.http.method`) and answers with a proxy response record.
//! Every response carries the same permissive CORS headers.

use base64::Engine;
use lambda_runtime::{Error, LambdaEvent};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::service::{parse_text, EmotionService, PredictResponse, ServiceError};

pub const CORS_HEADERS: [(&str, &str); 3] = [
    ("Access-Control-Allow-Origin", "*"),
    ("Access-Control-Allow-Methods", "POST, OPTIONS"),
    ("Access-Control-Allow-Headers", "Content-Type"),
];

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvocationEvent {
    #[serde(default)]
    pub http_method: Option<String>,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub is_base64_encoded: bool,
    #[serde(default)]
    pub request_context: Option<RequestContext>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RequestContext {
    #[serde(default)]
    pub http: Option<HttpContext>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct HttpContext {
    #[serde(default)]
    pub method: Option<String>,
}

impl InvocationEvent {
    /// A POST event carrying `body`, as API Gateway would deliver it.
    pub fn post(body: impl Into<String>) -> Self {
        Self {
            http_method: Some("POST".to_string()),
            body: Some(body.into()),
            ..Self::default()
        }
    }

    pub fn method(&self) -> Option<&str> {
        self.http_method.as_deref().or_else(|| {
            self.request_context
                .as_ref()
                .and_then(|ctx| ctx.http.as_ref())
                .and_then(|http| http.method.as_deref())
        })
    }

    fn decoded_body(&self) -> Result<Option<Vec<u8>>, ServiceError> {
        match &self.body {
            None => Ok(None),
            Some(body) if self.is_base64_encoded => base64::engine::general_purpose::STANDARD
                .decode(body.trim())
                .map(Some)
                .map_err(|e| ServiceError::internal(e.to_string())),
            Some(body) => Ok(Some(body.clone().into_bytes())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvocationResponse {
    pub status_code: u16,
    pub headers: BTreeMap<String, String>,
    pub body: String,
}

impl InvocationResponse {
    fn new(status_code: u16, body: String) -> Self {
        let mut headers: BTreeMap<String, String> = CORS_HEADERS
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        headers.insert("Content-Type".to_string(), "application/json".to_string());
        Self {
            status_code,
            headers,
            body,
        }
    }

    pub fn json<T: Serialize>(status_code: u16, payload: &T) -> Self {
        match serde_json::to_string(payload) {
            Ok(body) => Self::new(status_code, body),
            Err(e) => Self::from_error(&ServiceError::internal(e.to_string())),
        }
    }

    pub fn from_error(err: &ServiceError) -> Self {
        let body = serde_json::json!({ "error": err.message }).to_string();
        Self::new(err.status_code(), body)
    }

    fn preflight() -> Self {
        Self::new(200, String::new())
    }
}

/// Routes one invocation. Never fails: every fault becomes a response record.
pub fn handle_invocation(service: &EmotionService, event: &InvocationEvent) -> InvocationResponse {
    let method = event.method().unwrap_or("POST");

    if method.eq_ignore_ascii_case("OPTIONS") {
        return InvocationResponse::preflight();
    }
    if !method.eq_ignore_ascii_case("POST") {
        log::warn!("Rejecting {} invocation", method);
        return InvocationResponse::from_error(&ServiceError::method_not_allowed());
    }

    match predict_event(service, event) {
        Ok(prediction) => InvocationResponse::json(200, &prediction),
        Err(err) => {
            if err.status_code() >= 500 {
                log::error!("Invocation failed: {}", err);
            } else {
                log::info!("Invocation rejected: {}", err);
            }
            InvocationResponse::from_error(&err)
        }
    }
}

/// Body decoding and parsing faults are internal here; only missing text is a
/// client error.
fn predict_event(service: &EmotionService, event: &InvocationEvent) -> Result<PredictResponse, ServiceError> {
    let body = event.decoded_body()?;
    let text = parse_text(body.as_deref())
        .map_err(|e| ServiceError::internal(e.to_string()))?
        .ok_or_else(ServiceError::missing_text)?;
    service.predict_text(&text)
}

/// `lambda_runtime` entry point.
pub async fn function_handler(
    service: &EmotionService,
    event: LambdaEvent<InvocationEvent>,
) -> Result<InvocationResponse, Error> {
    log::debug!("Invocation {}", event.context.request_id);
    Ok(handle_invocation(service, &event.payload))
}
