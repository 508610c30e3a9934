use emotion_api::lambda::{handle_invocation, InvocationEvent, InvocationResponse};
use emotion_api::{ClassifierError, Emotion, EmotionPredictor, EmotionService, Prediction};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Always answers "fear" and counts how often it was asked.
#[derive(Default)]
struct CountingPredictor {
    calls: AtomicUsize,
}

impl EmotionPredictor for CountingPredictor {
    fn predict(&self, _text: &str) -> Result<Prediction, ClassifierError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(Prediction { label: Emotion::Fear, score: 0.6 })
    }
}

struct FailingPredictor;

impl EmotionPredictor for FailingPredictor {
    fn predict(&self, _text: &str) -> Result<Prediction, ClassifierError> {
        Err(ClassifierError::ModelError("Failed to run model: session poisoned".into()))
    }
}

fn setup() -> (Arc<CountingPredictor>, EmotionService) {
    let predictor = Arc::new(CountingPredictor::default());
    let service = EmotionService::from_shared(predictor.clone());
    (predictor, service)
}

fn event(value: Value) -> InvocationEvent {
    serde_json::from_value(value).unwrap()
}

fn body_json(response: &InvocationResponse) -> Value {
    serde_json::from_str(&response.body).unwrap()
}

fn assert_cors(response: &InvocationResponse) {
    assert_eq!(response.headers["Access-Control-Allow-Origin"], "*");
    assert_eq!(response.headers["Access-Control-Allow-Methods"], "POST, OPTIONS");
    assert_eq!(response.headers["Access-Control-Allow-Headers"], "Content-Type");
}

#[test]
fn test_options_preflight() {
    let (predictor, service) = setup();
    let response = handle_invocation(&service, &event(json!({"httpMethod": "OPTIONS", "body": "{\"text\": \"hi\"}"})));

    assert_eq!(response.status_code, 200);
    assert_cors(&response);
    assert!(response.body.is_empty());
    assert_eq!(predictor.calls.load(Ordering::SeqCst), 0);
}

#[test]
fn test_post_predicts() {
    let (predictor, service) = setup();
    let response = handle_invocation(&service, &InvocationEvent::post(r#"{"text": "I am so happy today!"}"#));

    assert_eq!(response.status_code, 200);
    assert_eq!(body_json(&response), json!({"emotion": "fear"}));
    assert_eq!(response.headers["Content-Type"], "application/json");
    assert_cors(&response);
    assert_eq!(predictor.calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_missing_method_is_treated_as_post() {
    let (_, service) = setup();
    let response = handle_invocation(&service, &event(json!({"body": "{\"text\": \"so scared\"}"})));
    assert_eq!(response.status_code, 200);
    assert_eq!(body_json(&response), json!({"emotion": "fear"}));
}

#[test]
fn test_empty_body_is_missing_text() {
    let (predictor, service) = setup();
    for payload in [
        json!({"httpMethod": "POST", "body": ""}),
        json!({"httpMethod": "POST"}),
        json!({"httpMethod": "POST", "body": null}),
        json!({"httpMethod": "POST", "body": "{}"}),
        json!({"httpMethod": "POST", "body": "{\"text\": \"\"}"}),
    ] {
        let response = handle_invocation(&service, &event(payload.clone()));
        assert_eq!(response.status_code, 400, "payload {}", payload);
        assert_eq!(body_json(&response), json!({"error": "No text provided"}));
        assert_cors(&response);
    }
    assert_eq!(predictor.calls.load(Ordering::SeqCst), 0);
}

#[test]
fn test_other_methods_rejected() {
    let (_, service) = setup();
    for method in ["GET", "PUT", "DELETE"] {
        let response = handle_invocation(&service, &event(json!({"httpMethod": method, "body": "{\"text\": \"hi\"}"})));
        assert_eq!(response.status_code, 405);
        assert_eq!(body_json(&response), json!({"error": "Method not allowed"}));
        assert_cors(&response);
    }
}

#[test]
fn test_http_api_payload_and_base64() {
    let (_, service) = setup();
    let response = handle_invocation(
        &service,
        &event(json!({
            "requestContext": {"http": {"method": "POST"}},
            "body": "eyJ0ZXh0IjogIkkgYW0gc28gaGFwcHkgdG9kYXkhIn0=",
            "isBase64Encoded": true
        })),
    );
    assert_eq!(response.status_code, 200);
    assert_eq!(body_json(&response), json!({"emotion": "fear"}));
}

#[test]
fn test_inference_failure_is_500() {
    let service = EmotionService::new(FailingPredictor);
    let response = handle_invocation(&service, &InvocationEvent::post(r#"{"text": "hello"}"#));

    assert_eq!(response.status_code, 500);
    assert_eq!(
        body_json(&response),
        json!({"error": "Model error: Failed to run model: session poisoned"})
    );
    assert_cors(&response);
}

#[test]
fn test_unparsable_body_is_internal_fault() {
    let (predictor, service) = setup();
    let raw = "{\"text\": ";
    let parse_error = serde_json::from_str::<Value>(raw).unwrap_err().to_string();

    let response = handle_invocation(&service, &InvocationEvent::post(raw));
    assert_eq!(response.status_code, 500);
    assert_eq!(body_json(&response), json!({ "error": parse_error }));
    assert_cors(&response);
    assert_eq!(predictor.calls.load(Ordering::SeqCst), 0);
}

#[test]
fn test_undecodable_base64_body_is_internal_fault() {
    let (_, service) = setup();
    let response = handle_invocation(
        &service,
        &event(json!({"httpMethod": "POST", "body": "%%%", "isBase64Encoded": true})),
    );
    assert_eq!(response.status_code, 500);
    let message = body_json(&response)["error"].as_str().unwrap().to_string();
    assert!(!message.is_empty());
    assert_ne!(message, "Request body is not valid JSON");
}
