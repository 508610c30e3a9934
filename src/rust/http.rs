//! HTTP front end

use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use std::net::SocketAddr;

use crate::service::{EmotionService, HealthResponse, ServiceError};

pub fn create_router(service: EmotionService) -> Router {
    Router::new()
        .route("/", get(home))
        .route("/predict", post(predict))
        // Long texts are truncated by the tokenizer, never refused at the door
        .layer(DefaultBodyLimit::disable())
        .with_state(service)
}

/// Binds `addr` and serves until the process is stopped.
pub async fn serve(service: EmotionService, addr: SocketAddr) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    log::info!("Emotion Detection API listening on http://{}", listener.local_addr()?);
    axum::serve(listener, create_router(service)).await
}

async fn home(State(service): State<EmotionService>) -> Json<HealthResponse> {
    Json(service.health())
}

async fn predict(State(service): State<EmotionService>, body: Bytes) -> Response {
    log::debug!("POST /predict ({} bytes)", body.len());
    let result = tokio::task::spawn_blocking(move || service.predict_body(Some(&body[..])))
        .await
        .unwrap_or_else(|e| Err(ServiceError::internal(format!("Inference task failed: {}", e))));

    match result {
        Ok(prediction) => (StatusCode::OK, Json(prediction)).into_response(),
        Err(err) => err.into_response(),
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self.to_body())).into_response()
    }
}
