//! Lambda entry point.
//!
//! Cold start mirrors the model from the remote store into `/tmp`, loads it
//! once, then hands every invocation the same [`EmotionService`].

use emotion_api::config::redirect_cache_to_scratch;
use emotion_api::lambda::{function_handler, InvocationEvent};
use emotion_api::{init_logger, remote_source, EmotionClassifier, EmotionService, ModelStore, ServiceConfig};
use lambda_runtime::{run, service_fn, Error, LambdaEvent};

async fn init_service() -> Result<EmotionService, Error> {
    let config = ServiceConfig::from_env()?;
    let store = match &config.model_dir {
        Some(dir) => ModelStore::new(dir),
        None => ModelStore::new_default(),
    };

    let source = remote_source(&config.remote).await;
    store.ensure_downloaded(source.as_ref()).await?;

    let classifier = EmotionClassifier::builder()
        .with_runtime_config(config.runtime_config())
        .with_max_sequence_length(config.max_sequence_length)
        .with_model_dir(store.model_dir())?
        .build()?;
    let info = classifier.info();
    log::info!(
        "Classifier loaded from {:?} (tokenizer {:?}, max {} tokens)",
        info.model_path,
        info.tokenizer_path,
        info.max_sequence_length
    );

    Ok(EmotionService::new(classifier))
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    init_logger();
    // Must precede any model code: only /tmp is writable on Lambda
    redirect_cache_to_scratch();

    let service = init_service().await.map_err(|e| {
        log::error!("Failed to initialize emotion service: {}", e);
        e
    })?;
    let service = &service;

    run(service_fn(move |event: LambdaEvent<InvocationEvent>| async move {
        function_handler(service, event).await
    }))
    .await
}
