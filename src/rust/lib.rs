//! Emotion detection for short English texts.
//!
//! A fine-tuned DistilBERT sequence classifier, exported to ONNX, scores text
//! against six emotions (`sadness`, `joy`, `love`, `anger`, `fear`,
//! `surprise`). The crate loads the model once, optionally mirroring it from
//! S3 first, and serves it over HTTP ([`http`]) or as a Lambda function
//! ([`lambda`]).
//!
//! # Basic Usage
//!
//! ```no_run
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use emotion_api::EmotionClassifier;
//!
//! let classifier = EmotionClassifier::builder()
//!     .with_model_dir("./app/emotion_model")?
//!     .build()?;
//!
//! let prediction = classifier.predict("I am so happy today!")?;
//! println!("{} ({:.2})", prediction.label, prediction.score);
//! # Ok(())
//! # }
//! ```
//!
//! # Serving
//!
//! ```no_run
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! use emotion_api::{http, EmotionClassifier, EmotionService};
//!
//! let classifier = EmotionClassifier::builder()
//!     .with_model_dir("./app/emotion_model")?
//!     .build()?;
//! let service = EmotionService::new(classifier);
//! http::serve(service, "0.0.0.0:8000".parse()?).await?;
//! # Ok(())
//! # }
//! ```

pub mod classifier;
pub mod config;
pub mod evaluation;
pub mod http;
pub mod labels;
pub mod lambda;
pub mod model_store;
mod runtime;
pub mod s3;
pub mod service;

#[cfg(test)]
pub(crate) mod test_support;

pub use classifier::{
    ClassifierError, ClassifierInfo, EmotionClassifier, EmotionClassifierBuilder, EmotionPredictor, Prediction,
};
pub use config::{RemoteModel, ServiceConfig};
pub use labels::Emotion;
pub use model_store::{HttpSource, ModelError, ModelStore, ObjectSource};
pub use runtime::{create_session_builder, RuntimeConfig};
pub use s3::S3Source;
pub use service::{EmotionService, ErrorKind, ServiceError};

/// Initializes `env_logger` with an `info` default when `RUST_LOG` is unset.
pub fn init_logger() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .try_init();
}

/// Resolves the configured remote store to a concrete source.
pub async fn remote_source(remote: &RemoteModel) -> Box<dyn ObjectSource> {
    match remote {
        RemoteModel::S3 { bucket, prefix } => Box::new(S3Source::from_env(bucket.clone(), prefix.clone()).await),
        RemoteModel::Http { base_url } => Box::new(HttpSource::new(base_url.clone())),
    }
}
