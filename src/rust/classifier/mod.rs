use std::path::PathBuf;
use serde::Serialize;

use crate::labels::Emotion;

mod error;
mod scoring;
mod classifier;
pub mod builder;
mod utils;

pub use error::ClassifierError;
pub use classifier::EmotionClassifier;
pub use builder::{EmotionClassifierBuilder, DEFAULT_MAX_SEQUENCE_LENGTH};

/// Outcome of classifying one text.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Prediction {
    /// Arg-max label over the model's logits
    pub label: Emotion,
    /// Softmax probability of `label`
    pub score: f32,
}

/// Anything that can map text to an emotion.
///
/// The request handlers depend on this trait rather than on
/// [`EmotionClassifier`] so they can run against a fixed stand-in.
pub trait EmotionPredictor: Send + Sync {
    fn predict(&self, text: &str) -> Result<Prediction, ClassifierError>;
}

/// Information about a loaded classifier
#[derive(Debug, Clone)]
pub struct ClassifierInfo {
    /// Path to the ONNX model file
    pub model_path: PathBuf,
    /// Path to the tokenizer file
    pub tokenizer_path: PathBuf,
    /// Labels in logit order
    pub labels: Vec<Emotion>,
    /// Token budget before truncation
    pub max_sequence_length: usize,
}
