use std::path::PathBuf;
use std::sync::Arc;
use ort::session::Session;
use tokenizers::Tokenizer;

use super::error::ClassifierError;
use super::scoring::SequenceScoring;
use super::utils::{argmax, softmax};
use super::{ClassifierInfo, EmotionPredictor, Prediction};
use crate::labels::Emotion;

/// A fine-tuned sequence classifier mapping text to one of six emotions.
///
/// # Thread Safety
///
/// The tokenizer and ONNX session are read-only after loading and sit behind
/// `Arc`, so one instance can serve any number of concurrent requests:
///
/// ```no_run
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// use emotion_api::EmotionClassifier;
/// use std::sync::Arc;
/// use std::thread;
///
/// let classifier = Arc::new(EmotionClassifier::builder()
///     .with_model_dir("./app/emotion_model")?
///     .build()?);
///
/// let classifier_clone = Arc::clone(&classifier);
/// thread::spawn(move || {
///     classifier_clone.predict("I am so happy today!").unwrap();
/// });
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct EmotionClassifier {
    pub model_path: PathBuf,
    pub tokenizer_path: PathBuf,
    pub tokenizer: Arc<Tokenizer>,
    pub session: Arc<Session>,
    pub max_sequence_length: usize,
}

// Compile-time verification of thread-safety
const _: () = {
    fn assert_send_sync<T: Send + Sync>() {}
    fn verify_thread_safety() {
        assert_send_sync::<EmotionClassifier>();
    }
};

impl SequenceScoring for EmotionClassifier {
    fn tokenizer(&self) -> Option<&Tokenizer> {
        Some(&self.tokenizer)
    }

    fn session(&self) -> Option<&Session> {
        Some(&self.session)
    }
}

impl EmotionClassifier {
    pub fn builder() -> super::builder::EmotionClassifierBuilder {
        super::builder::EmotionClassifierBuilder::new()
    }

    pub fn info(&self) -> ClassifierInfo {
        ClassifierInfo {
            model_path: self.model_path.clone(),
            tokenizer_path: self.tokenizer_path.clone(),
            labels: Emotion::ALL.to_vec(),
            max_sequence_length: self.max_sequence_length,
        }
    }

    /// Predicts the emotion expressed by `text`.
    ///
    /// The label is the arg-max over the model's logits (first index wins a tie);
    /// `score` is that label's softmax probability.
    ///
    /// # Errors
    /// - `ValidationError` for empty input
    /// - `TokenizerError` / `ModelError` from encoding or the forward pass
    /// - `PredictionError` if the logits do not line up with the label set
    pub fn predict(&self, text: &str) -> Result<Prediction, ClassifierError> {
        if text.is_empty() {
            return Err(ClassifierError::ValidationError("Input text cannot be empty".into()));
        }

        let logits = self.score_text(text)?;
        prediction_from_logits(&logits)
    }

    /// Number of tokens `text` occupies after truncation, special tokens included.
    pub fn token_count(&self, text: &str) -> Result<usize, ClassifierError> {
        self.count_tokens(text)
    }
}

impl EmotionPredictor for EmotionClassifier {
    fn predict(&self, text: &str) -> Result<Prediction, ClassifierError> {
        EmotionClassifier::predict(self, text)
    }
}

pub(crate) fn prediction_from_logits(logits: &[f32]) -> Result<Prediction, ClassifierError> {
    if logits.len() != Emotion::COUNT {
        return Err(ClassifierError::PredictionError(format!(
            "Expected {} logits, got {}", Emotion::COUNT, logits.len()
        )));
    }

    let index = argmax(logits)
        .ok_or_else(|| ClassifierError::PredictionError("Model returned no usable logits".into()))?;
    let label = Emotion::from_index(index)
        .ok_or_else(|| ClassifierError::PredictionError(format!("No label for class index {}", index)))?;
    let probabilities = softmax(logits);

    Ok(Prediction {
        label,
        score: probabilities[index],
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::model_dir_from_env;

    #[test]
    fn test_prediction_from_logits() {
        let prediction = prediction_from_logits(&[0.1, 4.0, 1.0, -2.0, 0.0, 0.3]).unwrap();
        assert_eq!(prediction.label, Emotion::Joy);
        assert!(prediction.score > 0.5 && prediction.score <= 1.0);
    }

    #[test]
    fn test_tie_goes_to_first_label() {
        let prediction = prediction_from_logits(&[0.0, 0.0, 2.5, 2.5, 0.0, 0.0]).unwrap();
        assert_eq!(prediction.label, Emotion::Love);
    }

    #[test]
    fn test_wrong_logit_count() {
        let result = prediction_from_logits(&[1.0, 2.0]);
        assert!(matches!(result, Err(ClassifierError::PredictionError(_))));
    }

    #[test]
    fn test_model_prediction() -> Result<(), Box<dyn std::error::Error>> {
        let Some(dir) = model_dir_from_env() else { return Ok(()) };
        let classifier = EmotionClassifier::builder().with_model_dir(dir)?.build()?;

        let first = classifier.predict("I love this project!")?;
        for _ in 0..3 {
            assert_eq!(classifier.predict("I love this project!")?.label, first.label);
        }
        assert!(Emotion::ALL.contains(&first.label));
        assert!(matches!(classifier.predict(""), Err(ClassifierError::ValidationError(_))));
        Ok(())
    }

    #[test]
    fn test_long_input_is_truncated() -> Result<(), Box<dyn std::error::Error>> {
        let Some(dir) = model_dir_from_env() else { return Ok(()) };
        let classifier = EmotionClassifier::builder()
            .with_max_sequence_length(64)
            .with_model_dir(&dir)?
            .build()?;

        let info = classifier.info();
        assert_eq!(info.max_sequence_length, 64);
        assert_eq!(info.model_path, dir.join("model.onnx"));
        assert_eq!(info.tokenizer_path, dir.join("tokenizer.json"));
        assert_eq!(info.labels, Emotion::ALL.to_vec());

        let very_long_text = "i feel like this day will never end and nothing helps ".repeat(100);
        assert_eq!(classifier.token_count(&very_long_text)?, 64);
        assert!(classifier.predict(&very_long_text).is_ok());
        Ok(())
    }
}
