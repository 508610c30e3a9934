use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokenizers::{Tokenizer, TruncationParams};
use ort::session::Session;
use log::{info, error};

use super::error::ClassifierError;
use super::scoring::SequenceScoring;
use super::classifier::EmotionClassifier;
use crate::labels::Emotion;
use crate::model_store::{MODEL_FILE, TOKENIZER_FILE};
use crate::runtime::{RuntimeConfig, create_session_builder};

/// Default token budget of the DistilBERT-family encoders this service runs.
pub const DEFAULT_MAX_SEQUENCE_LENGTH: usize = 512;

/// A builder for loading an [`EmotionClassifier`] from disk.
#[derive(Default, Debug)]
pub struct EmotionClassifierBuilder {
    model_path: Option<PathBuf>,
    tokenizer_path: Option<PathBuf>,
    tokenizer: Option<Tokenizer>,
    session: Option<Session>,
    max_sequence_length: Option<usize>,
    runtime_config: RuntimeConfig,
}

impl SequenceScoring for EmotionClassifierBuilder {
    fn tokenizer(&self) -> Option<&Tokenizer> {
        self.tokenizer.as_ref()
    }

    fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }
}

impl EmotionClassifierBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the runtime configuration for ONNX model execution.
    ///
    /// Must be called before the model is loaded to take effect.
    pub fn with_runtime_config(mut self, config: RuntimeConfig) -> Self {
        self.runtime_config = config;
        self
    }

    /// Caps the number of tokens fed to the model; longer input is truncated.
    ///
    /// Must be called before the model is loaded to take effect.
    pub fn with_max_sequence_length(mut self, max_sequence_length: usize) -> Self {
        self.max_sequence_length = Some(max_sequence_length);
        self
    }

    /// Loads `model.onnx` and `tokenizer.json` from a model directory.
    ///
    /// # Example
    /// ```no_run
    /// use emotion_api::EmotionClassifierBuilder;
    ///
    /// let classifier = EmotionClassifierBuilder::new()
    ///     .with_model_dir("./app/emotion_model")?
    ///     .build()?;
    /// # Ok::<(), emotion_api::ClassifierError>(())
    /// ```
    pub fn with_model_dir<P: AsRef<Path>>(self, dir: P) -> Result<Self, ClassifierError> {
        let dir = dir.as_ref();
        if !dir.is_dir() {
            return Err(ClassifierError::BuildError(format!(
                "Model directory not found: {}", dir.display()
            )));
        }
        self.with_files(dir.join(MODEL_FILE), dir.join(TOKENIZER_FILE))
    }

    /// Loads an explicit model and tokenizer file pair.
    ///
    /// # Errors
    /// - `BuildError` if a path is empty, already set, or missing on disk
    /// - `BuildError` if the tokenizer or ONNX session fails to load
    /// - `ModelError` if the model does not have the expected inputs/outputs
    pub fn with_files<P: AsRef<Path>, Q: AsRef<Path>>(
        mut self,
        model_path: P,
        tokenizer_path: Q,
    ) -> Result<Self, ClassifierError> {
        let model_path = model_path.as_ref();
        let tokenizer_path = tokenizer_path.as_ref();

        if model_path.as_os_str().is_empty() || tokenizer_path.as_os_str().is_empty() {
            return Err(ClassifierError::BuildError("Model and tokenizer paths cannot be empty".to_string()));
        }
        if self.model_path.is_some() || self.tokenizer_path.is_some() {
            return Err(ClassifierError::BuildError("Model and tokenizer paths already set".to_string()));
        }
        if !model_path.exists() {
            return Err(ClassifierError::BuildError(format!("Model file not found: {}", model_path.display())));
        }
        if !tokenizer_path.exists() {
            return Err(ClassifierError::BuildError(format!("Tokenizer file not found: {}", tokenizer_path.display())));
        }

        let mut tokenizer = Tokenizer::from_file(tokenizer_path)
            .map_err(|e| {
                error!("Failed to load tokenizer: {}", e);
                ClassifierError::BuildError(format!("Failed to load tokenizer: {}", e))
            })?;

        let max_length = self.max_sequence_length.unwrap_or(DEFAULT_MAX_SEQUENCE_LENGTH);
        tokenizer
            .with_truncation(Some(TruncationParams {
                max_length,
                ..Default::default()
            }))
            .map_err(|e| ClassifierError::BuildError(format!("Failed to configure truncation: {}", e)))?;
        info!("Tokenizer loaded from {:?} (max {} tokens)", tokenizer_path, max_length);

        let session = create_session_builder(&self.runtime_config)?
            .commit_from_file(model_path)?;

        Self::validate_model(&session)?;
        info!("Model structure validated successfully");

        self.max_sequence_length = Some(max_length);
        self.model_path = Some(model_path.to_path_buf());
        self.tokenizer_path = Some(tokenizer_path.to_path_buf());
        self.tokenizer = Some(tokenizer);
        self.session = Some(session);
        Ok(self)
    }

    /// Builds the classifier after checking the model scores exactly one logit per emotion.
    pub fn build(mut self) -> Result<EmotionClassifier, ClassifierError> {
        let (model_path, tokenizer_path) = match (self.model_path.take(), self.tokenizer_path.take()) {
            (Some(m), Some(t)) => (m, t),
            _ => return Err(ClassifierError::BuildError("Model and tokenizer paths must be set".to_string())),
        };

        let probe = self.score_text("Probe input to check the classifier head")?;
        if probe.len() != Emotion::COUNT {
            error!("Model produces {} logits, expected {}", probe.len(), Emotion::COUNT);
            return Err(ClassifierError::BuildError(format!(
                "Model has {} output classes but the label set has {}",
                probe.len(), Emotion::COUNT
            )));
        }

        let tokenizer = Arc::new(self.tokenizer.take()
            .ok_or_else(|| ClassifierError::BuildError("No tokenizer loaded".into()))?);
        let session = Arc::new(self.session.take()
            .ok_or_else(|| ClassifierError::BuildError("No ONNX model loaded".into()))?);

        Ok(EmotionClassifier {
            model_path,
            tokenizer_path,
            tokenizer,
            session,
            max_sequence_length: self.max_sequence_length.unwrap_or(DEFAULT_MAX_SEQUENCE_LENGTH),
        })
    }

    /// Validates that the model has the expected input/output structure
    fn validate_model(session: &Session) -> Result<(), ClassifierError> {
        let inputs = &session.inputs;
        for required in ["input_ids", "attention_mask"] {
            if !inputs.iter().any(|input| input.name == required) {
                return Err(ClassifierError::ModelError(format!(
                    "Model is missing required input '{}' (found: {:?})",
                    required,
                    inputs.iter().map(|i| i.name.as_str()).collect::<Vec<_>>()
                )));
            }
        }

        if session.outputs.is_empty() {
            return Err(ClassifierError::ModelError(
                "Model must have at least 1 output for logits".to_string()
            ));
        }

        Ok(())
    }
}
