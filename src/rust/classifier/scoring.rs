use tokenizers::Tokenizer;
use ort::session::Session;
use ndarray::Array2;
use ort::value::Tensor;
use std::collections::HashMap;

use super::error::ClassifierError;

/// Token ids and attention mask for a single sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct EncodedText {
    pub ids: Vec<i64>,
    pub attention_mask: Vec<i64>,
}

impl EncodedText {
    pub fn len(&self) -> usize {
        self.ids.len()
    }
}

/// Turns text into per-class logits with an ONNX sequence-classification model.
///
/// The model is expected to:
/// - accept `input_ids` and `attention_mask` (shape `[batch_size, sequence_length]`),
///   and optionally `token_type_ids`
/// - emit logits of shape `[batch_size, num_labels]` as its first output
pub(crate) trait SequenceScoring {
    /// Returns the initialized tokenizer if available
    fn tokenizer(&self) -> Option<&Tokenizer>;

    /// Returns the initialized ONNX session if available
    fn session(&self) -> Option<&Session>;

    /// Counts the tokens the model would see, special tokens included.
    fn count_tokens(&self, text: &str) -> Result<usize, ClassifierError> {
        self.tokenize(text).map(|encoded| encoded.len())
    }

    /// Encodes text with special tokens. Truncation follows the tokenizer's own settings.
    fn tokenize(&self, text: &str) -> Result<EncodedText, ClassifierError> {
        let tokenizer = self.tokenizer()
            .ok_or_else(|| ClassifierError::TokenizerError("Tokenizer not initialized".into()))?;

        let encoding = tokenizer.encode(text, true)
            .map_err(|e| ClassifierError::TokenizerError(e.to_string()))?;

        if encoding.get_ids().is_empty() {
            return Err(ClassifierError::TokenizerError("Tokenizer produced no tokens".into()));
        }

        Ok(EncodedText {
            ids: encoding.get_ids().iter().map(|&id| id as i64).collect(),
            attention_mask: encoding.get_attention_mask().iter().map(|&m| m as i64).collect(),
        })
    }

    /// Tokenizes and scores text in one go.
    fn score_text(&self, text: &str) -> Result<Vec<f32>, ClassifierError> {
        let encoded = self.tokenize(text)?;
        self.get_logits(&encoded)
    }

    /// Runs the model over one encoded sequence and returns the raw logits.
    ///
    /// # Errors
    /// - `ModelError` if the session is missing, tensors cannot be built or the run fails
    /// - `PredictionError` if the output is not a single row of logits
    fn get_logits(&self, encoded: &EncodedText) -> Result<Vec<f32>, ClassifierError> {
        let session = self.session()
            .ok_or_else(|| ClassifierError::ModelError("Session not initialized".into()))?;
        let seq_len = encoded.len();

        let input_ids = Array2::from_shape_vec((1, seq_len), encoded.ids.clone())
            .map_err(|e| ClassifierError::ModelError(format!("Failed to create input array: {}", e)))?;
        let attention_mask = Array2::from_shape_vec((1, seq_len), encoded.attention_mask.clone())
            .map_err(|e| ClassifierError::ModelError(format!("Failed to create mask array: {}", e)))?;

        let mut input_tensors = HashMap::new();
        for input in &session.inputs {
            let tensor = match input.name.as_str() {
                "input_ids" => Tensor::from_array(input_ids.clone()),
                "attention_mask" => Tensor::from_array(attention_mask.clone()),
                "token_type_ids" => Tensor::from_array(Array2::<i64>::zeros((1, seq_len))),
                other => {
                    return Err(ClassifierError::ModelError(format!(
                        "Unsupported model input '{}'", other
                    )))
                }
            }
            .map_err(|e| ClassifierError::ModelError(format!("Failed to create {} tensor: {}", input.name, e)))?;
            input_tensors.insert(input.name.clone(), tensor);
        }

        let outputs = session.run(input_tensors)
            .map_err(|e| ClassifierError::ModelError(format!("Failed to run model: {}", e)))?;
        let logits = outputs[0].try_extract_tensor::<f32>()
            .map_err(|e| ClassifierError::ModelError(format!("Failed to extract output tensor: {}", e)))?;

        let shape = logits.shape().to_vec();
        match shape.as_slice() {
            [1, _] | [_] => Ok(logits.iter().copied().collect()),
            _ => Err(ClassifierError::PredictionError(format!(
                "Expected logits of shape [1, num_labels], got {:?}", shape
            ))),
        }
    }
}
